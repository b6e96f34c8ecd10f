//! Who is signed in, derived from a bearer header or the page cookie.
//!
//! Lookup failures deliberately read as "not signed in" rather than errors:
//! a broken token or an unreachable store degrades to the logged-out view,
//! it never takes a page down.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::SessionUser;

use crate::{config::AuthConfig, db::User, error::AppError, state::AppState};

/// Cookie used by the server-rendered pages; holds the same JWT the API
/// accepts as a bearer token.
pub const SESSION_COOKIE: &str = "lettermeet_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// user id
    pub sub: String,
    pub email: Option<String>,
    pub exp: usize,
}

pub fn generate_token(user: &User, auth_config: &AuthConfig) -> Result<String, AppError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.clone(),
        email: Some(user.email.clone()),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

/// The current identity, or `None`. Never errors.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let token = bearer_token(headers).or_else(|| cookie_token(headers))?;
    let claims = match verify_token(token, &state.config.auth.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("session token rejected: {}", e);
            return None;
        }
    };

    match state.db.get_user_by_id(&claims.sub).await {
        Ok(Some(user)) => Some(SessionUser {
            id: user.id,
            email: Some(user.email),
            display_name: user.display_name,
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("session lookup failed, treating as signed out: {}", e);
            None
        }
    }
}

/// Like [`current_user`] but for endpoints that cannot proceed anonymously.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, AppError> {
    current_user(state, headers)
        .await
        .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))
}
