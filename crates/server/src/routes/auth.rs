use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::User,
    error::AppError,
    session::{self, generate_token},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = create_account(&state, &req.email, &req.password, req.display_name).await?;
    let token = generate_token(&user, &state.config.auth)?;
    let user_id = user.id;

    Ok(Json(AuthResponse { token, user_id }))
}

/// Shared by the JSON register endpoint and the page sign-up form.
pub async fn create_account(
    state: &AppState,
    email: &str,
    password: &str,
    display_name: Option<String>,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    // Check if user already exists
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    // Hash password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        display_name: display_name.filter(|n| !n.trim().is_empty()),
        password_hash,
        created_at: None,
    };
    state.db.create_user(&user).await?;

    Ok(user)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = authenticate(&state, &req.email, &req.password).await?;
    let token = generate_token(&user, &state.config.auth)?;

    Ok(Json(AuthResponse {
        token,
        user_id: user.id,
    }))
}

/// Current-session lookup. Always 200: a missing or broken session is
/// `{"user": null}`, never an error.
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let user = session::current_user(&state, &headers).await;
    Json(serde_json::json!({ "user": user }))
}

/// Shared by the JSON login and the page login form. One generic message for
/// both unknown email and bad password.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::AuthError("Invalid email or password".to_string()))?;

    Ok(user)
}
