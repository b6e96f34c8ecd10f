use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{error::AppError, session::require_user, state::AppState};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntry {
    pub email: String,
    pub name: Option<String>,
    pub times_used: i64,
    pub last_used_at: Option<String>,
}

/// GET /contacts — recently used recipients for the compose autocomplete.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state, &headers).await?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let contacts = state.db.top_contacts(&user.id, limit).await?;
    let entries: Vec<ContactEntry> = contacts
        .into_iter()
        .map(|c| ContactEntry {
            email: c.contact_email,
            name: c.contact_name,
            times_used: c.times_used,
            last_used_at: c.last_used_at,
        })
        .collect();

    Ok(Json(json!({ "contacts": entries })))
}
