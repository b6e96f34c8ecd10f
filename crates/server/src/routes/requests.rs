use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use shared::{MeetRequest, NotifyPayload, RequestStatus, SessionUser};
use uuid::Uuid;

use crate::{
    db::RequestRow,
    error::AppError,
    routes::notify,
    session::require_user,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[serde(default)]
    pub to_name: Option<String>,
    pub to_email: String,
    pub date: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub place: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: RequestStatus,
}

fn non_empty(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("Missing {}", field)));
    }
    Ok(trimmed.to_string())
}

/// The authenticated email; required wherever the caller acts as a
/// recipient, since requests are addressed by email.
fn session_email(user: &SessionUser) -> Result<String, AppError> {
    user.email
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Signed-in account has no email address".to_string()))
}

/// POST /requests
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<MeetRequest>, AppError> {
    let user = require_user(&state, &headers).await?;

    let to_email = non_empty(&body.to_email, "toEmail")?.to_lowercase();
    let date = non_empty(&body.date, "date")?;
    let start_time = non_empty(&body.start_time, "startTime")?;
    let place = non_empty(&body.place, "place")?;
    if body.duration_minutes <= 0 {
        return Err(AppError::BadRequest(
            "durationMinutes must be positive".to_string(),
        ));
    }

    let to_name = body.to_name.clone().filter(|n| !n.trim().is_empty());
    let note = body.note.clone().filter(|n| !n.trim().is_empty());

    // Sender identity is snapshotted at send time; later profile edits do
    // not rewrite history.
    let row = RequestRow {
        id: Uuid::new_v4().to_string(),
        from_user_id: user.id.clone(),
        from_name: user.display_name.clone(),
        from_email: user.email.clone(),
        to_name: to_name.clone(),
        to_email: to_email.clone(),
        date,
        start_time,
        duration_minutes: body.duration_minutes,
        place,
        note,
        status: "pending".to_string(),
        created_at: None,
    };
    state.db.create_request(&row).await?;

    // Contact upsert is a convenience cache; it never blocks the send.
    if let Err(e) = state
        .db
        .upsert_contact(&user.id, &to_email, to_name.as_deref())
        .await
    {
        tracing::warn!("contact upsert for {} failed: {}", to_email, e);
    }

    notify::dispatch_new_request(&state, creation_payload(&row));

    let created = state
        .db
        .get_request(&row.id)
        .await?
        .unwrap_or(row);
    Ok(Json(created.into()))
}

/// GET /requests/inbox
pub async fn inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MeetRequest>>, AppError> {
    let user = require_user(&state, &headers).await?;
    let email = session_email(&user)?;

    let rows = state.db.requests_for_recipient(&email).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /requests/sent
pub async fn sent(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MeetRequest>>, AppError> {
    let user = require_user(&state, &headers).await?;

    let rows = state.db.requests_for_sender(&user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /requests/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<MeetRequest>, AppError> {
    let user = require_user(&state, &headers).await?;
    let email = session_email(&user)?;

    if body.status == RequestStatus::Pending {
        return Err(AppError::BadRequest(
            "Status must be accepted or rejected".to_string(),
        ));
    }

    let changed = state
        .db
        .update_request_status(&id, &email, body.status)
        .await?;
    if !changed {
        return Err(AppError::BadRequest(
            "Request not found, already decided, or not addressed to you".to_string(),
        ));
    }

    let row = state
        .db
        .get_request(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;

    notify::dispatch_reply(&state, reply_payload(&row, &user), body.status);

    Ok(Json(row.into()))
}

/// Creation email payload: addressed to the recipient, from the sender
/// snapshot.
pub fn creation_payload(row: &RequestRow) -> NotifyPayload {
    NotifyPayload {
        to_email: Some(row.to_email.clone()),
        to_name: row.to_name.clone(),
        from_email: row.from_email.clone(),
        from_name: row.from_name.clone(),
        date: Some(row.date.clone()),
        start_time: Some(row.start_time.clone()),
        duration_minutes: u32::try_from(row.duration_minutes).ok(),
        place: Some(row.place.clone()),
        note: row.note.clone(),
        site_url: None,
    }
}

/// Reply email payload: addressed back to the original sender, "from" the
/// recipient who decided.
pub fn reply_payload(row: &RequestRow, decider: &SessionUser) -> NotifyPayload {
    NotifyPayload {
        to_email: row.from_email.clone(),
        to_name: row.from_name.clone(),
        from_email: decider.email.clone(),
        from_name: decider
            .display_name
            .clone()
            .or_else(|| row.to_name.clone()),
        date: Some(row.date.clone()),
        start_time: Some(row.start_time.clone()),
        duration_minutes: u32::try_from(row.duration_minutes).ok(),
        place: Some(row.place.clone()),
        note: row.note.clone(),
        site_url: None,
    }
}
