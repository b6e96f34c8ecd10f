//! The two outbound-email endpoints, plus the fire-and-forget dispatch
//! helpers the request handlers use.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use shared::{NotifyPayload, ReplyNotifyPayload, RequestStatus};

use crate::{
    error::AppError,
    mailer::{self, Mailer},
    state::AppState,
};

fn required_to_email(payload: &NotifyPayload) -> Result<String, AppError> {
    payload
        .to_email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Missing toEmail".to_string()))
}

async fn send_new_request(
    mailer: &Mailer,
    payload: &NotifyPayload,
    to_email: &str,
    site_url: &str,
) -> anyhow::Result<()> {
    let site = mailer::resolve_site_url(payload.site_url.as_deref(), site_url);
    let email = mailer::render_new_request(payload, &site);
    mailer.send(to_email, &email).await
}

async fn send_reply(
    mailer: &Mailer,
    payload: &NotifyPayload,
    accepted: bool,
    to_email: &str,
    site_url: &str,
) -> anyhow::Result<()> {
    let site = mailer::resolve_site_url(payload.site_url.as_deref(), site_url);
    let email = mailer::render_reply(payload, accepted, &site);
    mailer.send(to_email, &email).await
}

/// POST /notify-new-request
pub async fn notify_new_request(
    State(state): State<AppState>,
    Json(payload): Json<NotifyPayload>,
) -> Result<Json<Value>, AppError> {
    let to_email = required_to_email(&payload)?;

    send_new_request(
        &state.mailer,
        &payload,
        &to_email,
        &state.config.site.public_url,
    )
    .await
    .map_err(|e| {
        tracing::error!("notify-new-request send failed: {:#}", e);
        AppError::Internal("Failed to send email".to_string())
    })?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /notify-reply
pub async fn notify_reply(
    State(state): State<AppState>,
    Json(payload): Json<ReplyNotifyPayload>,
) -> Result<Json<Value>, AppError> {
    let to_email = required_to_email(&payload.request)?;
    let status = payload
        .status
        .ok_or_else(|| AppError::BadRequest("Missing status".to_string()))?;
    let accepted = status == RequestStatus::Accepted;

    send_reply(
        &state.mailer,
        &payload.request,
        accepted,
        &to_email,
        &state.config.site.public_url,
    )
    .await
    .map_err(|e| {
        tracing::error!("notify-reply send failed: {:#}", e);
        AppError::Internal("Failed to send email".to_string())
    })?;

    Ok(Json(json!({ "ok": true })))
}

// ============================================================================
// Fire-and-forget dispatch
// ============================================================================
//
// The state change has already been committed when these run; delivery is
// best-effort and failures only reach the log, never the acting user.

pub fn dispatch_new_request(state: &AppState, payload: NotifyPayload) {
    let Some(to_email) = payload.to_email.clone().filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("creation notification skipped: no recipient email");
        return;
    };
    let mailer = state.mailer.clone();
    let site_url = state.config.site.public_url.clone();
    tokio::spawn(async move {
        if let Err(e) = send_new_request(&mailer, &payload, &to_email, &site_url).await {
            tracing::error!("creation notification to {} failed: {:#}", to_email, e);
        }
    });
}

pub fn dispatch_reply(state: &AppState, payload: NotifyPayload, status: RequestStatus) {
    let Some(to_email) = payload.to_email.clone().filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("reply notification skipped: sender left no email");
        return;
    };
    let accepted = status == RequestStatus::Accepted;
    let mailer = state.mailer.clone();
    let site_url = state.config.site.public_url.clone();
    tokio::spawn(async move {
        if let Err(e) = send_reply(&mailer, &payload, accepted, &to_email, &site_url).await {
            tracing::error!("reply notification to {} failed: {:#}", to_email, e);
        }
    });
}
