use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod contacts;
mod health;
mod notify;
mod pages;
mod requests;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/session", get(auth::session))
        // Request API
        .route("/requests", post(requests::create))
        .route("/requests/inbox", get(requests::inbox))
        .route("/requests/sent", get(requests::sent))
        .route("/requests/:id/status", post(requests::update_status))
        // Contact autocomplete
        .route("/contacts", get(contacts::list))
        // Notification dispatch
        .route("/notify-new-request", post(notify::notify_new_request))
        .route("/notify-reply", post(notify::notify_reply))
        // Server-rendered pages
        .route("/", get(pages::compose_page))
        .route("/compose", post(pages::compose_submit))
        .route("/inbox", get(pages::inbox_page))
        .route("/inbox/:id/accept", post(pages::accept))
        .route("/inbox/:id/decline", post(pages::decline))
        .route("/sent", get(pages::sent_page))
        .route("/session", post(pages::session_login))
        .route("/logout", post(pages::logout))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
