//! Server-rendered pages: compose form, inbox, sent view.
//!
//! Each page is a thin view over the record store plus the dispatcher. The
//! pages share the cookie session with the JSON API; a visitor without a
//! session sees the sign-in card instead of an error.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use shared::{RequestStatus, SessionUser};
use uuid::Uuid;

use crate::{
    db::RequestRow,
    mailer::escape_html,
    routes::{auth, notify, requests},
    session::{self, generate_token, SESSION_COOKIE},
    state::AppState,
};

const STYLE: &str = r#"
  body { margin: 0; background: #e9eef1; color: #1f1f1f;
         font-family: 'Helvetica Neue', Arial, sans-serif; }
  .top-nav { background: #1f2b3a; color: #f7f9fb; }
  .top-nav-inner { max-width: 720px; margin: 0 auto; padding: 14px 16px;
                   display: flex; align-items: center; gap: 24px; }
  .logo { color: #f7f9fb; text-decoration: none; font-family: Georgia, serif;
          font-size: 18px; letter-spacing: 0.08em; }
  .nav-link { color: #c6d0d8; text-decoration: none; margin-right: 14px; }
  .nav-auth { margin-left: auto; font-size: 13px; color: #c6d0d8;
              display: flex; align-items: center; gap: 10px; }
  .main-shell { max-width: 720px; margin: 28px auto; padding: 0 16px; }
  .card { background: #ffffff; border: 1px solid #d6dbe0; padding: 24px 28px; }
  .card-title { font-family: Georgia, serif; font-size: 22px; color: #1f2b3a; }
  .card-subtitle { margin-top: 6px; color: #6c7884; font-size: 14px; }
  .feedback { margin-top: 14px; color: #3b4954; font-style: italic; }
  label { display: block; margin-top: 14px; font-size: 13px; color: #3b4954; }
  input, textarea { width: 100%; box-sizing: border-box; margin-top: 4px;
                    padding: 8px; border: 1px solid #d6dbe0; font-size: 14px; }
  button { margin-top: 16px; background: #2a3a45; color: #f7f9fb; border: 0;
           padding: 10px 22px; font-size: 13px; letter-spacing: 0.12em;
           text-transform: uppercase; cursor: pointer; }
  .btn-ghost { background: transparent; color: #2a3a45;
               border: 1px solid #2a3a45; }
  .btn-danger { background: #7a2f2f; }
  .request-item { border: 1px solid #d6dbe0; background: #f7f9fb;
                  padding: 14px 16px; margin-top: 14px; }
  .request-main { display: flex; justify-content: space-between; }
  .request-meta { margin-top: 6px; color: #3b4954; font-size: 14px; }
  .request-note { margin-top: 6px; font-style: italic; font-size: 14px; }
  .tag { font-size: 12px; text-transform: uppercase; letter-spacing: 0.1em; }
  .tag.pending { color: #8a6d1a; }
  .tag.accepted { color: #2f6b3a; }
  .tag.rejected { color: #7a2f2f; }
  .item-actions { margin-top: 10px; display: flex; gap: 10px; }
  .item-actions form { display: inline; }
"#;

fn page_shell(title: &str, user: Option<&SessionUser>, body: &str) -> Html<String> {
    let auth_box = match user {
        Some(u) => {
            let who = u
                .display_name
                .as_deref()
                .or(u.email.as_deref())
                .unwrap_or("Signed in");
            format!(
                r#"<span>{}</span>
          <form method="post" action="/logout"><button class="btn-ghost" style="margin:0; padding:4px 10px;">Sign out</button></form>"#,
                escape_html(who)
            )
        }
        None => "<span>Signed out</span>".to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} · LetterMeet</title>
  <style>{STYLE}</style>
</head>
<body>
  <header class="top-nav">
    <div class="top-nav-inner">
      <a href="/" class="logo">LetterMeet</a>
      <nav>
        <a href="/inbox" class="nav-link">Inbox</a>
        <a href="/sent" class="nav-link">Sent</a>
      </nav>
      <div class="nav-auth">{auth_box}</div>
    </div>
  </header>
  <main class="main-shell">
{body}
  </main>
</body>
</html>"#,
        title = escape_html(title),
    ))
}

fn feedback_html(msg: Option<&str>) -> String {
    match msg {
        Some(m) => format!(r#"<div class="feedback">{}</div>"#, escape_html(m)),
        None => String::new(),
    }
}

fn sign_in_card(prompt: &str, feedback: Option<&str>, next: &str) -> String {
    format!(
        r#"<div class="card">
      <div class="card-title">Sign in</div>
      <div class="card-subtitle">{prompt}</div>
      {feedback}
      <form method="post" action="/session">
        <input type="hidden" name="action" value="login">
        <input type="hidden" name="next" value="{next}">
        <label>Email</label>
        <input type="email" name="email" required>
        <label>Password</label>
        <input type="password" name="password" required>
        <button>Sign in</button>
      </form>
      <form method="post" action="/session">
        <input type="hidden" name="action" value="register">
        <input type="hidden" name="next" value="{next}">
        <label>New here? Email</label>
        <input type="email" name="email" required>
        <label>Display name (optional)</label>
        <input type="text" name="display_name">
        <label>Password</label>
        <input type="password" name="password" required>
        <button class="btn-ghost">Create account</button>
      </form>
    </div>"#,
        prompt = escape_html(prompt),
        feedback = feedback_html(feedback),
        next = escape_html(next),
    )
}

fn status_tag(status: &str) -> String {
    let class = match status {
        "accepted" => "accepted",
        "rejected" => "rejected",
        _ => "pending",
    };
    format!(r#"<div class="tag {class}">{class}</div>"#)
}

enum RequestView {
    Inbox,
    Sent,
}

fn request_card(row: &RequestRow, view: &RequestView) -> String {
    let heading = match view {
        RequestView::Inbox => format!(
            "<strong>{}</strong> &rarr; You",
            escape_html(
                row.from_email
                    .as_deref()
                    .or(row.from_name.as_deref())
                    .unwrap_or("Unknown sender")
            )
        ),
        RequestView::Sent => format!(
            "You &rarr; <strong>{}</strong>",
            escape_html(
                row.to_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(&row.to_email)
            )
        ),
    };

    let note = match row.note.as_deref().filter(|n| !n.is_empty()) {
        Some(n) => format!(r#"<div class="request-note">Note: {}</div>"#, escape_html(n)),
        None => String::new(),
    };

    let actions = match view {
        RequestView::Inbox if row.status == "pending" => format!(
            r#"<div class="item-actions">
          <form method="post" action="/inbox/{id}/accept"><button class="btn-ghost" style="margin:0;">Accept</button></form>
          <form method="post" action="/inbox/{id}/decline"><button class="btn-danger" style="margin:0;">Decline</button></form>
        </div>"#,
            id = escape_html(&row.id)
        ),
        _ => String::new(),
    };

    format!(
        r#"<div class="request-item">
      <div class="request-main">
        <div>{heading}</div>
        {tag}
      </div>
      <div class="request-meta">{date} &middot; {start} &middot; {minutes} min</div>
      <div class="request-meta">Place: {place}</div>
      {note}
      {actions}
    </div>"#,
        tag = status_tag(&row.status),
        date = escape_html(&row.date),
        start = escape_html(&row.start_time),
        minutes = row.duration_minutes,
        place = escape_html(&row.place),
    )
}

// ============================================================================
// Compose
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ComposeForm {
    #[serde(default)]
    pub to_name: String,
    #[serde(default)]
    pub to_email: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub duration_minutes: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct ComposeQuery {
    pub sent: Option<String>,
    pub auth: Option<String>,
}

async fn render_compose(
    state: &AppState,
    user: &SessionUser,
    form: &ComposeForm,
    feedback: Option<&str>,
) -> Html<String> {
    // Autocomplete data is best-effort; a contact lookup failure never
    // blocks the compose page.
    let contacts = match state.db.top_contacts(&user.id, 10).await {
        Ok(contacts) => contacts,
        Err(e) => {
            tracing::warn!("contact lookup failed: {}", e);
            Vec::new()
        }
    };
    let datalist: String = contacts
        .iter()
        .map(|c| format!(r#"<option value="{}">"#, escape_html(&c.contact_email)))
        .collect();

    let body = format!(
        r#"<div class="card">
      <div class="card-title">Send a meet-up request</div>
      <div class="card-subtitle">Propose a date, a time and a place. The recipient accepts or declines.</div>
      {feedback}
      <form method="post" action="/compose">
        <label>Their name</label>
        <input type="text" name="to_name" value="{to_name}">
        <label>Their email *</label>
        <input type="email" name="to_email" value="{to_email}" list="recent-contacts" required>
        <datalist id="recent-contacts">{datalist}</datalist>
        <label>Date *</label>
        <input type="date" name="date" value="{date}" required>
        <label>Start time *</label>
        <input type="time" name="start_time" value="{start_time}" required>
        <label>Duration (minutes) *</label>
        <input type="number" name="duration_minutes" value="{duration_minutes}" placeholder="e.g. 60" required>
        <label>Place *</label>
        <input type="text" name="place" value="{place}" required>
        <label>Note (optional)</label>
        <textarea name="note" rows="3">{note}</textarea>
        <button>Send request</button>
      </form>
    </div>"#,
        feedback = feedback_html(feedback),
        to_name = escape_html(&form.to_name),
        to_email = escape_html(&form.to_email),
        date = escape_html(&form.date),
        start_time = escape_html(&form.start_time),
        duration_minutes = escape_html(&form.duration_minutes),
        place = escape_html(&form.place),
        note = escape_html(&form.note),
    );

    page_shell("Compose", Some(user), &body)
}

/// GET /
pub async fn compose_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ComposeQuery>,
) -> Html<String> {
    let Some(user) = session::current_user(&state, &headers).await else {
        let feedback = query
            .auth
            .as_deref()
            .map(|_| "Sign-in failed. Check your email and password.");
        return page_shell(
            "Welcome",
            None,
            &sign_in_card("Sign in to send meet-up requests.", feedback, "/"),
        );
    };

    let feedback = query
        .sent
        .as_deref()
        .map(|_| "Your meet-up request is on its way.");
    render_compose(&state, &user, &ComposeForm::default(), feedback).await
}

/// POST /compose
pub async fn compose_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ComposeForm>,
) -> Response {
    let Some(user) = session::current_user(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };

    let to_email = form.to_email.trim().to_lowercase();
    let duration: i64 = form.duration_minutes.trim().parse().unwrap_or(0);
    let required_ok = !to_email.is_empty()
        && !form.date.trim().is_empty()
        && !form.start_time.trim().is_empty()
        && !form.place.trim().is_empty()
        && duration > 0;
    if !required_ok {
        return render_compose(
            &state,
            &user,
            &form,
            Some("Please fill in all required fields."),
        )
        .await
        .into_response();
    }

    let to_name = Some(form.to_name.trim().to_string()).filter(|n| !n.is_empty());
    let row = RequestRow {
        id: Uuid::new_v4().to_string(),
        from_user_id: user.id.clone(),
        from_name: user.display_name.clone(),
        from_email: user.email.clone(),
        to_name: to_name.clone(),
        to_email: to_email.clone(),
        date: form.date.trim().to_string(),
        start_time: form.start_time.trim().to_string(),
        duration_minutes: duration,
        place: form.place.trim().to_string(),
        note: Some(form.note.trim().to_string()).filter(|n| !n.is_empty()),
        status: "pending".to_string(),
        created_at: None,
    };

    if let Err(e) = state.db.create_request(&row).await {
        tracing::error!("compose insert failed: {}", e);
        // Entered data stays on the form; the message stays generic.
        return render_compose(
            &state,
            &user,
            &form,
            Some("Sending failed. Please try again."),
        )
        .await
        .into_response();
    }

    if let Err(e) = state
        .db
        .upsert_contact(&user.id, &to_email, to_name.as_deref())
        .await
    {
        tracing::warn!("contact upsert for {} failed: {}", to_email, e);
    }

    notify::dispatch_new_request(&state, requests::creation_payload(&row));

    Redirect::to("/?sent=1").into_response()
}

// ============================================================================
// Inbox
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub msg: Option<String>,
}

/// GET /inbox
pub async fn inbox_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<InboxQuery>,
) -> Html<String> {
    let Some(user) = session::current_user(&state, &headers).await else {
        return page_shell(
            "Inbox",
            None,
            &sign_in_card("Sign in to view your inbox.", None, "/inbox"),
        );
    };

    let Some(email) = user.email.clone().filter(|e| !e.is_empty()) else {
        let body = r#"<div class="card">
      <div class="card-title">Inbox</div>
      <div class="card-subtitle">Your account has no email address, so requests cannot be addressed to you.</div>
    </div>"#;
        return page_shell("Inbox", Some(&user), body);
    };

    let mut feedback = query
        .msg
        .as_deref()
        .and_then(|m| match m {
            "update_failed" => Some("Failed to update status.".to_string()),
            _ => None,
        });

    let list = match state.db.requests_for_recipient(&email).await {
        Ok(rows) => {
            if rows.is_empty() && feedback.is_none() {
                feedback = Some("No requests yet.".to_string());
            }
            rows.iter()
                .map(|r| request_card(r, &RequestView::Inbox))
                .collect::<String>()
        }
        Err(e) => {
            tracing::error!("inbox load failed: {}", e);
            feedback = Some("Failed to load requests.".to_string());
            String::new()
        }
    };

    let body = format!(
        r#"<div class="card">
      <div class="card-title">Inbox &middot; {email}</div>
      <div class="card-subtitle">All meet-up requests sent to your account.</div>
      {feedback}
      <div class="list">{list}</div>
    </div>"#,
        email = escape_html(&email),
        feedback = feedback_html(feedback.as_deref()),
    );
    page_shell("Inbox", Some(&user), &body)
}

async fn decide(state: AppState, headers: HeaderMap, id: String, status: RequestStatus) -> Redirect {
    let Some(user) = session::current_user(&state, &headers).await else {
        return Redirect::to("/inbox");
    };
    let Some(email) = user.email.clone().filter(|e| !e.is_empty()) else {
        return Redirect::to("/inbox");
    };

    match state.db.update_request_status(&id, &email, status).await {
        Ok(true) => {
            match state.db.get_request(&id).await {
                Ok(Some(row)) => {
                    notify::dispatch_reply(&state, requests::reply_payload(&row, &user), status);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("post-update fetch failed: {}", e),
            }
            Redirect::to("/inbox")
        }
        Ok(false) => Redirect::to("/inbox?msg=update_failed"),
        Err(e) => {
            tracing::error!("status update failed: {}", e);
            Redirect::to("/inbox?msg=update_failed")
        }
    }
}

/// POST /inbox/:id/accept
pub async fn accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Redirect {
    decide(state, headers, id, RequestStatus::Accepted).await
}

/// POST /inbox/:id/decline
pub async fn decline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Redirect {
    decide(state, headers, id, RequestStatus::Rejected).await
}

// ============================================================================
// Sent
// ============================================================================

/// GET /sent
pub async fn sent_page(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let Some(user) = session::current_user(&state, &headers).await else {
        return page_shell(
            "Sent",
            None,
            &sign_in_card("Sign in to see the requests you sent.", None, "/sent"),
        );
    };

    let mut feedback = None;
    let list = match state.db.requests_for_sender(&user.id).await {
        Ok(rows) => {
            if rows.is_empty() {
                feedback = Some("You haven't sent any requests yet.".to_string());
            }
            rows.iter()
                .map(|r| request_card(r, &RequestView::Sent))
                .collect::<String>()
        }
        Err(e) => {
            tracing::error!("sent view load failed: {}", e);
            feedback = Some("Failed to load your sent requests.".to_string());
            String::new()
        }
    };

    let body = format!(
        r#"<div class="card">
      <div class="card-title">Sent requests</div>
      <div class="card-subtitle">These are the requests you've sent with LetterMeet.</div>
      {feedback}
      <div class="list">{list}</div>
    </div>"#,
        feedback = feedback_html(feedback.as_deref()),
    );
    page_shell("Sent", Some(&user), &body)
}

// ============================================================================
// Page session (cookie login/logout)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionForm {
    #[serde(default)]
    pub action: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only same-site relative paths survive; anything else falls back to "/".
fn sanitize_next(next: Option<&str>) -> &str {
    match next {
        Some(p) if p.starts_with('/') && !p.starts_with("//") => p,
        _ => "/",
    }
}

/// POST /session — form login (or registration), sets the session cookie.
pub async fn session_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SessionForm>,
) -> Response {
    let result = if form.action == "register" {
        auth::create_account(&state, &form.email, &form.password, form.display_name.clone()).await
    } else {
        auth::authenticate(&state, &form.email, &form.password).await
    };

    let user = match result {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("page sign-in failed: {}", e);
            return Redirect::to("/?auth=failed").into_response();
        }
    };

    let token = match generate_token(&user, &state.config.auth) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("token generation failed: {}", e);
            return Redirect::to("/?auth=failed").into_response();
        }
    };

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build();
    let next = sanitize_next(form.next.as_deref()).to_string();
    (jar.add(cookie), Redirect::to(&next)).into_response()
}

/// POST /logout
pub async fn logout(jar: CookieJar) -> Response {
    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(cookie), Redirect::to("/")).into_response()
}
