//! End-to-end tests against the router, with an in-memory database and a
//! recording mail transport.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lettre::transport::stub::AsyncStubTransport;
use serde_json::{json, Value};
use tower::ServiceExt;

use lettermeet_server::{
    config::Config, db::Database, mailer::Mailer, routes::create_router, state::AppState,
};

async fn test_app() -> (Router, AsyncStubTransport) {
    let db = Database::in_memory().await.unwrap();
    let (mailer, stub) = Mailer::stub().unwrap();
    let mut config = Config::default();
    config.site.public_url = "https://lettermeet.test".to_string();
    let state = AppState::new(db, config, mailer);
    (create_router(state), stub)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, email: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "secret1", "displayName": name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn notify_body() -> Value {
    json!({
        "toEmail": "a@x.com",
        "toName": "Ada",
        "fromEmail": "ben@x.com",
        "fromName": "Ben",
        "date": "2024-01-01",
        "startTime": "10:00",
        "durationMinutes": 30,
        "place": "Cafe"
    })
}

#[tokio::test]
async fn health_check_works() {
    let (app, _stub) = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn notify_new_request_sends_one_email() {
    let (app, stub) = test_app().await;

    let (status, body) = send(&app, "POST", "/notify-new-request", None, Some(notify_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let messages = stub.messages().await;
    assert_eq!(messages.len(), 1);
    let (envelope, raw) = &messages[0];
    assert_eq!(envelope.to()[0].to_string(), "a@x.com");
    assert!(raw.contains("New LetterMeet request from Ben"));
    assert!(raw.contains("https://lettermeet.test/inbox"));
}

#[tokio::test]
async fn notify_endpoints_require_to_email() {
    let (app, stub) = test_app().await;

    for uri in ["/notify-new-request", "/notify-reply"] {
        let (status, body) = send(
            &app,
            "POST",
            uri,
            None,
            Some(json!({ "fromName": "Ben", "date": "2024-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing toEmail");
    }

    assert!(stub.messages().await.is_empty());
}

#[tokio::test]
async fn notify_reply_requires_a_status() {
    let (app, stub) = test_app().await;

    let (status, body) = send(&app, "POST", "/notify-reply", None, Some(notify_body())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing status");
    assert!(stub.messages().await.is_empty());
}

#[tokio::test]
async fn notify_reply_reflects_the_decision() {
    let (app, stub) = test_app().await;

    let mut body = notify_body();
    body["status"] = json!("accepted");
    let (status, _) = send(&app, "POST", "/notify-reply", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let messages = stub.messages().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1.contains("your request was accepted"));
    assert!(messages[0].1.contains("https://lettermeet.test/sent"));
}

#[tokio::test]
async fn session_endpoint_fails_open() {
    let (app, _stub) = test_app().await;

    // No token at all
    let (status, body) = send(&app, "GET", "/auth/session", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], Value::Null);

    // Garbage token
    let (status, body) = send(&app, "GET", "/auth/session", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], Value::Null);

    // Real token
    let token = register(&app, "ada@x.com", "Ada").await;
    let (status, body) = send(&app, "GET", "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@x.com");
}

#[tokio::test]
async fn request_lifecycle_end_to_end() {
    let (app, stub) = test_app().await;

    let sender = register(&app, "ada@x.com", "Ada").await;
    let recipient = register(&app, "ben@x.com", "Ben").await;

    // Anonymous create is rejected
    let create_body = json!({
        "toName": "Ben",
        "toEmail": "ben@x.com",
        "date": "2024-01-01",
        "startTime": "10:00",
        "durationMinutes": 45,
        "place": "Cafe"
    });
    let (status, _) = send(&app, "POST", "/requests", None, Some(create_body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Sender creates a request
    let (status, created) = send(&app, "POST", "/requests", Some(&sender), Some(create_body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["fromEmail"], "ada@x.com");
    let id = created["id"].as_str().unwrap().to_string();

    // The creation email goes out fire-and-forget
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let messages = stub.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0.to()[0].to_string(), "ben@x.com");
    assert!(messages[0].1.contains("New LetterMeet request from Ada"));

    // Recipient sees it in the inbox; the sender's inbox stays empty
    let (status, inbox) = send(&app, "GET", "/requests/inbox", Some(&recipient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    let (_, sender_inbox) = send(&app, "GET", "/requests/inbox", Some(&sender), None).await;
    assert!(sender_inbox.as_array().unwrap().is_empty());

    // Only the recipient may decide
    let uri = format!("/requests/{}/status", id);
    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&sender),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &app,
        "POST",
        &uri,
        Some(&recipient),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "accepted");

    // Terminal state: a second decision is rejected
    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&recipient),
        Some(json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The reply email went back to the sender
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let messages = stub.messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].0.to()[0].to_string(), "ada@x.com");
    assert!(messages[1].1.contains("your request was accepted"));

    // Sender's sent view reflects the decision
    let (status, sent) = send(&app, "GET", "/requests/sent", Some(&sender), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent.as_array().unwrap().len(), 1);
    assert_eq!(sent[0]["status"], "accepted");
}

#[tokio::test]
async fn sending_records_a_contact() {
    let (app, _stub) = test_app().await;
    let sender = register(&app, "ada@x.com", "Ada").await;

    let (status, _) = send(
        &app,
        "POST",
        "/requests",
        Some(&sender),
        Some(json!({
            "toName": "Ben",
            "toEmail": "ben@x.com",
            "date": "2024-01-01",
            "startTime": "10:00",
            "durationMinutes": 30,
            "place": "Cafe"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/contacts", Some(&sender), None).await;
    assert_eq!(status, StatusCode::OK);
    let contacts = body["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0]["email"], "ben@x.com");
    assert_eq!(contacts[0]["name"], "Ben");
}

#[tokio::test]
async fn failed_compose_submit_keeps_the_entered_values() {
    let (app, stub) = test_app().await;
    let token = register(&app, "ada@x.com", "Ada").await;

    // Required `place` left blank; everything else filled in.
    let form = "to_name=Ben&to_email=ben%40x.com&date=2024-01-01\
                &start_time=10%3A00&duration_minutes=45&place=&note=Tea%3F";
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/compose")
                .header(header::COOKIE, format!("lettermeet_session={}", token))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = String::from_utf8(
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec(),
    )
    .unwrap();
    assert!(html.contains("Please fill in all required fields."));
    assert!(html.contains(r#"value="ben@x.com""#));
    assert!(html.contains(r#"value="2024-01-01""#));
    assert!(html.contains(r#"value="45""#));
    assert!(html.contains("Tea?"));

    // Nothing was stored and nothing was sent
    let (_, sent) = send(&app, "GET", "/requests/sent", Some(&token), None).await;
    assert!(sent.as_array().unwrap().is_empty());
    assert!(stub.messages().await.is_empty());
}

#[tokio::test]
async fn pages_render_for_signed_out_and_signed_in() {
    let (app, _stub) = test_app().await;

    // Signed out: the sign-in card
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec(),
    )
    .unwrap();
    assert!(html.contains("Sign in to send meet-up requests."));

    // Signed in via the session cookie
    let token = register(&app, "ada@x.com", "Ada").await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/inbox")
                .header(header::COOKIE, format!("lettermeet_session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec(),
    )
    .unwrap();
    assert!(html.contains("Inbox &middot; ada@x.com"));
    assert!(html.contains("No requests yet."));
}
