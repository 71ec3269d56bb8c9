#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use buddy_api::push::PushNotifier;
use buddy_api::{AppState, AppStateInner, build_router};
use buddy_db::Database;

/// Fresh state over an in-memory database, push delivery disabled.
pub fn test_state() -> AppState {
    AppStateInner::new(
        Database::open_in_memory().expect("in-memory db should open"),
        "integration-test-secret".to_string(),
        chrono::Duration::hours(1),
        PushNotifier::disabled(),
    )
}

pub fn test_app() -> (AppState, Router) {
    let state = test_state();
    let app = build_router(state.clone());
    (state, app)
}

/// Send one request through the router and decode the JSON body. Empty
/// bodies decode to `Value::Null`.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn rpc(app: &Router, name: &str, args: Value) -> (StatusCode, Value) {
    send(app, Method::POST, &format!("/rpc/{name}"), None, Some(args)).await
}

/// A registered account: its session token and `user_data`.
pub struct TestUser {
    pub token: String,
    pub user: Value,
}

impl TestUser {
    pub fn id(&self) -> &str {
        self.user["id"].as_str().unwrap()
    }

    pub fn code(&self) -> &str {
        self.user["connection_code"].as_str().unwrap()
    }
}

pub async fn register(app: &Router, username: &str, role: &str) -> TestUser {
    let (status, body) = rpc(
        app,
        "register_user",
        json!({ "p_username": username, "p_role": role, "p_password": "senha123" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");

    TestUser {
        token: body[0]["session_token"].as_str().unwrap().to_string(),
        user: body[0]["user_data"].clone(),
    }
}

/// Register a student and a parent, and connect the parent to the student.
pub async fn connected_pair(app: &Router) -> (TestUser, TestUser) {
    let student = register(app, "aluno", "student").await;
    let parent = register(app, "mae", "parent").await;

    let (status, body) = rpc(
        app,
        "connect_to_student_rpc",
        json!({ "session_token": parent.token, "connection_code": student.code() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "connect: {body}");

    (student, parent)
}

pub fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}
