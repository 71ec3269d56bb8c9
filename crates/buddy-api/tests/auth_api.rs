mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use buddy_types::messages;
use common::{error_message, register, rpc, send, test_app};

#[tokio::test]
async fn login_normalizes_the_username() {
    let (_, app) = test_app();
    let registered = register(&app, "Ana", "student").await;
    assert_eq!(registered.user["username"], "ana");

    for attempt in ["  Ana ", "ana", "ANA"] {
        let (status, body) = rpc(
            &app,
            "authenticate_user",
            json!({ "p_username": attempt, "p_password": "senha123" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{attempt}: {body}");
        assert_eq!(body[0]["user_data"]["id"], registered.user["id"]);
        assert!(body[0]["user_data"]["last_login"].is_string());
    }
}

#[tokio::test]
async fn login_failures_carry_distinct_messages() {
    let (state, app) = test_app();
    register(&app, "ana", "parent").await;

    let (status, body) = rpc(
        &app,
        "authenticate_user",
        json!({ "p_username": "ana", "p_password": "errada" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), messages::INVALID_CREDENTIALS);

    let (status, body) = rpc(
        &app,
        "authenticate_user",
        json!({ "p_username": "ninguem", "p_password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), messages::USER_NOT_FOUND);

    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, role, created_at)
                 VALUES ('00000000-0000-4000-8000-000000000001', 'legado', NULL, 'parent', '2024-01-01T00:00:00.000000Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let (status, body) = rpc(
        &app,
        "authenticate_user",
        json!({ "p_username": "legado", "p_password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(error_message(&body).contains("não possui senha definida"));
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let (_, app) = test_app();

    let (status, body) = rpc(
        &app,
        "register_user",
        json!({ "p_username": "   ", "p_role": "student", "p_password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), messages::USERNAME_REQUIRED);

    let (status, body) = rpc(
        &app,
        "register_user",
        json!({ "p_username": "bia", "p_role": "student", "p_password": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), messages::PASSWORD_REQUIRED);

    register(&app, "bia", "student").await;
    let (status, body) = rpc(
        &app,
        "register_user",
        json!({ "p_username": "BIA", "p_role": "parent", "p_password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), messages::USERNAME_TAKEN);
}

#[tokio::test]
async fn only_students_receive_a_connection_code() {
    let (_, app) = test_app();

    let student = register(&app, "aluno", "student").await;
    let code = student.code();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let parent = register(&app, "pai", "parent").await;
    assert!(parent.user["connection_code"].is_null());
}

#[tokio::test]
async fn validate_session_returns_no_rows_for_bad_tokens() {
    let (_, app) = test_app();
    let user = register(&app, "ana", "educator").await;

    let (status, body) = rpc(&app, "validate_session", json!({ "p_session_token": user.token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user_data"]["username"], "ana");

    let (status, body) = rpc(&app, "validate_session", json!({ "p_session_token": "garbage" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let (_, app) = test_app();
    let user = register(&app, "ana", "parent").await;

    let (status, _) = send(&app, Method::DELETE, "/tables/user_sessions", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = rpc(&app, "validate_session", json!({ "p_session_token": user.token })).await;
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::GET, "/tables/connections", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn tables_require_a_bearer_token() {
    let (_, app) = test_app();
    let (status, _) = send(&app, Method::GET, "/tables/help_requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn avatar_updates_through_the_profile_table() {
    let (_, app) = test_app();
    let user = register(&app, "ana", "student").await;

    let url = "https://api.dicebear.com/7.x/bottts/svg?seed=abc&size=120&backgroundColor=transparent";
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/tables/users/me",
        Some(&user.token),
        Some(json!({ "avatar_url": url })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avatar_url"], url);
}

#[tokio::test]
async fn generated_codes_are_six_characters() {
    let (_, app) = test_app();
    let (status, body) = rpc(&app, "generate_connection_code", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_str().unwrap().len(), 6);
}
