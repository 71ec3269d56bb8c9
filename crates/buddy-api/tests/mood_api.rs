mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use buddy_types::messages;
use common::{connected_pair, error_message, register, rpc, send, test_app};

#[tokio::test]
async fn mood_logs_are_appended_newest_first() {
    let (_, app) = test_app();
    let student = register(&app, "aluno", "student").await;

    for mood in ["happy", "sad"] {
        let (status, body) = rpc(
            &app,
            "log_mood_rpc",
            json!({ "session_token": student.token, "mood_value": mood }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, logs) = rpc(&app, "get_mood_logs_rpc", json!({ "session_token": student.token })).await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["mood"], "sad");
    assert_eq!(logs[1]["mood"], "happy");
}

#[tokio::test]
async fn unknown_moods_and_guardian_logs_are_rejected() {
    let (_, app) = test_app();
    let (student, parent) = connected_pair(&app).await;

    let (status, body) = rpc(
        &app,
        "log_mood_rpc",
        json!({ "session_token": student.token, "mood_value": "grumpy" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), messages::INVALID_MOOD);

    let (status, body) = send(
        &app,
        Method::POST,
        "/tables/mood_logs",
        Some(&parent.token),
        Some(json!({ "mood": "calm" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), messages::STUDENTS_ONLY);
}

#[tokio::test]
async fn guardians_read_the_ten_latest_logs_of_their_students() {
    let (_, app) = test_app();
    let (student, parent) = connected_pair(&app).await;
    let outsider = register(&app, "outro", "educator").await;

    for _ in 0..12 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/tables/mood_logs",
            Some(&student.token),
            Some(json!({ "mood": "focused" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let uri = format!("/tables/mood_logs?student_ids={}", student.id());
    let (_, logs) = send(&app, Method::GET, &uri, Some(&parent.token), None).await;
    assert_eq!(logs.as_array().unwrap().len(), 10);

    let (_, logs) = send(&app, Method::GET, &uri, Some(&outsider.token), None).await;
    assert_eq!(logs, json!([]));
}
