mod common;

use buddy_types::messages;
use buddy_types::models::Role;
use common::{family, signed_in, spawn_server};

const ENDPOINT: &str = "https://push.example.com/send/abc";
const P256DH: &str = "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM";
const AUTH: &str = "tBHItJI5svbpez7KI4CCXg==";

#[tokio::test]
async fn subscriptions_can_be_added_and_removed() {
    let server = spawn_server(true).await;
    let parent = signed_in(&server, "mae", Role::Parent).await;
    let client = parent.client();

    client.subscribe_push(ENDPOINT, P256DH, AUTH).await.unwrap();
    client.subscribe_push(ENDPOINT, P256DH, AUTH).await.unwrap();
    client.unsubscribe_push(ENDPOINT).await.unwrap();

    let err = client.unsubscribe_push(ENDPOINT).await.unwrap_err();
    assert_eq!(err.to_string(), messages::SUBSCRIPTION_NOT_FOUND);
}

#[tokio::test]
async fn plain_http_endpoints_are_rejected() {
    let server = spawn_server(true).await;
    let parent = signed_in(&server, "mae", Role::Parent).await;

    let err = parent
        .client()
        .subscribe_push("http://push.example.com/x", P256DH, AUTH)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), messages::INVALID_SUBSCRIPTION);
}

#[tokio::test]
async fn notifications_need_a_connection() {
    let server = spawn_server(true).await;
    let (student, parent) = family(&server).await;
    let stranger = signed_in(&server, "professor", Role::Educator).await;
    let student_id = student.client().current_user().unwrap().id;

    // Delivery is not configured on the test server, so nothing is handed off.
    let delivered = parent
        .client()
        .send_notification(student_id, "Oi", "Tudo bem?")
        .await
        .unwrap();
    assert_eq!(delivered, 0);

    let err = stranger
        .client()
        .send_notification(student_id, "Oi", "Tudo bem?")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), messages::NOT_CONNECTED);
}
