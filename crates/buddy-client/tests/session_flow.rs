mod common;

use std::sync::Arc;

use buddy_client::{Backend, BuddyClient, MemorySessionStore, SessionStore};
use buddy_types::models::Role;
use common::{new_client, signed_in, spawn_server};

#[tokio::test]
async fn login_is_insensitive_to_case_and_blanks() {
    let server = spawn_server(true).await;
    let registered = signed_in(&server, "Ana", Role::Student).await;
    let id = registered.client().current_user().unwrap().id;

    for attempt in ["  Ana ", "ana"] {
        let client = new_client(&server);
        let user = client.login(attempt, "senha123").await.unwrap();
        assert_eq!(user.id, id);
        assert!(client.token().is_some());
    }
}

#[tokio::test]
async fn login_errors_are_translated() {
    let server = spawn_server(true).await;
    signed_in(&server, "ana", Role::Parent).await;
    let client = new_client(&server);

    let err = client.login("ana", "errada").await.unwrap_err();
    assert_eq!(err.to_string(), "Senha incorreta. Tente novamente.");

    let err = client.login("ninguem", "x").await.unwrap_err();
    assert_eq!(err.to_string(), "Usuário não encontrado. Verifique o nome e tente novamente.");
    assert!(client.current_user().is_none());
}

#[tokio::test]
async fn register_errors_are_translated() {
    let server = spawn_server(true).await;
    signed_in(&server, "ana", Role::Parent).await;
    let client = new_client(&server);

    let err = client.register("ANA", Role::Student, "x", None).await.unwrap_err();
    assert_eq!(err.to_string(), "Nome de usuário já existe");

    let err = client.register(" ", Role::Student, "x", None).await.unwrap_err();
    assert_eq!(err.to_string(), "Nome de usuário é obrigatório");
}

#[tokio::test]
async fn logout_revokes_the_old_token() {
    let server = spawn_server(true).await;
    let data = signed_in(&server, "ana", Role::Educator).await;
    let client = data.client().clone();
    let old_token = client.token().unwrap();

    assert!(client.check_session().await.is_some());
    client.logout().await;
    assert!(client.token().is_none());
    assert!(client.current_user().is_none());

    // A second device still holding the old token is signed out too.
    let store = Arc::new(MemorySessionStore::new());
    store.save(&old_token).unwrap();
    let restored = BuddyClient::new(Backend::new(server.base_url.clone()), store);

    assert!(restored.check_session().await.is_none());
    assert!(restored.token().is_none());
}

#[tokio::test]
async fn logout_clears_local_state_even_when_server_is_gone() {
    let server = spawn_server(true).await;
    let data = signed_in(&server, "ana", Role::Student).await;
    let client = data.client().clone();
    drop(server);

    client.logout().await;
    assert!(client.token().is_none());
    assert!(client.current_user().is_none());
}

#[tokio::test]
async fn avatar_update_requires_a_session() {
    let server = spawn_server(true).await;
    let anonymous = new_client(&server);
    let err = anonymous.update_avatar("https://x").await.unwrap_err();
    assert_eq!(err.to_string(), "Usuário não logado");

    let data = signed_in(&server, "ana", Role::Student).await;
    let url = buddy_client::avatar::avatar_url("bottts", "abc123");
    let user = data.client().update_avatar(&url).await.unwrap();
    assert_eq!(user.avatar_url.as_deref(), Some(url.as_str()));
    assert_eq!(data.client().current_user().unwrap().avatar_url, Some(url));
}
