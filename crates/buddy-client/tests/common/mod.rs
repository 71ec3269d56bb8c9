#![allow(dead_code)]

use std::sync::Arc;

use tokio::task::JoinHandle;

use buddy_api::push::PushNotifier;
use buddy_api::{AppState, AppStateInner, build_router_with};
use buddy_client::{Backend, BuddyClient, HelpBuddyData, MemorySessionStore};
use buddy_db::Database;
use buddy_types::models::Role;

/// A real server on an ephemeral port over an in-memory database.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server(with_rpc: bool) -> TestServer {
    let state = AppStateInner::new(
        Database::open_in_memory().unwrap(),
        "client-integration-secret".to_string(),
        chrono::Duration::hours(1),
        PushNotifier::disabled(),
    );
    let app = build_router_with(state.clone(), with_rpc);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        state,
        handle,
    }
}

pub fn new_client(server: &TestServer) -> Arc<BuddyClient> {
    Arc::new(BuddyClient::new(
        Backend::new(server.base_url.clone()),
        Arc::new(MemorySessionStore::new()),
    ))
}

/// Register `username` and return its data handle.
pub async fn signed_in(server: &TestServer, username: &str, role: Role) -> HelpBuddyData {
    let client = new_client(server);
    client.register(username, role, "senha123", None).await.unwrap();
    HelpBuddyData::new(client)
}

/// A student and a parent connected through the student's code.
pub async fn family(server: &TestServer) -> (HelpBuddyData, HelpBuddyData) {
    let student = signed_in(server, "aluno", Role::Student).await;
    let parent = signed_in(server, "mae", Role::Parent).await;

    let code = student
        .client()
        .current_user()
        .and_then(|user| user.connection_code)
        .unwrap();
    parent.connect_to_student(&code).await.unwrap();

    (student, parent)
}
