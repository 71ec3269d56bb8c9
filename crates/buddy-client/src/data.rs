use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use buddy_types::api::{
    ConnectToStudentArgs, ConnectionRpcResult, InsertConnectionRequest, InsertMoodLogRequest,
    LogMoodArgs, ResolveHelpRequestArgs, SessionArgs, UpdateHelpRequestRequest, UserLookup,
};
use buddy_types::messages;
use buddy_types::models::{Connection, HelpRequest, MOOD_LOG_LIMIT, Mood, MoodLog, Role};

use crate::auth::BuddyClient;
use crate::error::{BackendError, ClientError};
use crate::fallback::Fallback;

/// What the dashboards render from. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Default)]
pub struct DataState {
    pub connections: Vec<Connection>,
    pub mood_logs: Vec<MoodLog>,
    pub help_requests: Vec<HelpRequest>,
}

impl DataState {
    /// Students whose rows belong on screen, from the cached connections.
    pub fn connected_student_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.connections.iter().map(|c| c.student_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn active_help_request(&self, student_id: Uuid) -> Option<&HelpRequest> {
        self.help_requests
            .iter()
            .find(|request| request.student_id == student_id && request.is_active)
    }
}

/// Data access for the signed-in user. Fetches prefer the named procedures
/// and fall back to direct tables when those cannot be served.
#[derive(Clone)]
pub struct HelpBuddyData {
    client: Arc<BuddyClient>,
    state: Arc<RwLock<DataState>>,
}

impl HelpBuddyData {
    pub fn new(client: Arc<BuddyClient>) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(DataState::default())),
        }
    }

    pub fn client(&self) -> &Arc<BuddyClient> {
        &self.client
    }

    pub async fn snapshot(&self) -> DataState {
        self.state.read().await.clone()
    }

    fn require_token(&self) -> Result<String, ClientError> {
        self.client.token().ok_or(ClientError::NotLoggedIn)
    }

    /// `student_ids` filter for the table fallback: the caller plus cached
    /// connected students. `None` until any connection is known, leaving the
    /// server's own scoping in charge.
    async fn student_filter(&self) -> Option<String> {
        let connected = self.state.read().await.connected_student_ids();
        if connected.is_empty() {
            return None;
        }

        let mut ids: Vec<String> = connected.iter().map(Uuid::to_string).collect();
        if let Some(user) = self.client.current_user() {
            ids.push(user.id.to_string());
        }
        Some(ids.join(","))
    }

    // -- Fetches --

    pub async fn fetch_connections(&self) -> Result<(), ClientError> {
        let Some(token) = self.client.token() else {
            debug!("No session, skipping connections fetch");
            return Ok(());
        };
        let backend = self.client.backend();
        let token = token.as_str();

        let connections = Fallback::new("fetch_connections")
            .run(
                move || async move {
                    let args = SessionArgs {
                        session_token: token.to_string(),
                    };
                    let rows: Vec<ConnectionRpcResult> =
                        backend.rpc("get_connections_rpc", &args).await?;
                    Ok(rows.into_iter().map(Connection::from).collect())
                },
                move || async move { backend.get("/tables/connections", token, &[]).await },
            )
            .await?;

        self.state.write().await.connections = connections;
        Ok(())
    }

    pub async fn fetch_mood_logs(&self) -> Result<(), ClientError> {
        let Some(token) = self.client.token() else {
            debug!("No session, skipping mood log fetch");
            return Ok(());
        };
        let backend = self.client.backend();
        let token = token.as_str();

        let mut query = vec![("limit", MOOD_LOG_LIMIT.to_string())];
        if let Some(ids) = self.student_filter().await {
            query.push(("student_ids", ids));
        }
        let query = query.as_slice();

        let logs = Fallback::new("fetch_mood_logs")
            .run(
                move || async move {
                    let args = SessionArgs {
                        session_token: token.to_string(),
                    };
                    backend.rpc("get_mood_logs_rpc", &args).await
                },
                move || async move { backend.get("/tables/mood_logs", token, query).await },
            )
            .await?;

        self.state.write().await.mood_logs = logs;
        Ok(())
    }

    pub async fn fetch_help_requests(&self) -> Result<(), ClientError> {
        let Some(token) = self.client.token() else {
            debug!("No session, skipping help request fetch");
            return Ok(());
        };
        let backend = self.client.backend();
        let token = token.as_str();

        let mut query = Vec::new();
        if let Some(ids) = self.student_filter().await {
            query.push(("student_ids", ids));
        }
        let query = query.as_slice();

        let requests = Fallback::new("fetch_help_requests")
            .run(
                move || async move {
                    let args = SessionArgs {
                        session_token: token.to_string(),
                    };
                    backend.rpc("get_help_requests_rpc", &args).await
                },
                move || async move { backend.get("/tables/help_requests", token, query).await },
            )
            .await?;

        self.state.write().await.help_requests = requests;
        Ok(())
    }

    /// Run all three fetches concurrently. Failures are logged, not returned.
    pub async fn refresh_all(&self) {
        let (connections, moods, requests) = tokio::join!(
            self.fetch_connections(),
            self.fetch_mood_logs(),
            self.fetch_help_requests()
        );

        for (what, result) in [
            ("connections", connections),
            ("mood logs", moods),
            ("help requests", requests),
        ] {
            if let Err(e) = result {
                warn!("Failed to fetch {}: {}", what, e);
            }
        }
    }

    // -- Mutations --

    /// Link the signed-in parent/educator to the student holding `code`.
    pub async fn connect_to_student(&self, code: &str) -> Result<Connection, ClientError> {
        if let Some(user) = self.client.current_user() {
            if !user.role.is_guardian() {
                return Err(ClientError::user(messages::GUARDIANS_ONLY));
            }
        }

        let token = self.require_token()?;
        let backend = self.client.backend();
        let token = token.as_str();
        let code = code.trim().to_uppercase();
        let code = code.as_str();

        let connection = Fallback::new("connect_to_student")
            .run(
                move || async move {
                    let args = ConnectToStudentArgs {
                        session_token: token.to_string(),
                        connection_code: code.to_string(),
                    };
                    let row: ConnectionRpcResult =
                        backend.rpc("connect_to_student_rpc", &args).await?;
                    Ok(Connection::from(row))
                },
                move || async move {
                    let query = [
                        ("connection_code", code.to_string()),
                        ("role", Role::Student.as_str().to_string()),
                    ];
                    let found: Vec<UserLookup> = backend.get("/tables/users", token, &query).await?;
                    let Some(student) = found.into_iter().next() else {
                        return Err(BackendError {
                            status: Some(404),
                            code: "NOT_FOUND".into(),
                            message: messages::INVALID_CODE.into(),
                        });
                    };

                    let body = InsertConnectionRequest {
                        student_id: student.id,
                    };
                    backend.post("/tables/connections", token, &body).await
                },
            )
            .await
            .map_err(connect_error)?;

        info!("Connected to student {}", connection.student_id);
        self.refresh_after("connections", self.fetch_connections()).await;
        Ok(connection)
    }

    /// Delete a connection the caller is part of.
    pub async fn remove_connection(&self, connection_id: Uuid) -> Result<(), ClientError> {
        let token = self.require_token()?;
        self.client
            .backend()
            .delete(&format!("/tables/connections/{connection_id}"), &token, &[])
            .await?;

        self.refresh_after("connections", self.fetch_connections()).await;
        Ok(())
    }

    pub async fn log_mood(&self, mood: Mood) -> Result<MoodLog, ClientError> {
        let token = self.require_token()?;
        let backend = self.client.backend();
        let token = token.as_str();

        let log = Fallback::new("log_mood")
            .run(
                move || async move {
                    let args = LogMoodArgs {
                        session_token: token.to_string(),
                        mood_value: mood.as_str().to_string(),
                    };
                    backend.rpc("log_mood_rpc", &args).await
                },
                move || async move {
                    backend
                        .post("/tables/mood_logs", token, &InsertMoodLogRequest { mood })
                        .await
                },
            )
            .await?;

        self.refresh_after("mood logs", self.fetch_mood_logs()).await;
        Ok(log)
    }

    /// Ask for help. The server refuses a second active request.
    pub async fn create_help_request(&self) -> Result<HelpRequest, ClientError> {
        let token = self.require_token()?;
        let backend = self.client.backend();
        let token = token.as_str();

        let request = Fallback::new("create_help_request")
            .run(
                move || async move {
                    let args = SessionArgs {
                        session_token: token.to_string(),
                    };
                    backend.rpc("create_help_request_rpc", &args).await
                },
                move || async move {
                    backend
                        .post("/tables/help_requests", token, &serde_json::json!({}))
                        .await
                },
            )
            .await?;

        self.refresh_after("help requests", self.fetch_help_requests()).await;
        Ok(request)
    }

    pub async fn resolve_help_request(&self, request_id: &str) -> Result<HelpRequest, ClientError> {
        let request_id = Uuid::parse_str(request_id.trim())
            .map_err(|_| ClientError::user(messages::INVALID_HELP_ID))?;

        let token = self.require_token()?;
        let backend = self.client.backend();
        let token = token.as_str();

        let request = Fallback::new("resolve_help_request")
            .run(
                move || async move {
                    let args = ResolveHelpRequestArgs {
                        session_token: token.to_string(),
                        help_request_id: request_id.to_string(),
                    };
                    backend.rpc("resolve_help_request_rpc", &args).await
                },
                move || async move {
                    let body = UpdateHelpRequestRequest { is_active: false };
                    backend
                        .patch(&format!("/tables/help_requests/{request_id}"), token, &body)
                        .await
                },
            )
            .await?;

        self.refresh_after("help requests", self.fetch_help_requests()).await;
        Ok(request)
    }

    async fn refresh_after(
        &self,
        what: &str,
        fetch: impl std::future::Future<Output = Result<(), ClientError>>,
    ) {
        if let Err(e) = fetch.await {
            warn!("Refreshing {} failed: {}", what, e);
        }
    }
}

fn connect_error(e: BackendError) -> ClientError {
    if e.is_conflict() {
        ClientError::user(messages::ALREADY_CONNECTED)
    } else if e.message.contains(messages::INVALID_CODE) {
        ClientError::user(messages::INVALID_CODE)
    } else {
        ClientError::Backend(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn connection(student_id: Uuid) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            parent_educator_id: Uuid::new_v4(),
            student_id,
            created_at: Utc::now(),
            student_profile: None,
        }
    }

    #[test]
    fn connected_ids_are_deduplicated() {
        let student = Uuid::new_v4();
        let state = DataState {
            connections: vec![connection(student), connection(student)],
            ..Default::default()
        };
        assert_eq!(state.connected_student_ids(), vec![student]);
    }

    #[test]
    fn conflicts_read_as_already_connected() {
        let err = connect_error(BackendError {
            status: Some(409),
            code: "CONFLICT".into(),
            message: "whatever".into(),
        });
        assert_eq!(err.to_string(), messages::ALREADY_CONNECTED);
    }

    #[tokio::test]
    async fn fetches_without_a_session_leave_state_alone() {
        let client = Arc::new(BuddyClient::new(
            crate::backend::Backend::new("http://127.0.0.1:9"),
            Arc::new(crate::session::MemorySessionStore::new()),
        ));
        let data = HelpBuddyData::new(client);

        data.refresh_all().await;
        let state = data.snapshot().await;
        assert!(state.connections.is_empty());
        assert!(state.help_requests.is_empty());

        assert!(matches!(data.create_help_request().await, Err(ClientError::NotLoggedIn)));
    }
}
