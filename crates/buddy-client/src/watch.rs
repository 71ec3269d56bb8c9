use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use buddy_types::events::{ChangeOp, GatewayCommand, GatewayEvent};
use buddy_types::messages;

use crate::data::HelpBuddyData;
use crate::error::ClientError;

/// Matches the server's Identify window.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// A live subscription to help-request changes. Every change the server
/// sends re-fetches the help-request list, then is reported on
/// `next_change`.
/// Dropping the watch closes the socket.
pub struct HelpRequestWatch {
    task: JoinHandle<()>,
    changes: mpsc::UnboundedReceiver<ChangeOp>,
}

impl HelpRequestWatch {
    /// Wait for the next applied change. `None` once the feed has closed.
    pub async fn next_change(&mut self) -> Option<ChangeOp> {
        self.changes.recv().await
    }

    /// Close the socket and end the feed.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for HelpRequestWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl HelpBuddyData {
    /// Subscribe to the change feed instead of polling.
    pub async fn watch_help_requests(&self) -> Result<HelpRequestWatch, ClientError> {
        let token = self.client().token().ok_or(ClientError::NotLoggedIn)?;
        let url = self.client().backend().gateway_url();

        let (mut ws, _) = connect_async(url.as_str()).await.map_err(|e| {
            warn!("Gateway connection to {} failed: {}", url, e);
            ClientError::user("Erro no servidor")
        })?;

        let identify = serde_json::to_string(&GatewayCommand::Identify { token })
            .map_err(|e| ClientError::user(format!("Erro no servidor: {e}")))?;
        ws.send(Message::Text(identify.into()))
            .await
            .map_err(|_| ClientError::user("Erro no servidor"))?;

        let ready = tokio::time::timeout(READY_TIMEOUT, async {
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(GatewayEvent::Ready { username, .. }) =
                        serde_json::from_str::<GatewayEvent>(text.as_str())
                    {
                        return Some(username);
                    }
                }
            }
            None
        })
        .await
        .ok()
        .flatten();

        let Some(username) = ready else {
            return Err(ClientError::user(messages::SESSION_INVALID));
        };
        info!("Watching help requests as {}", username);

        let (tx, changes) = mpsc::unbounded_channel();
        let data = self.clone();

        let task = tokio::spawn(async move {
            while let Some(msg) = ws.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };

                let Ok(event) = serde_json::from_str::<GatewayEvent>(text.as_str()) else {
                    continue;
                };
                let (GatewayEvent::HelpRequestChanged { op, .. }, Some(student_id)) =
                    (&event, event.student_id())
                else {
                    continue;
                };
                let op = *op;

                // The server only sends events for our own or connected
                // students; an unknown one means the connection cache is stale.
                if !data.is_known_student(student_id).await {
                    debug!("Change for uncached student {}, refreshing connections", student_id);
                    if let Err(e) = data.fetch_connections().await {
                        warn!("Connection refresh after {:?} failed: {}", op, e);
                    }
                }

                if let Err(e) = data.fetch_help_requests().await {
                    warn!("Re-fetch after {:?} failed: {}", op, e);
                }
                if tx.send(op).is_err() {
                    break;
                }
            }
            debug!("Help request feed closed");
        });

        Ok(HelpRequestWatch { task, changes })
    }

    async fn is_known_student(&self, student_id: uuid::Uuid) -> bool {
        let own = self.client().current_user().map(|user| user.id);
        own == Some(student_id) || self.snapshot().await.connected_student_ids().contains(&student_id)
    }
}
