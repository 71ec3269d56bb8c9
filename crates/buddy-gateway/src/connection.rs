use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use buddy_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Time a client has to send `Identify` after connecting.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Who a verified token belongs to.
#[derive(Debug, Clone)]
pub struct Identified {
    pub user_id: Uuid,
    pub username: String,
}

/// Resolves the token sent in `Identify`. Implemented by the API layer, which
/// owns session storage.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Option<Identified>;
}

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// forward the user's change-feed events until either side goes away.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    verifier: Arc<dyn TokenVerifier>,
) {
    let (mut sender, mut receiver) = socket.split();

    let identified = match wait_for_identify(&mut receiver, verifier).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", identified.username, identified.user_id);

    // Register before Ready so no event published after Ready is missed.
    let (conn_id, user_rx) = dispatcher.register_user_channel(identified.user_id).await;

    let ready = GatewayEvent::Ready {
        user_id: identified.user_id,
        username: identified.username.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        dispatcher.unregister_user_channel(identified.user_id, conn_id).await;
        return;
    }

    let user_id = identified.user_id;
    run_connection_loop(sender, receiver, user_rx, identified).await;
    dispatcher.unregister_user_channel(user_id, conn_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut user_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    identified: Identified,
) {
    let user_id = identified.user_id;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The feed is server -> client only; the read side just tracks liveness.
    let username = identified.username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => {
                    let preview: String = text.as_str().chars().take(200).collect();
                    debug!("{} ({}) sent unexpected text frame: {}", username, user_id, preview);
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", identified.username, user_id);
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    verifier: Arc<dyn TokenVerifier>,
) -> Option<Identified> {
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(text.as_str())
                {
                    return verify_blocking(verifier, token).await;
                }
            }
        }
        None
    });

    identify.await.ok().flatten()
}

/// Token checks hit the database, so they run on the blocking pool.
async fn verify_blocking(verifier: Arc<dyn TokenVerifier>, token: String) -> Option<Identified> {
    tokio::task::spawn_blocking(move || verifier.verify(&token))
        .await
        .map_err(|e| warn!("Token verification task failed: {}", e))
        .ok()
        .flatten()
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| {
        warn!("Failed to encode gateway event: {}", e);
    })?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts one token; panics if called from an async worker thread.
    struct BlockingOnly;

    impl TokenVerifier for BlockingOnly {
        fn verify(&self, token: &str) -> Option<Identified> {
            // block_on is refused on runtime workers, allowed on the blocking pool.
            tokio::runtime::Handle::current().block_on(async {});
            (token == "good").then(|| Identified {
                user_id: Uuid::nil(),
                username: "mae".into(),
            })
        }
    }

    #[tokio::test]
    async fn tokens_are_verified_off_the_async_workers() {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(BlockingOnly);

        let found = verify_blocking(verifier.clone(), "good".into()).await;
        assert_eq!(found.map(|id| id.username), Some("mae".to_string()));
        assert!(verify_blocking(verifier, "bad".into()).await.is_none());
    }
}
