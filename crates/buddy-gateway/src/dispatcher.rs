use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use buddy_types::events::GatewayEvent;

type UserSender = (Uuid, mpsc::UnboundedSender<GatewayEvent>);

/// Routes change-feed events to the connected sockets of specific users.
/// A user may hold several sockets at once (one per open tab).
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> [(conn_id, sender)]
    user_channels: RwLock<HashMap<Uuid, Vec<UserSender>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-connection channel for a user. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    /// Drop the channel registered under `conn_id`, leaving the user's other
    /// connections in place.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(senders) = channels.get_mut(&user_id) {
            senders.retain(|(id, _)| *id != conn_id);
            if senders.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send an event to every connection of one user.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        self.send_to_users(&[user_id], event).await;
    }

    /// Send an event to every connection of each listed user.
    pub async fn send_to_users(&self, user_ids: &[Uuid], event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        for user_id in user_ids {
            if let Some(senders) = channels.get(user_id) {
                for (_, tx) in senders {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    /// Number of live connections a user holds.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .user_channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, Vec::len)
    }
}
