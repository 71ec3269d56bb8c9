use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use buddy_db::Database;
use buddy_gateway::dispatcher::Dispatcher;

use crate::error::{ApiError, ApiResult};
use crate::push::PushNotifier;

pub type AppState = Arc<AppStateInner>;

/// Shared state injected into all handlers.
pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub dispatcher: Dispatcher,
    pub push: PushNotifier,
}

impl AppStateInner {
    pub fn new(
        db: Database,
        jwt_secret: String,
        session_ttl: chrono::Duration,
        push: PushNotifier,
    ) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            session_ttl,
            dispatcher: Dispatcher::new(),
            push,
        })
    }
}

/// Run blocking DB work (and password hashing) off the async runtime.
pub async fn db_call<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
}
