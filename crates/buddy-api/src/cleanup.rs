use std::time::Duration;

use tracing::{info, warn};

use crate::state::{AppState, db_call};

/// Background task that drops expired session rows.
///
/// Expired tokens are already refused at lookup; this only keeps the table
/// from growing without bound.
pub async fn run_session_cleanup(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        match db_call(&state, |s| Ok(s.db.purge_expired_sessions()?)).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired sessions", count);
                }
            }
            Err(e) => {
                warn!("Session cleanup error: {}", e);
            }
        }
    }
}
