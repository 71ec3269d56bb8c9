mod config;

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{info, warn};

use buddy_api::cleanup::run_session_cleanup;
use buddy_api::push::PushNotifier;
use buddy_api::{AppStateInner, build_router};

use crate::config::Config;

/// How often expired session rows are purged.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buddy=debug,tower_http=debug".into()),
        )
        .init();

    let db = buddy_db::Database::open(&config.db_path)?;

    if config.push_function_url.is_none() {
        warn!("BUDDY_PUSH_FUNCTION_URL not set, push notifications are disabled");
    }

    let state = AppStateInner::new(
        db,
        config.jwt_secret.clone(),
        config.session_ttl(),
        PushNotifier::new(config.push_function_url.clone()),
    );

    tokio::spawn(run_session_cleanup(state.clone(), SESSION_CLEANUP_INTERVAL));

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Help Buddy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
