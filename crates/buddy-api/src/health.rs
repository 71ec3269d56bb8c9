use axum::{Json, extract::State};

use buddy_types::api::HealthResponse;

use crate::state::{AppState, db_call};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = db_call(&state, |s| Ok(s.db.is_healthy()))
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db_healthy,
    })
}
