use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use buddy_gateway::connection::{self, TokenVerifier};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, health, push, rpc, tables};

/// Auth procedures. These never require a session.
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/rpc/authenticate_user", post(auth::authenticate_user))
        .route("/rpc/register_user", post(auth::register_user))
        .route("/rpc/validate_session", post(auth::validate_session))
        .route("/rpc/generate_connection_code", post(auth::generate_connection_code))
        .with_state(state)
}

/// Data procedures; the session token travels in the body.
pub fn rpc_routes(state: AppState) -> Router {
    Router::new()
        .route("/rpc/get_connections_rpc", post(rpc::get_connections))
        .route("/rpc/connect_to_student_rpc", post(rpc::connect_to_student))
        .route("/rpc/get_mood_logs_rpc", post(rpc::get_mood_logs))
        .route("/rpc/log_mood_rpc", post(rpc::log_mood))
        .route("/rpc/get_help_requests_rpc", post(rpc::get_help_requests))
        .route("/rpc/create_help_request_rpc", post(rpc::create_help_request))
        .route("/rpc/resolve_help_request_rpc", post(rpc::resolve_help_request))
        .with_state(state)
}

/// Direct table access and push functions, behind bearer auth.
pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/tables/users", get(tables::lookup_users))
        .route("/tables/users/me", patch(tables::update_profile))
        .route(
            "/tables/connections",
            get(tables::list_connections).post(tables::insert_connection),
        )
        .route("/tables/connections/{id}", delete(tables::delete_connection))
        .route(
            "/tables/mood_logs",
            get(tables::list_mood_logs).post(tables::insert_mood_log),
        )
        .route(
            "/tables/help_requests",
            get(tables::list_help_requests).post(tables::insert_help_request),
        )
        .route("/tables/help_requests/{id}", patch(tables::update_help_request))
        .route("/tables/user_sessions", delete(auth::logout))
        .route(
            "/tables/push_subscriptions",
            post(push::upsert_subscription).delete(push::delete_subscription),
        )
        .route(
            "/functions/send-push-notification",
            post(push::send_push_notification),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

pub fn gateway_routes(state: AppState) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health::health))
        .with_state(state)
}

/// The full router. `with_rpc` off leaves only the auth procedures and direct
/// tables, as a backend that never deployed the data procedures would.
pub fn build_router_with(state: AppState, with_rpc: bool) -> Router {
    let mut router = Router::new()
        .merge(auth_routes(state.clone()))
        .merge(table_routes(state.clone()))
        .merge(gateway_routes(state.clone()));

    if with_rpc {
        router = router.merge(rpc_routes(state));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn build_router(state: AppState) -> Router {
    build_router_with(state, true)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let verifier: std::sync::Arc<dyn TokenVerifier> = state;
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, verifier))
}
