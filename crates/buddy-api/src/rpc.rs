//! Named procedures. Each carries the caller's session token in its body
//! rather than in a header.

use axum::{Json, extract::State};

use buddy_types::api::{
    ConnectToStudentArgs, ConnectionRpcResult, LogMoodArgs, ResolveHelpRequestArgs, SessionArgs,
};
use buddy_types::messages;
use buddy_types::models::{Connection, HelpRequest, Mood, MoodLog};

use crate::auth::{Identity, resolve_session};
use crate::error::{ApiError, ApiResult};
use crate::service;
use crate::state::{AppState, db_call};

async fn identify(state: &AppState, token: String) -> ApiResult<Identity> {
    let (identity, _) = db_call(state, move |s| resolve_session(s, &token)).await?;
    Ok(identity)
}

fn flatten(connection: Connection) -> ConnectionRpcResult {
    let (student_username, student_connection_code) = connection
        .student_profile
        .map(|profile| (profile.username, profile.connection_code))
        .unwrap_or_default();

    ConnectionRpcResult {
        id: connection.id,
        parent_educator_id: connection.parent_educator_id,
        student_id: connection.student_id,
        created_at: connection.created_at,
        student_username,
        student_connection_code,
    }
}

/// POST /rpc/get_connections_rpc
pub async fn get_connections(
    State(state): State<AppState>,
    Json(args): Json<SessionArgs>,
) -> ApiResult<Json<Vec<ConnectionRpcResult>>> {
    let identity = identify(&state, args.session_token).await?;
    let connections = db_call(&state, move |s| service::list_connections(s, &identity)).await?;
    Ok(Json(connections.into_iter().map(flatten).collect()))
}

/// POST /rpc/connect_to_student_rpc
pub async fn connect_to_student(
    State(state): State<AppState>,
    Json(args): Json<ConnectToStudentArgs>,
) -> ApiResult<Json<ConnectionRpcResult>> {
    let identity = identify(&state, args.session_token).await?;
    let connection = db_call(&state, move |s| {
        service::connect_by_code(s, &identity, &args.connection_code)
    })
    .await?;
    Ok(Json(flatten(connection)))
}

/// POST /rpc/get_mood_logs_rpc
pub async fn get_mood_logs(
    State(state): State<AppState>,
    Json(args): Json<SessionArgs>,
) -> ApiResult<Json<Vec<MoodLog>>> {
    let identity = identify(&state, args.session_token).await?;
    let logs = db_call(&state, move |s| service::list_mood_logs(s, &identity, None, None)).await?;
    Ok(Json(logs))
}

/// POST /rpc/log_mood_rpc
pub async fn log_mood(
    State(state): State<AppState>,
    Json(args): Json<LogMoodArgs>,
) -> ApiResult<Json<MoodLog>> {
    let mood: Mood = args
        .mood_value
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(messages::INVALID_MOOD))?;

    let identity = identify(&state, args.session_token).await?;
    let log = db_call(&state, move |s| service::log_mood(s, &identity, mood)).await?;
    Ok(Json(log))
}

/// POST /rpc/get_help_requests_rpc
pub async fn get_help_requests(
    State(state): State<AppState>,
    Json(args): Json<SessionArgs>,
) -> ApiResult<Json<Vec<HelpRequest>>> {
    let identity = identify(&state, args.session_token).await?;
    let requests = db_call(&state, move |s| {
        service::list_help_requests(s, &identity, None, false)
    })
    .await?;
    Ok(Json(requests))
}

/// POST /rpc/create_help_request_rpc
pub async fn create_help_request(
    State(state): State<AppState>,
    Json(args): Json<SessionArgs>,
) -> ApiResult<Json<HelpRequest>> {
    let identity = identify(&state, args.session_token).await?;
    let request = service::create_help_request(&state, identity).await?;
    Ok(Json(request))
}

/// POST /rpc/resolve_help_request_rpc
pub async fn resolve_help_request(
    State(state): State<AppState>,
    Json(args): Json<ResolveHelpRequestArgs>,
) -> ApiResult<Json<HelpRequest>> {
    let identity = identify(&state, args.session_token).await?;
    let request = service::resolve_help_request(&state, identity, &args.help_request_id).await?;
    Ok(Json(request))
}
