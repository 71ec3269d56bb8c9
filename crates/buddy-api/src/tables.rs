//! Direct row access, scoped to what the bearer may see. Clients use these
//! when a named procedure is unavailable.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use buddy_types::api::{
    InsertConnectionRequest, InsertMoodLogRequest, UpdateHelpRequestRequest, UpdateProfileRequest,
    UserLookup,
};
use buddy_types::messages;
use buddy_types::models::{Connection, HelpRequest, MoodLog, Role, User};

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::service::{self, normalize_code};
use crate::state::{AppState, db_call};

/// Split a `?student_ids=a,b` filter.
fn parse_id_list(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct UserLookupQuery {
    pub connection_code: Option<String>,
    pub role: Option<Role>,
}

/// GET /tables/users?connection_code=&role=
pub async fn lookup_users(
    State(state): State<AppState>,
    Query(query): Query<UserLookupQuery>,
) -> ApiResult<Json<Vec<UserLookup>>> {
    let code = query
        .connection_code
        .as_deref()
        .map(normalize_code)
        .filter(|code| !code.is_empty())
        .ok_or(ApiError::Validation(messages::LOOKUP_REQUIRES_CODE))?;

    let found = db_call(&state, move |s| {
        let Some(row) = s.db.get_user_by_connection_code(&code)? else {
            return Ok(None);
        };
        Ok(Some(row.into_user()?))
    })
    .await?;

    let matches = found
        .filter(|user| query.role.is_none_or(|role| role == user.role))
        .map(|user| UserLookup {
            id: user.id,
            username: user.username,
            role: user.role,
        });

    Ok(Json(matches.into_iter().collect()))
}

/// PATCH /tables/users/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let user_id = identity.id();
    let user = db_call(&state, move |s| {
        if !s.db.update_avatar(&user_id, req.avatar_url.trim())? {
            return Err(ApiError::NotFound(messages::USER_NOT_FOUND));
        }
        let row = s
            .db
            .get_user_by_id(&user_id)?
            .ok_or(ApiError::NotFound(messages::USER_NOT_FOUND))?;
        Ok(row.into_user()?)
    })
    .await?;

    Ok(Json(user))
}

// -- Connections --

/// GET /tables/connections
pub async fn list_connections(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Connection>>> {
    let connections = db_call(&state, move |s| service::list_connections(s, &identity)).await?;
    Ok(Json(connections))
}

/// POST /tables/connections
pub async fn insert_connection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InsertConnectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let connection = db_call(&state, move |s| {
        service::connect_by_student_id(s, &identity, req.student_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

/// DELETE /tables/connections/{id}
pub async fn delete_connection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(connection_id): Path<String>,
) -> ApiResult<StatusCode> {
    db_call(&state, move |s| service::remove_connection(s, &identity, &connection_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Mood logs --

#[derive(Debug, Deserialize)]
pub struct MoodLogQuery {
    pub student_ids: Option<String>,
    pub limit: Option<u32>,
}

/// GET /tables/mood_logs?student_ids=a,b&limit=
pub async fn list_mood_logs(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<MoodLogQuery>,
) -> ApiResult<Json<Vec<MoodLog>>> {
    let filter = parse_id_list(query.student_ids);
    let logs = db_call(&state, move |s| {
        service::list_mood_logs(s, &identity, filter, query.limit)
    })
    .await?;
    Ok(Json(logs))
}

/// POST /tables/mood_logs
pub async fn insert_mood_log(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InsertMoodLogRequest>,
) -> ApiResult<impl IntoResponse> {
    let log = db_call(&state, move |s| service::log_mood(s, &identity, req.mood)).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

// -- Help requests --

#[derive(Debug, Deserialize)]
pub struct HelpRequestQuery {
    pub student_ids: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /tables/help_requests?student_ids=a,b&is_active=true
pub async fn list_help_requests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HelpRequestQuery>,
) -> ApiResult<Json<Vec<HelpRequest>>> {
    let filter = parse_id_list(query.student_ids);
    let active_only = query.is_active.unwrap_or(false);

    let mut requests = db_call(&state, move |s| {
        service::list_help_requests(s, &identity, filter, active_only)
    })
    .await?;

    if query.is_active == Some(false) {
        requests.retain(|request| !request.is_active);
    }
    Ok(Json(requests))
}

/// POST /tables/help_requests
pub async fn insert_help_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let request = service::create_help_request(&state, identity).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// PATCH /tables/help_requests/{id}
///
/// Requests only move from active to resolved.
pub async fn update_help_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<String>,
    Json(req): Json<UpdateHelpRequestRequest>,
) -> ApiResult<Json<HelpRequest>> {
    if req.is_active {
        return Err(ApiError::Validation(messages::HELP_REOPEN_UNSUPPORTED));
    }

    let request = service::resolve_help_request(&state, identity, &request_id).await?;
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_skip_blanks() {
        assert_eq!(
            parse_id_list(Some(" a, ,b,".into())),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(parse_id_list(None), None);
    }
}
