use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Connection, Mood, Role, StudentProfile, User};

// -- JWT Claims --

/// Session token claims. `sid` points at the `user_sessions` row that keeps
/// the token alive; deleting the row revokes the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

// -- Auth procedures --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticateUserArgs {
    pub p_username: String,
    pub p_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserArgs {
    pub p_username: String,
    pub p_role: Role,
    pub p_password: String,
    #[serde(default)]
    pub p_avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateSessionArgs {
    pub p_session_token: String,
}

/// Row returned by `authenticate_user` and `register_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub user_data: User,
    pub session_token: String,
}

/// Row returned by `validate_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_data: User,
}

// -- Data procedures --

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionArgs {
    pub session_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectToStudentArgs {
    pub session_token: String,
    pub connection_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogMoodArgs {
    pub session_token: String,
    pub mood_value: String,
}

/// Kept as a string so a malformed id reaches the server's own validation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveHelpRequestArgs {
    pub session_token: String,
    pub help_request_id: String,
}

/// Flattened connection row returned by the connection procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRpcResult {
    pub id: Uuid,
    pub parent_educator_id: Uuid,
    pub student_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub student_username: String,
    pub student_connection_code: Option<String>,
}

impl From<ConnectionRpcResult> for Connection {
    fn from(row: ConnectionRpcResult) -> Self {
        Connection {
            id: row.id,
            parent_educator_id: row.parent_educator_id,
            student_id: row.student_id,
            created_at: row.created_at,
            student_profile: Some(StudentProfile {
                username: row.student_username,
                connection_code: row.student_connection_code,
                avatar_url: None,
            }),
        }
    }
}

// -- Direct table bodies --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub avatar_url: String,
}

/// Result of a lookup on the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLookup {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertConnectionRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertMoodLogRequest {
    pub mood: Mood,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateHelpRequestRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertPushSubscriptionRequest {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendPushRequest {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendPushResponse {
    pub delivered: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_healthy: bool,
}
