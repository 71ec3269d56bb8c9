//! Operations shared by the named procedures and the direct table endpoints.
//! Both surfaces funnel through here so role and visibility rules live in
//! one place.

use tracing::info;
use uuid::Uuid;

use buddy_db::models::{ConnectionRow, convert_all};
use buddy_types::events::{ChangeOp, GatewayEvent};
use buddy_types::messages;
use buddy_types::models::{Connection, HelpRequest, MOOD_LOG_LIMIT, Mood, MoodLog, Role};

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::push;
use crate::state::{AppState, AppStateInner, db_call};

/// Connection codes are shown uppercase; accept them in any case.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Students whose rows the caller may read: themselves, or everyone they are
/// connected to.
pub fn visible_student_ids(s: &AppStateInner, identity: &Identity) -> ApiResult<Vec<String>> {
    match identity.role {
        Role::Student => Ok(vec![identity.id()]),
        Role::Parent | Role::Educator => Ok(s.db.connected_student_ids(&identity.id())?),
    }
}

/// Narrow the visible set to an explicit filter, dropping ids the caller
/// cannot see.
pub fn scoped_student_ids(
    s: &AppStateInner,
    identity: &Identity,
    filter: Option<Vec<String>>,
) -> ApiResult<Vec<String>> {
    let visible = visible_student_ids(s, identity)?;
    Ok(match filter {
        Some(wanted) => visible.into_iter().filter(|id| wanted.contains(id)).collect(),
        None => visible,
    })
}

// -- Connections --

pub fn list_connections(s: &AppStateInner, identity: &Identity) -> ApiResult<Vec<Connection>> {
    let rows = s.db.connections_for_user(&identity.id())?;
    Ok(convert_all(rows, ConnectionRow::into_connection)?)
}

pub fn connect_by_code(s: &AppStateInner, identity: &Identity, code: &str) -> ApiResult<Connection> {
    identity.require_guardian()?;

    let student = s
        .db
        .get_user_by_connection_code(&normalize_code(code))?
        .filter(|user| user.role == Role::Student.as_str())
        .ok_or(ApiError::NotFound(messages::INVALID_CODE))?;

    link_student(s, identity, &student.id)
}

pub fn connect_by_student_id(
    s: &AppStateInner,
    identity: &Identity,
    student_id: Uuid,
) -> ApiResult<Connection> {
    identity.require_guardian()?;

    let student = s
        .db
        .get_user_by_id(&student_id.to_string())?
        .filter(|user| user.role == Role::Student.as_str())
        .ok_or(ApiError::NotFound(messages::INVALID_CODE))?;

    link_student(s, identity, &student.id)
}

fn link_student(s: &AppStateInner, identity: &Identity, student_id: &str) -> ApiResult<Connection> {
    let row = s
        .db
        .insert_connection(&Uuid::new_v4().to_string(), &identity.id(), student_id)?
        .ok_or(ApiError::Conflict(messages::ALREADY_CONNECTED))?;

    info!("{} ({}) connected to student {}", identity.username, identity.user_id, student_id);
    Ok(row.into_connection()?)
}

pub fn remove_connection(s: &AppStateInner, identity: &Identity, id: &str) -> ApiResult<()> {
    if !s.db.delete_connection(id, &identity.id())? {
        return Err(ApiError::NotFound(messages::CONNECTION_NOT_FOUND));
    }

    info!("{} ({}) removed connection {}", identity.username, identity.user_id, id);
    Ok(())
}

// -- Mood logs --

pub fn log_mood(s: &AppStateInner, identity: &Identity, mood: Mood) -> ApiResult<MoodLog> {
    identity.require_student()?;

    let row = s
        .db
        .insert_mood_log(&Uuid::new_v4().to_string(), &identity.id(), mood.as_str())?;
    Ok(row.into_mood_log()?)
}

pub fn list_mood_logs(
    s: &AppStateInner,
    identity: &Identity,
    filter: Option<Vec<String>>,
    limit: Option<u32>,
) -> ApiResult<Vec<MoodLog>> {
    let student_ids = scoped_student_ids(s, identity, filter)?;
    let limit = limit.unwrap_or(MOOD_LOG_LIMIT).clamp(1, MOOD_LOG_LIMIT);

    let rows = s.db.mood_logs_for_students(&student_ids, limit)?;
    Ok(convert_all(rows, |row| row.into_mood_log())?)
}

// -- Help requests --

pub fn list_help_requests(
    s: &AppStateInner,
    identity: &Identity,
    filter: Option<Vec<String>>,
    active_only: bool,
) -> ApiResult<Vec<HelpRequest>> {
    let student_ids = scoped_student_ids(s, identity, filter)?;
    let rows = s.db.help_requests_for_students(&student_ids, active_only)?;
    Ok(convert_all(rows, |row| row.into_help_request())?)
}

/// Open a help request for the calling student, then fan the change out to
/// the student's guardians over the gateway and push.
pub async fn create_help_request(state: &AppState, identity: Identity) -> ApiResult<HelpRequest> {
    identity.require_student()?;

    let student_id = identity.id();
    let (request, guardians) = db_call(state, move |s| {
        let row = s
            .db
            .insert_active_help_request(&Uuid::new_v4().to_string(), &student_id)?
            .ok_or(ApiError::Conflict(messages::HELP_ALREADY_ACTIVE))?;
        let guardians = s.db.guardian_ids(&student_id)?;
        Ok((row.into_help_request()?, guardians))
    })
    .await?;

    info!(
        "{} ({}) opened help request {}",
        identity.username, identity.user_id, request.id
    );

    publish_help_request_change(state, ChangeOp::Insert, &request, &guardians).await;
    push::notify_guardians(state, identity.username, guardians);

    Ok(request)
}

/// Resolve an active help request. Only a guardian connected to the student
/// may do so, and only once.
pub async fn resolve_help_request(
    state: &AppState,
    identity: Identity,
    raw_id: &str,
) -> ApiResult<HelpRequest> {
    let request_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| ApiError::Validation(messages::INVALID_HELP_ID))?
        .to_string();
    identity.require_guardian()?;

    let caller = identity.id();
    let (request, guardians) = db_call(state, move |s| {
        let existing = s
            .db
            .get_help_request(&request_id)?
            .ok_or(ApiError::NotFound(messages::HELP_NOT_FOUND))?;
        if !s.db.is_connected(&caller, &existing.student_id)? {
            return Err(ApiError::Forbidden(messages::NOT_CONNECTED));
        }

        let row = s
            .db
            .resolve_help_request(&request_id)?
            .ok_or(ApiError::NotFound(messages::HELP_NOT_FOUND))?;
        let guardians = s.db.guardian_ids(&row.student_id)?;
        Ok((row.into_help_request()?, guardians))
    })
    .await?;

    info!(
        "{} ({}) resolved help request {}",
        identity.username, identity.user_id, request.id
    );

    publish_help_request_change(state, ChangeOp::Update, &request, &guardians).await;
    Ok(request)
}

/// Deliver a change-feed event to the request's student and every connected
/// guardian.
async fn publish_help_request_change(
    state: &AppState,
    op: ChangeOp,
    request: &HelpRequest,
    guardian_ids: &[String],
) {
    let mut recipients: Vec<Uuid> = guardian_ids
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();
    recipients.push(request.student_id);

    let event = GatewayEvent::HelpRequestChanged {
        op,
        record: request.clone(),
    };
    state.dispatcher.send_to_users(&recipients, event).await;
}
