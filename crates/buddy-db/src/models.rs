//! Database row types. These map directly to SQLite rows and are kept
//! separate from the buddy-types wire models so the DB layer stays
//! independent; `into_*` converts them once the strings are validated.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use buddy_types::models::{
    Connection, HelpRequest, MoodLog, PushSubscription, StudentProfile, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
    pub connection_code: Option<String>,
    pub created_at: String,
    pub last_login: Option<String>,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct ConnectionRow {
    pub id: String,
    pub parent_educator_id: String,
    pub student_id: String,
    pub created_at: String,
    pub student_username: String,
    pub student_connection_code: Option<String>,
    pub student_avatar_url: Option<String>,
}

pub struct MoodLogRow {
    pub id: String,
    pub student_id: String,
    pub mood: String,
    pub created_at: String,
}

pub struct HelpRequestRow {
    pub id: String,
    pub student_id: String,
    pub is_active: bool,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

pub struct PushSubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: String,
}

/// Canonical timestamp text. Fixed-width so lexical order is time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

fn parse_optional_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_timestamp).transpose()
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            role: self
                .role
                .parse()
                .with_context(|| format!("Corrupt role on user '{}'", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            last_login: parse_optional_timestamp(self.last_login.as_deref())?,
            username: self.username,
            avatar_url: self.avatar_url,
            connection_code: self.connection_code,
        })
    }
}

impl SessionRow {
    pub fn user_uuid(&self) -> Result<Uuid> {
        parse_id(&self.user_id)
    }
}

impl ConnectionRow {
    pub fn into_connection(self) -> Result<Connection> {
        Ok(Connection {
            id: parse_id(&self.id)?,
            parent_educator_id: parse_id(&self.parent_educator_id)?,
            student_id: parse_id(&self.student_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            student_profile: Some(StudentProfile {
                username: self.student_username,
                connection_code: self.student_connection_code,
                avatar_url: self.student_avatar_url,
            }),
        })
    }
}

impl MoodLogRow {
    pub fn into_mood_log(self) -> Result<MoodLog> {
        Ok(MoodLog {
            id: parse_id(&self.id)?,
            student_id: parse_id(&self.student_id)?,
            mood: self
                .mood
                .parse()
                .with_context(|| format!("Corrupt mood on log '{}'", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl HelpRequestRow {
    pub fn into_help_request(self) -> Result<HelpRequest> {
        Ok(HelpRequest {
            id: parse_id(&self.id)?,
            student_id: parse_id(&self.student_id)?,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
            resolved_at: parse_optional_timestamp(self.resolved_at.as_deref())?,
        })
    }
}

impl PushSubscriptionRow {
    pub fn into_push_subscription(self) -> Result<PushSubscription> {
        Ok(PushSubscription {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            endpoint: self.endpoint,
            p256dh: self.p256dh,
            auth: self.auth,
        })
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub fn convert_all<R, T>(rows: Vec<R>, f: impl Fn(R) -> Result<T>) -> Result<Vec<T>> {
    rows.into_iter().map(f).collect()
}
