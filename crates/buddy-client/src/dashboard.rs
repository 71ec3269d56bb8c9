//! View-models behind the student and parent/educator dashboards, plus the
//! toast notices produced from operation results.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use buddy_types::messages;
use buddy_types::models::{Connection, HelpRequest, MoodLog};

use crate::avatar::mood_label;
use crate::data::DataState;
use crate::error::ClientError;

/// How long the offline help button stays pressed.
pub const HELP_RESET_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.map(str::to_string),
        }
    }

    pub fn help_requested() -> Self {
        Self::new(
            NoticeLevel::Success,
            "Pedido de ajuda enviado! 🚨",
            Some("Alguém virá te ajudar em breve"),
        )
    }

    pub fn for_help_request(result: &Result<HelpRequest, ClientError>) -> Self {
        match result {
            Ok(_) => Self::help_requested(),
            Err(e) if e.to_string() == messages::HELP_ALREADY_ACTIVE => {
                Self::new(NoticeLevel::Info, messages::HELP_ALREADY_ACTIVE, None)
            }
            Err(_) => Self::new(NoticeLevel::Error, "Erro ao enviar pedido de ajuda", None),
        }
    }

    pub fn for_mood(result: &Result<MoodLog, ClientError>) -> Self {
        match result {
            Ok(log) => Self::new(
                NoticeLevel::Success,
                format!("Humor registrado: {}", mood_label(log.mood)),
                None,
            ),
            Err(_) => Self::new(NoticeLevel::Error, "Erro ao registrar humor", None),
        }
    }

    pub fn for_connect(result: &Result<Connection, ClientError>) -> Self {
        match result {
            Ok(_) => Self::new(NoticeLevel::Success, "Conectado com sucesso! 🎉", None),
            Err(e) => match e.to_string().as_str() {
                messages::INVALID_CODE => Self::new(
                    NoticeLevel::Error,
                    messages::INVALID_CODE,
                    Some("Não foi possível encontrar um aluno com este código"),
                ),
                messages::ALREADY_CONNECTED => Self::new(
                    NoticeLevel::Error,
                    messages::ALREADY_CONNECTED,
                    Some("Você já está conectado com este aluno"),
                ),
                other => Self::new(NoticeLevel::Error, "Erro ao conectar", Some(other)),
            },
        }
    }

    pub fn for_resolve(result: &Result<HelpRequest, ClientError>, username: &str) -> Self {
        match result {
            Ok(_) => Self::new(
                NoticeLevel::Success,
                format!("Ajuda fornecida para {username}"),
                None,
            ),
            Err(e) => Self::new(NoticeLevel::Error, e.to_string(), None),
        }
    }

    pub fn for_remove_connection(result: &Result<(), ClientError>) -> Self {
        match result {
            Ok(()) => Self::new(NoticeLevel::Success, "Conexão removida", None),
            Err(_) => Self::new(NoticeLevel::Error, "Erro ao remover conexão", None),
        }
    }
}

// -- Student --

/// Help button for the offline dashboard: no backend, resets itself.
#[derive(Debug, Default)]
pub struct MockHelpButton {
    requested_at: Option<Instant>,
}

impl MockHelpButton {
    pub fn press(&mut self, now: Instant) -> Notice {
        self.requested_at = Some(now);
        Notice::help_requested()
    }

    pub fn is_requested(&self, now: Instant) -> bool {
        self.requested_at
            .is_some_and(|at| now.saturating_duration_since(at) < HELP_RESET_AFTER)
    }
}

#[derive(Debug, Clone)]
pub struct StudentView {
    /// Disabled while a request is still open server-side.
    pub help_button_enabled: bool,
    pub status_label: &'static str,
    pub active_request: Option<HelpRequest>,
    pub recent_moods: Vec<(MoodLog, &'static str)>,
}

impl StudentView {
    pub fn build(student_id: Uuid, state: &DataState) -> Self {
        let active_request = state.active_help_request(student_id).cloned();
        let recent_moods = state
            .mood_logs
            .iter()
            .filter(|log| log.student_id == student_id)
            .map(|log| (log.clone(), mood_label(log.mood)))
            .collect();

        Self {
            help_button_enabled: active_request.is_none(),
            status_label: if active_request.is_some() {
                "🚨 Pedido de ajuda ativo"
            } else {
                "✅ Tudo bem"
            },
            active_request,
            recent_moods,
        }
    }
}

// -- Parent / educator --

#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub student_id: Uuid,
    pub username: String,
    pub needs_help: bool,
}

impl StudentSummary {
    pub fn status_label(&self) -> &'static str {
        if self.needs_help { "Precisa de Ajuda" } else { "Tudo bem" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelpAlert {
    pub request_id: Uuid,
    pub student_id: Uuid,
    pub username: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ParentView {
    pub students: Vec<StudentSummary>,
    /// Active requests joined to student usernames, newest first.
    pub alerts: Vec<HelpAlert>,
    pub headline: Option<String>,
}

impl ParentView {
    pub fn build(state: &DataState) -> Self {
        let username_of = |student_id: Uuid| {
            state
                .connections
                .iter()
                .find(|c| c.student_id == student_id)
                .and_then(|c| c.student_profile.as_ref())
                .map(|profile| profile.username.clone())
                .unwrap_or_else(|| "Aluno".to_string())
        };

        let students: Vec<StudentSummary> = state
            .connected_student_ids()
            .into_iter()
            .map(|student_id| StudentSummary {
                student_id,
                username: username_of(student_id),
                needs_help: state.active_help_request(student_id).is_some(),
            })
            .collect();

        let connected = state.connected_student_ids();
        let mut alerts: Vec<HelpAlert> = state
            .help_requests
            .iter()
            .filter(|request| request.is_active && connected.contains(&request.student_id))
            .map(|request| HelpAlert {
                request_id: request.id,
                student_id: request.student_id,
                username: username_of(request.student_id),
                since: request.created_at,
            })
            .collect();
        alerts.sort_by(|a, b| b.since.cmp(&a.since));

        let needing_help = students.iter().filter(|s| s.needs_help).count();
        let headline = (needing_help > 0).then(|| format!("{needing_help} filho(s) precisam de ajuda!"));

        Self {
            students,
            alerts,
            headline,
        }
    }
}

/// Validate the connect-by-code form input.
pub fn connect_code_input(raw: &str) -> Result<String, Notice> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(Notice::new(NoticeLevel::Error, "Digite um código de conexão", None));
    }
    Ok(code)
}
