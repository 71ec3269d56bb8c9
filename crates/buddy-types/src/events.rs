use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::HelpRequest;

/// Kind of row change carried by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A row in `help_requests` changed
    HelpRequestChanged { op: ChangeOp, record: HelpRequest },
}

impl GatewayEvent {
    /// Student the event concerns, if it is scoped to one.
    pub fn student_id(&self) -> Option<Uuid> {
        match self {
            Self::HelpRequestChanged { record, .. } => Some(record.student_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_request_event_is_tagged() {
        let record = HelpRequest {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            is_active: true,
            created_at: chrono::Utc::now(),
            resolved_at: None,
        };
        let event = GatewayEvent::HelpRequestChanged {
            op: ChangeOp::Insert,
            record: record.clone(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "HelpRequestChanged");
        assert_eq!(json["data"]["op"], "INSERT");
        assert_eq!(event.student_id(), Some(record.student_id));
    }
}
