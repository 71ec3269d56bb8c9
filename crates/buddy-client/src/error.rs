use thiserror::Error;

use buddy_types::api::ErrorBody;

/// Code carried by [`BackendError::decode`].
pub const DECODE_CODE: &str = "DECODE";

/// A failed call to the backend, as the backend described it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    /// `None` when the request never got a response.
    pub status: Option<u16>,
    /// Stable error code from the body; empty when the body was not one of ours.
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn transport(err: reqwest::Error) -> Self {
        Self {
            status: None,
            code: String::new(),
            message: err.to_string(),
        }
    }

    /// A response arrived but its body did not match the expected shape. The
    /// call was still served, so this never counts as unavailable.
    pub fn decode(status: u16, err: impl std::fmt::Display) -> Self {
        Self {
            status: Some(status),
            code: DECODE_CODE.to_string(),
            message: format!("Resposta inesperada do servidor: {err}"),
        }
    }

    /// Decode a non-success response body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status: Some(status),
                code: parsed.error.code,
                message: parsed.error.message,
            },
            Err(_) => Self {
                status: Some(status),
                code: String::new(),
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }

    pub fn is_transport(&self) -> bool {
        self.status.is_none()
    }

    /// The call could not be served at all: the backend is unreachable, the
    /// route does not exist, or the server failed. Business rejections are
    /// never "unavailable".
    pub fn is_unavailable(&self) -> bool {
        match self.status {
            None => true,
            Some(404) | Some(405) => self.code.is_empty(),
            Some(status) => status >= 500,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
    }
}

/// Errors surfaced to the UI. `Display` is the message to show the user.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{0}")]
    User(String),

    #[error("Usuário não logado")]
    NotLoggedIn,

    #[error("{0}")]
    Backend(#[from] BackendError),
}

impl ClientError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }
}
