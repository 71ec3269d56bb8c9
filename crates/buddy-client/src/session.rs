use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Local persistence for the session token. Reads are synchronous and cheap.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Keeps the token for the life of the process.
#[derive(Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|token| token.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| io::Error::other("session store lock poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| io::Error::other("session store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    session_token: String,
}

/// Stores `{"session_token": "..."}` in a single JSON file.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read session file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<StoredSession>(&raw) {
            Ok(stored) => Some(stored.session_token),
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            session_token: token.to_string(),
        };
        std::fs::write(&self.path, serde_json::to_vec(&stored)?)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
