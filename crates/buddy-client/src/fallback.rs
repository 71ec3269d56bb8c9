use std::future::Future;

use tracing::warn;

use crate::error::BackendError;

/// Try a named procedure first; when it cannot be served, run the equivalent
/// direct-table call instead. Business errors from the procedure are returned
/// as-is. One attempt each, no retries.
#[derive(Debug, Clone, Copy)]
pub struct Fallback {
    operation: &'static str,
}

impl Fallback {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    pub async fn run<T, P, PF, C, CF>(&self, preferred: P, compat: C) -> Result<T, BackendError>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T, BackendError>>,
        C: FnOnce() -> CF,
        CF: Future<Output = Result<T, BackendError>>,
    {
        match preferred().await {
            Err(e) if e.is_unavailable() => {
                warn!(
                    "{}: procedure unavailable ({}), using direct tables",
                    self.operation, e
                );
                compat().await
            }
            result => result,
        }
    }
}
