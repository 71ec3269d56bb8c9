//! Typed client for the Help Buddy backend: session handling, data access
//! with procedure/table fallback, the realtime help-request feed, and the
//! view-models the dashboards render from.

pub mod auth;
pub mod avatar;
pub mod backend;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod fallback;
pub mod push;
pub mod session;
pub mod watch;

pub use auth::BuddyClient;
pub use backend::Backend;
pub use data::{DataState, HelpBuddyData};
pub use error::{BackendError, ClientError};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
