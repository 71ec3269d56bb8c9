pub mod auth;
pub mod cleanup;
pub mod error;
pub mod health;
pub mod middleware;
pub mod push;
pub mod router;
pub mod rpc;
pub mod service;
pub mod state;
pub mod tables;

pub use router::{build_router, build_router_with};
pub use state::{AppState, AppStateInner};
