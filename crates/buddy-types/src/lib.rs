pub mod api;
pub mod events;
pub mod messages;
pub mod models;
