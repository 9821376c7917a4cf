//! `BoardSync`: terminal kanban client with live board synchronization.

pub mod api;
pub mod app;
pub mod channel;
pub mod config;
pub mod drag;
pub mod message_log;
pub mod presence;
pub mod registry;
pub mod session;
pub mod ui;
