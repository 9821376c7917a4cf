//! `BoardSync` hub library.
//!
//! An in-memory board server speaking the same REST and WebSocket
//! protocol as a production board backend. Used for local development
//! and by the client's end-to-end tests.

pub mod config;
pub mod hub;
pub mod routes;
pub mod state;
