//! Shared protocol definitions for the `BoardSync` wire format.

pub mod board;
pub mod codec;
pub mod frame;
pub mod presence;
pub mod task;
pub mod time;
