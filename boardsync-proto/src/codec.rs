//! JSON encoding for board channel frames.
//!
//! Frames travel as WebSocket text messages, one JSON object per message.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::frame::{InboundFrame, OutboundFrame};

/// Maximum accepted size of a single frame in bytes (64 KB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The frame is larger than [`MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    Oversized {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

/// Encodes any frame type into a JSON string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the value cannot be serialized,
/// or [`CodecError::Oversized`] if the result exceeds [`MAX_FRAME_SIZE`].
pub fn encode<T: Serialize>(frame: &T) -> Result<String, CodecError> {
    let text = serde_json::to_string(frame)?;
    check_size(text.len())?;
    Ok(text)
}

/// Decodes a JSON string into a frame type.
///
/// # Errors
///
/// Returns [`CodecError::Oversized`] before parsing anything larger than
/// [`MAX_FRAME_SIZE`], or [`CodecError::Serialization`] on malformed JSON.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    check_size(text.len())?;
    Ok(serde_json::from_str(text)?)
}

/// Encodes a client frame.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String, CodecError> {
    encode(frame)
}

/// Decodes a server frame.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_inbound(text: &str) -> Result<InboundFrame, CodecError> {
    decode(text)
}

const fn check_size(size: usize) -> Result<(), CodecError> {
    if size > MAX_FRAME_SIZE {
        return Err(CodecError::Oversized {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}
