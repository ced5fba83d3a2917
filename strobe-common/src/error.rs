//! Structured error types shared by both sides of the channel

use thiserror::Error;

/// A record carried a kind tag outside the nine assigned values
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown event kind tag: {0}")]
pub struct UnknownKind(pub u8);

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to create shared memory {name}: {reason}")]
    Create { name: String, reason: String },

    #[error("Failed to open shared memory {name}: {reason}")]
    Open { name: String, reason: String },

    #[error("Shared memory {name} is {actual} bytes, expected at least {expected}")]
    SizeMismatch { name: String, expected: usize, actual: usize },
}
