//! Error kinds shared by every component of the engine.
//!
//! Every fallible operation in this crate returns `CwResult<T>` instead of
//! panicking. The variants mirror the abstract error kinds used throughout
//! the design: callers match on kind, not on message text.

use thiserror::Error;

/// Crate-wide result alias.
pub type CwResult<T> = Result<T, CwError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CwError {
    /// A parameter was out of its documented range, a representation used
    /// characters other than `.`/`-`, a rectangular slope was given a
    /// nonzero duration, or a timestamp moved backwards.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A character has no Morse representation, or a representation does
    /// not map back to any known character.
    #[error("not found: {0}")]
    NotFound(String),

    /// Enqueue was refused because the tone queue is at or above its
    /// high-water mark.
    #[error("queue full")]
    QueueFull,

    /// A receiver poll was called too early to produce a verdict; this is
    /// informational and the caller is expected to retry.
    #[error("would block: {0}")]
    Again(String),

    /// An operation was attempted while the receiver (or generator) was in
    /// a state that forbids it.
    #[error("out of range for current state: {0}")]
    OutOfRange(String),

    /// Allocation failure, or the receiver's representation buffer
    /// overflowed (which also moves the receiver to `ErrChar`).
    #[error("no memory: {0}")]
    NoMemory(String),

    /// Requested an adaptive-only (or fixed-only) operation while the
    /// receiver was in the other mode.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The selected sound backend could not be opened or configured.
    #[error("sound system unavailable: {0}")]
    SoundSystemUnavailable(String),

    /// Unrecoverable worker or sink failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CwError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CwError::InvalidArgument(msg.into())
    }
}
