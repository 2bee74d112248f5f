//! Error types for lifewire.

use thiserror::Error;

/// Main error type for all lifewire operations.
#[derive(Debug, Error)]
pub enum LifeError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (bad header, unexpected message, collective mismatch).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid simulation configuration. Always fatal, detected before networking.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed board pattern.
    #[error("Pattern error on line {line}: {reason}")]
    Pattern {
        /// 1-based line number in the pattern source.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The coordinator refused a request (e.g. registration after the roster is full).
    #[error("Rejected by coordinator: {0}")]
    Rejected(String),

    /// Two boards that must match in size do not.
    #[error("Board dimensions differ: {left:?} vs {right:?}")]
    DimensionMismatch {
        /// (width, height) of the receiving board.
        left: (u32, u32),
        /// (width, height) of the other board.
        right: (u32, u32),
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using LifeError.
pub type Result<T> = std::result::Result<T, LifeError>;
