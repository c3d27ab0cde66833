//! Error types for histkv
//!
//! Provides a unified error type for codec, filter, archive and query
//! operations. End of a scan is never an error; cursors report it through
//! a `false` return from `read()`.

use thiserror::Error;

/// Result type alias using HistError
pub type Result<T> = std::result::Result<T, HistError>;

/// Unified error type for histkv operations
#[derive(Debug, Error)]
pub enum HistError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Caller Contract Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid range: start {start} is after stop {stop}")]
    InvalidRange { start: u64, stop: u64 },

    #[error("Ranges must be ascending and non-overlapping: [{prev_start}, {prev_stop}] then [{start}, {stop}]")]
    OverlappingRanges {
        prev_start: u64,
        prev_stop: u64,
        start: u64,
        stop: u64,
    },

    #[error("The all-levels sentinel cannot be used as a message level")]
    ReservedLevel,

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported {kind} format tag: 0x{tag:02x}")]
    UnsupportedFormat { kind: &'static str, tag: u8 },

    #[error("Truncated input: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Scan Errors
    // -------------------------------------------------------------------------
    #[error("Stream is out of order: timestamp {current} follows {previous}")]
    OutOfOrder { previous: u64, current: u64 },

    #[error("Keys must be written in ascending order: {0}")]
    UnsortedWrite(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for HistError {
    fn from(err: bincode::Error) -> Self {
        HistError::Serialization(err.to_string())
    }
}
