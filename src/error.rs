//! Error types for binlog-follower.
//!
//! All errors in this crate are represented by [`BinlogError`], which covers:
//! - I/O errors (network, short reads/writes)
//! - Framing errors (bad payload length, out-of-order sequence)
//! - Handshake/auth errors (rejected handshake, bad credentials)
//! - Command errors (server ERR packets with decoded code and SQL state)
//! - Malformed packets (truncated length-encoded values, missing EOF)
//! - Binlog event errors (bad header, wrong binlog version, decode failures)

use thiserror::Error;

use crate::event::EventHeader;

/// Error type for all binlog-follower operations.
#[derive(Debug, Error, Clone)]
pub enum BinlogError {
    /// I/O error (network, short read/write).
    ///
    /// Note: `std::io::Error` is not `Clone`, so we store the message.
    #[error("io error: {0}")]
    Io(String),

    /// Packet framing error - bad payload length or out-of-order sequence.
    #[error("framing error: {0}")]
    Framing(String),

    /// The server rejected the initial handshake, or speaks a protocol
    /// version we do not support.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The server rejected our authentication response.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The server answered a command with an ERR packet.
    ///
    /// The message includes the error code and, when present, the SQL state.
    #[error("server error: {0}")]
    Command(String),

    /// Malformed packet - truncated length-encoded value, unexpected column
    /// count, missing EOF, bad stream header.
    #[error("malformed packet: {0}")]
    Packet(String),

    /// A binlog event body could not be decoded. Carries the parsed header
    /// and the raw body so callers retain context.
    #[error("{0}")]
    Event(EventError),

    /// A row event referenced a table id with no prior table-map event.
    #[error("invalid table id: {0}")]
    InvalidTableId(u64),

    /// A table map or row value used a reserved or unimplemented column type.
    #[error("unsupported column type {0} in binlog")]
    UnsupportedColumnType(u8),

    /// Terminal state: the stream was closed, either by a remote error that
    /// was already reported or by a local `close()`.
    #[error("binlog stream closed")]
    StreamClosed,

    /// Lifecycle misuse or a bug in the library (e.g. starting a dump
    /// while one is already running).
    #[error("internal error: {0}")]
    Internal(String),
}

impl BinlogError {
    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, BinlogError::Io(_))
    }

    /// Returns `true` if this is a server-reported command error.
    #[inline]
    pub fn is_command(&self) -> bool {
        matches!(self, BinlogError::Command(_))
    }

    /// Returns `true` if this error is likely transient and retryable.
    ///
    /// Non-transient errors (auth, command, framing) typically require
    /// configuration changes before reconnecting.
    pub fn is_transient(&self) -> bool {
        matches!(self, BinlogError::Io(_) | BinlogError::StreamClosed)
    }
}

// Manual From impl since io::Error isn't Clone
impl From<std::io::Error> for BinlogError {
    fn from(err: std::io::Error) -> Self {
        BinlogError::Io(err.to_string())
    }
}

/// Context for an event-body decode failure: the header that was already
/// parsed, a description of what went wrong, and the raw body bytes.
#[derive(Debug, Clone)]
pub struct EventError {
    pub header: EventHeader,
    pub message: String,
    pub raw_body: Vec<u8>,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event error at log_pos {}: {}",
            self.header.log_pos, self.message
        )
    }
}

impl std::error::Error for EventError {}

/// Result type alias for binlog-follower operations.
pub type Result<T> = std::result::Result<T, BinlogError>;
