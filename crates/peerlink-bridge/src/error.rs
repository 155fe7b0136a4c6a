//! Bridge error types

use std::io;

use thiserror::Error;

/// Errors raised by the listener and dialer adaptors
///
/// Stream I/O failures keep their original [`io::Error`]; the bridge never
/// rewrites them into something else.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Listener already handed out its only connection")]
    Consumed,

    #[error("Listener closed")]
    Closed,

    #[error("Dial cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    /// True when a listener can never yield another connection
    pub fn is_closed(&self) -> bool {
        matches!(self, BridgeError::Consumed | BridgeError::Closed)
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
