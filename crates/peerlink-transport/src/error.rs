//! Transport layer error types

use thiserror::Error;

/// Errors in parsing or constructing a peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Errors raised while establishing or accepting bridged streams
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind endpoint: {0}")]
    Bind(String),

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Timeout waiting for connection")]
    Timeout,

    #[error("Too many connections: {current}/{max}")]
    TooManyConnections { current: usize, max: usize },

    #[error("Failed to open stream: {0}")]
    StreamOpen(String),

    #[error("Already listening for bridged streams")]
    AlreadyListening,

    #[error("Transport shut down")]
    Shutdown,
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
