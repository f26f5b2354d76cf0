//! Error types for doa-bridge.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine did not reply within the configured timeout.
    #[error("engine operation timed out")]
    Timeout,

    /// The control connection to the engine was severed.
    #[error("engine connection broken: {0}")]
    ConnectionBroken(String),

    /// The engine rejected the operation or returned malformed data.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// No plug-in instance matched the given id.
    #[error("no plug-in instance found with id \"{0}\"")]
    NotFound(String),

    /// I/O error outside the control connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this failure warrants reopening the control connection.
    ///
    /// Only a timeout or a severed transport does; everything else
    /// leaves the connection itself usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionBroken(_))
    }
}

/// Convenience Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
