//! Error types for serial operations

use thiserror::Error;

/// Serial link errors
#[derive(Debug, Error)]
pub enum SerialError {
    /// No board is connected
    #[error("No open connection")]
    NotConnected,

    /// The connection dropped while in use
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Timed out waiting for the board
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    /// The background worker has stopped
    #[error("Serial worker is not running")]
    WorkerStopped,
}

impl SerialError {
    /// Whether the port is unusable after this error
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            SerialError::ConnectionLost(_) | SerialError::IoError(_) | SerialError::SerialError(_)
        )
    }
}

/// Result type for serial operations
pub type Result<T> = core::result::Result<T, SerialError>;

impl From<std::io::Error> for SerialError {
    fn from(e: std::io::Error) -> Self {
        SerialError::IoError(e.to_string())
    }
}
