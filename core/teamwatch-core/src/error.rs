//! Error types for teamwatch-core operations.
//!
//! Reducer-level conditions (unknown agent, stale event) are outcomes, not
//! errors; only dispatcher, transport, login and config failures live here.

use std::path::PathBuf;

use teamwatch_protocol::ErrorInfo;

/// Failure reported by a transport when connecting or emitting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ErrorInfo> for TransportError {
    fn from(info: ErrorInfo) -> Self {
        TransportError::new(info.to_string())
    }
}

/// All errors that can occur in teamwatch-core operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not connected: a healthy connection and a logged-in supervisor are required")]
    NotConnected,

    #[error("Invalid login exchange: {0}")]
    InvalidLogin(String),

    // ─────────────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration read failed: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },
}

/// Convenience type alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<MonitorError> for String {
    fn from(err: MonitorError) -> String {
        err.to_string()
    }
}
