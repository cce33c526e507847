//! Error types for the bridge

use thiserror::Error;

/// How far an error is allowed to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Terminates the process with a non-zero exit status
    Fatal,
    /// Ends the event loop; the process still exits cleanly
    EndsLoop,
    /// Logged and the loop keeps running
    Recoverable,
}

/// Errors raised while bridging events
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Read error: {0}")]
    Read(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Notification failed: {reason}")]
    Notify { reason: String, fatal: bool },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Classify the error for the propagation policy
    pub fn severity(&self) -> Severity {
        match self {
            BridgeError::Connection { .. } | BridgeError::Config(_) => Severity::Fatal,
            BridgeError::Read(_) | BridgeError::Write(_) => Severity::EndsLoop,
            BridgeError::Notify { fatal: true, .. } => Severity::Fatal,
            BridgeError::Notify { fatal: false, .. } => Severity::Recoverable,
        }
    }

    /// Whether the process must stop
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Re-tag a notification failure as fatal; other errors are returned unchanged
    pub fn escalate(self) -> Self {
        match self {
            BridgeError::Notify { reason, .. } => BridgeError::Notify { reason, fatal: true },
            other => other,
        }
    }
}
