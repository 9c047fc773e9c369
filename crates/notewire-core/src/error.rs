// Error types for event processing
//
// Absence is never an error in this subsystem: stores return Ok(None) for
// vanished entities and the oracle answers with booleans, per the graceful
// degradation policy. The variants here cover the failures that remain.

use thiserror::Error;

/// Result type alias for fan-out and notification operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while processing a domain event
#[derive(Debug, Error)]
pub enum EngineError {
    /// Backing store read or write failed (covers transient lookup failures)
    #[error("store error: {0}")]
    Store(String),

    /// Realtime delivery through the connection registry failed
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Handoff to the mail collaborator failed
    #[error("mail error: {0}")]
    Mail(String),

    /// Event processing pipeline is not accepting events (shut down)
    #[error("engine stopped")]
    Stopped,

    /// Payload or frame (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        EngineError::Store(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        EngineError::Delivery(msg.into())
    }

    /// Create a mail error
    pub fn mail(msg: impl Into<String>) -> Self {
        EngineError::Mail(msg.into())
    }
}
