//! Error types for the engine.

use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Platform client error.
    #[error("platform error: {0}")]
    Platform(#[from] herald_platform::PlatformError),

    /// A tick was requested while another tick is still running.
    #[error("a processing run is already in progress")]
    TickInProgress,

    /// The queue is at capacity and rejected an item.
    #[error("queue full ({capacity}), rejected item {id}")]
    QueueFull { id: String, capacity: usize },

    /// The referenced item is not known to any content source.
    #[error("unknown item: {kind}/{id}")]
    UnknownItem { kind: String, id: String },

    /// Rejected configuration update.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
