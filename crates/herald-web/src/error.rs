//! Error types for the operational API.

use thiserror::Error;

/// Errors that can occur serving the operational API.
#[derive(Debug, Error)]
pub enum WebError {
    /// IO error (bind/serve).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine error.
    #[error("engine error: {0}")]
    Engine(#[from] herald_engine::EngineError),
}
