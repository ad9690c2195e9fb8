//! Operational HTTP boundary for the Herald scheduler.
//!
//! Endpoints always answer 200 with an `{ok, data|error}` envelope; item
//! failures are payload detail, never HTTP errors. A 5xx from this server
//! means the server itself is broken.

mod error;
mod routes;

pub use error::WebError;
pub use routes::{create_router, AppState, LogLevelReload};

use std::sync::Arc;

use herald_engine::Scheduler;

/// Bind and serve the operational API until the process exits.
pub async fn serve(
    scheduler: Arc<Scheduler>,
    reload_log_level: Option<LogLevelReload>,
    port: u16,
) -> Result<(), WebError> {
    let router = create_router(scheduler, reload_log_level);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("operational API listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;
    Ok(())
}
