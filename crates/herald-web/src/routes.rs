//! Scheduler API routes.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use herald_engine::{ConfigUpdate, ContentKind, EngineError, Scheduler};

/// Applies a new log filter directive at runtime. Wired up by the binary,
/// which owns the tracing subscriber.
pub type LogLevelReload = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Shared state for the operational API.
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub reload_log_level: Option<LogLevelReload>,
}

/// Create the operational API router.
pub fn create_router(
    scheduler: Arc<Scheduler>,
    reload_log_level: Option<LogLevelReload>,
) -> Router {
    let state = Arc::new(AppState {
        scheduler,
        reload_log_level,
    });

    Router::new()
        .route("/api/scheduler/status", get(status))
        .route("/api/scheduler/health", get(health))
        .route("/api/scheduler/queue", get(queue))
        .route("/api/scheduler/logs", get(logs))
        .route("/api/scheduler", post(action))
        .route("/api/scheduler/config", put(put_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn ok_envelope(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "data": data }))
}

fn err_envelope(message: impl AsRef<str>) -> Json<serde_json::Value> {
    Json(json!({ "ok": false, "error": message.as_ref() }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = state.scheduler.stats().snapshot();
    ok_envelope(json!({
        "is_running": snap.is_running,
        "active_jobs": snap.active_jobs,
        "queue_size": snap.queue_size,
        "last_run_at": snap.last_run_at,
        "next_run_at": snap.next_run_at,
        "stats": {
            "total_processed": snap.total_processed,
            "successful": snap.successful,
            "failed": snap.failed,
            "retries": snap.retries,
        },
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.scheduler.health_check().await;
    ok_envelope(json!({
        "healthy": report.healthy,
        "errors": report.errors,
    }))
}

async fn queue(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.scheduler.queue_snapshot();
    ok_envelope(json!({
        "count": items.len(),
        "items": items,
    }))
}

#[derive(Deserialize)]
struct LogsParams {
    limit: Option<usize>,
}

/// Default number of log entries returned.
const DEFAULT_LOG_LIMIT: usize = 50;

async fn logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let entries = state.scheduler.stats().recent_logs(limit);
    ok_envelope(json!({
        "count": entries.len(),
        "entries": entries,
    }))
}

/// Actions accepted by `POST /api/scheduler`.
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum SchedulerAction {
    Start,
    Stop,
    Process,
    ResetStats,
    UpdateConfig {
        config: ConfigUpdate,
    },
    Retry {
        content_id: String,
        content_type: ContentKind,
    },
}

async fn action(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SchedulerAction>,
) -> impl IntoResponse {
    match request {
        SchedulerAction::Start => {
            let started = state.scheduler.start();
            ok_envelope(json!({
                "is_running": true,
                "already_running": !started,
            }))
        }
        SchedulerAction::Stop => {
            let stopped = state.scheduler.stop();
            ok_envelope(json!({
                "is_running": false,
                "was_running": stopped,
            }))
        }
        SchedulerAction::Process => match state.scheduler.tick().await {
            Ok(report) => ok_envelope(json!({ "report": report })),
            Err(e) => err_envelope(e.to_string()),
        },
        SchedulerAction::ResetStats => {
            state.scheduler.stats().reset();
            ok_envelope(json!({ "reset": true }))
        }
        SchedulerAction::UpdateConfig { config } => apply_config_update(&state, &config),
        SchedulerAction::Retry {
            content_id,
            content_type,
        } => match state.scheduler.retry_item(content_type, &content_id).await {
            Ok(result) => ok_envelope(json!({ "result": result })),
            Err(e @ EngineError::UnknownItem { .. }) => err_envelope(e.to_string()),
            Err(e) => err_envelope(format!("retry failed: {}", e)),
        },
    }
}

/// Body for `PUT /api/scheduler/config`.
#[derive(Deserialize)]
struct PutConfigRequest {
    config: ConfigUpdate,
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PutConfigRequest>,
) -> impl IntoResponse {
    apply_config_update(&state, &request.config)
}

fn apply_config_update(
    state: &AppState,
    update: &ConfigUpdate,
) -> Json<serde_json::Value> {
    match state.scheduler.update_config(update) {
        Ok(config) => {
            if let (Some(reload), Some(level)) = (&state.reload_log_level, &update.log_level)
                && let Err(e) = reload(level)
            {
                warn!(level = %level, error = %e, "failed to apply log level");
                return err_envelope(format!("config stored but log level not applied: {}", e));
            }
            ok_envelope(json!({ "config": config }))
        }
        Err(e) => err_envelope(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use herald_engine::{
        AdapterSet, BlogAdapter, EngineConfig, NewsletterAdapter, SocialAdapter, StatsTracker,
    };
    use herald_platform::{CmsClient, DataStoreClient, EmailClient, SocialClient};

    /// Scheduler wired to unreachable endpoints; good enough for routes
    /// that never leave process memory.
    fn offline_scheduler() -> Arc<Scheduler> {
        let cms = Arc::new(CmsClient::new("http://127.0.0.1:9", "t"));
        let store = Arc::new(DataStoreClient::new("http://127.0.0.1:9", "k"));
        let social = Arc::new(SocialClient::new("http://127.0.0.1:9", "k"));
        let email = Arc::new(EmailClient::new("http://127.0.0.1:9", "k"));

        let adapters = AdapterSet::new(
            BlogAdapter::new(cms, "https://example.com"),
            SocialAdapter::new(Arc::clone(&store), social),
            NewsletterAdapter::new(store, email),
        );

        Arc::new(Scheduler::new(
            adapters,
            Arc::new(StatsTracker::new()),
            EngineConfig::default(),
        ))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_envelope() {
        let router = create_router(offline_scheduler(), None);

        let response = router
            .oneshot(
                Request::get("/api/scheduler/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["is_running"], false);
        assert_eq!(body["data"]["stats"]["total_processed"], 0);
    }

    #[tokio::test]
    async fn test_start_and_stop_actions() {
        let scheduler = offline_scheduler();
        let router = create_router(Arc::clone(&scheduler), None);

        let start = Request::post("/api/scheduler")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"start"}"#))
            .unwrap();
        let response = router.clone().oneshot(start).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["already_running"], false);
        assert!(scheduler.is_running());

        let stop = Request::post("/api/scheduler")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"stop"}"#))
            .unwrap();
        let response = router.oneshot(stop).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_update_config_merges() {
        let scheduler = offline_scheduler();
        let router = create_router(Arc::clone(&scheduler), None);

        let request = Request::put("/api/scheduler/config")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"config":{"max_concurrent_jobs":2,"processing_interval_secs":60}}"#,
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["config"]["max_concurrent_jobs"], 2);
        assert_eq!(scheduler.config().processing_interval_secs, 60);
        // Untouched settings keep their values.
        assert_eq!(scheduler.config().max_queue_size, 100);
    }

    #[tokio::test]
    async fn test_invalid_config_is_embedded_failure_not_http_error() {
        let router = create_router(offline_scheduler(), None);

        let request = Request::post("/api/scheduler")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"action":"update-config","config":{"max_concurrent_jobs":0}}"#,
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("max_concurrent_jobs"));
    }

    #[tokio::test]
    async fn test_reset_stats_action() {
        let scheduler = offline_scheduler();
        scheduler.stats().log("info", "seed entry");
        let router = create_router(Arc::clone(&scheduler), None);

        let request = Request::post("/api/scheduler")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"reset-stats"}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["ok"], true);
        assert_eq!(scheduler.stats().snapshot().total_processed, 0);
    }

    #[tokio::test]
    async fn test_logs_respects_limit() {
        let scheduler = offline_scheduler();
        for i in 0..10 {
            scheduler.stats().log("info", format!("line {}", i));
        }
        let router = create_router(scheduler, None);

        let response = router
            .oneshot(
                Request::get("/api/scheduler/logs?limit=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["data"]["count"], 3);
        assert_eq!(body["data"]["entries"][2]["message"], "line 9");
    }

    #[tokio::test]
    async fn test_queue_starts_empty() {
        let router = create_router(offline_scheduler(), None);

        let response = router
            .oneshot(
                Request::get("/api/scheduler/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["count"], 0);
    }

    #[tokio::test]
    async fn test_log_level_reload_is_invoked() {
        use std::sync::Mutex;

        let applied: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let applied_ref = Arc::clone(&applied);
        let reload: LogLevelReload = Arc::new(move |level: &str| {
            *applied_ref.lock().unwrap() = Some(level.to_string());
            Ok(())
        });

        let router = create_router(offline_scheduler(), Some(reload));

        let request = Request::post("/api/scheduler")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"action":"update-config","config":{"log_level":"herald=debug"}}"#,
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["ok"], true);
        assert_eq!(applied.lock().unwrap().as_deref(), Some("herald=debug"));
    }
}
