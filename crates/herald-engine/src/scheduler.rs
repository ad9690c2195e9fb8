//! Scheduler: periodic tick ownership and lifecycle.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use herald_platform::PlatformError;

use crate::adapter::AdapterSet;
use crate::config::{ConfigUpdate, EngineConfig};
use crate::dispatch::{attempt, AttemptFailure, Dispatcher};
use crate::stats::{HealthReport, StatsTracker};
use crate::types::{ContentKind, ProcessResult, QueuedItem, RunReport};
use crate::EngineError;

/// Owns the periodic tick: discovery across all content sources, dispatch
/// through the bounded queue, and report aggregation.
///
/// The scheduler is intentionally single-instance: there is no distributed
/// lock, and running two processes against the same stores would
/// double-publish. One process, one scheduler, one tick at a time.
pub struct Scheduler {
    adapters: AdapterSet,
    dispatcher: Dispatcher,
    stats: Arc<StatsTracker>,
    config: RwLock<EngineConfig>,
    /// Held for the duration of a tick; `try_lock` failure means a tick is
    /// already running and the new trigger is rejected, not stacked.
    tick_guard: tokio::sync::Mutex<()>,
    /// Stop signal for the running periodic loop, if any.
    loop_ctl: Mutex<Option<watch::Sender<bool>>>,
}

impl Scheduler {
    pub fn new(adapters: AdapterSet, stats: Arc<StatsTracker>, config: EngineConfig) -> Self {
        Self {
            adapters,
            dispatcher: Dispatcher::new(),
            stats,
            config: RwLock::new(config),
            tick_guard: tokio::sync::Mutex::new(()),
            loop_ctl: Mutex::new(None),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.read().unwrap().clone()
    }

    /// Merge a runtime update into the configuration. Interval changes take
    /// effect from the next loop iteration.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<EngineConfig, EngineError> {
        let mut config = self.config.write().unwrap();
        config.apply(update)?;
        info!(?update, "scheduler configuration updated");
        self.stats.log("info", "configuration updated");
        Ok(config.clone())
    }

    pub fn stats(&self) -> Arc<StatsTracker> {
        Arc::clone(&self.stats)
    }

    /// Whether the periodic loop is running.
    pub fn is_running(&self) -> bool {
        self.loop_ctl.lock().unwrap().is_some()
    }

    /// Start the periodic loop. Returns false if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut ctl = self.loop_ctl.lock().unwrap();
        if ctl.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *ctl = Some(stop_tx);
        drop(ctl);

        self.stats.set_running(true);
        self.stats.log("info", "scheduler started");

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_loop(stop_rx).await;
        });
        true
    }

    /// Stop the periodic loop. A tick in progress completes first. Returns
    /// false if the loop was not running.
    pub fn stop(&self) -> bool {
        let Some(stop_tx) = self.loop_ctl.lock().unwrap().take() else {
            return false;
        };

        let _ = stop_tx.send(true);
        self.stats.set_running(false);
        self.stats.set_next_run(None);
        self.stats.log("info", "scheduler stopped");
        true
    }

    async fn run_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        info!("scheduler loop started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            // Re-read each iteration so interval updates apply without a
            // restart.
            let interval_secs = self.config().processing_interval_secs;
            self.stats
                .set_next_run(Some(Utc::now() + chrono::Duration::seconds(interval_secs as i64)));

            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
                _ = sleep(Duration::from_secs(interval_secs)) => {
                    match self.tick().await {
                        Ok(report) => {
                            debug!(
                                processed = report.total_processed,
                                failed = report.failed,
                                "periodic tick complete"
                            );
                        }
                        Err(EngineError::TickInProgress) => {
                            debug!("tick still running, periodic trigger skipped");
                        }
                        Err(e) => {
                            error!(error = %e, "periodic tick failed");
                        }
                    }
                }
            }
        }

        self.stats.set_next_run(None);
        info!("scheduler loop stopped");
    }

    /// Run one discovery-dispatch-report cycle.
    ///
    /// Works whether or not the periodic loop is running, so a forced tick
    /// from the operational boundary behaves exactly like a timer tick.
    /// Returns [`EngineError::TickInProgress`] instead of stacking ticks.
    pub async fn tick(&self) -> Result<RunReport, EngineError> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            return Err(EngineError::TickInProgress);
        };

        let started = std::time::Instant::now();
        let config = self.config();
        let now = Utc::now();
        let mut report = RunReport::default();

        for adapter in self.adapters.iter() {
            let kind = adapter.kind();
            match adapter.find_due(now).await {
                Ok(items) => {
                    if !items.is_empty() {
                        info!(kind = %kind, count = items.len(), "discovered due items");
                    }
                    for item in items {
                        match self.dispatcher.enqueue(item, config.max_queue_size) {
                            Ok(_) => {}
                            Err(e) => {
                                warn!(kind = %kind, error = %e, "enqueue rejected");
                                self.stats.log("warn", e.to_string());
                                report.errors.push(e.to_string());
                            }
                        }
                    }
                }
                // Infrastructure failure: this kind sits the tick out, the
                // others proceed.
                Err(e) => {
                    error!(kind = %kind, error = %e, "discovery failed");
                    let message = format!("{} discovery failed: {}", kind, e);
                    self.stats.log("error", message.clone());
                    report.errors.push(message);
                }
            }
        }

        let outcome = self
            .dispatcher
            .drain(
                &self.adapters,
                config.retry,
                &self.stats,
                config.max_concurrent_jobs,
                Duration::from_secs(config.tick_budget_secs),
            )
            .await;

        report.retries = outcome.retries;
        for result in &outcome.results {
            report.record(result);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        self.stats.record_run(&report);
        Ok(report)
    }

    /// Probe every backing integration without touching the counters.
    pub async fn health_check(&self) -> HealthReport {
        let (blog, social, newsletter) = tokio::join!(
            self.adapters.get(ContentKind::Blog).probe(),
            self.adapters.get(ContentKind::Social).probe(),
            self.adapters.get(ContentKind::Newsletter).probe(),
        );

        let errors: Vec<String> = [blog, social, newsletter].concat();
        HealthReport {
            healthy: errors.is_empty(),
            errors,
        }
    }

    /// Re-attempt one specific item on demand, bypassing the queue.
    ///
    /// Used by operators for previously failed items; one immediate attempt
    /// with the outcome recorded, no automatic backoff follow-up.
    pub async fn retry_item(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<ProcessResult, EngineError> {
        let adapter = self.adapters.get(kind);
        let item = adapter.load_item(id).await.map_err(|e| match e {
            PlatformError::NotFound { .. } => EngineError::UnknownItem {
                kind: kind.to_string(),
                id: id.to_string(),
            },
            other => EngineError::Platform(other),
        })?;

        info!(kind = %kind, id, "manual retry requested");

        let result = match attempt(adapter, &item).await {
            Ok(result) => result,
            Err(AttemptFailure::Publish(publish_err)) => {
                let result = ProcessResult::failed(&item, &publish_err.message);
                if let Err(e) = adapter.mark_outcome(&item, &result).await {
                    warn!(kind = %kind, id, error = %e, "failed to record manual retry outcome");
                }
                result
            }
            // Published but not recorded: leave the record alone so the
            // next sweep rediscovers it.
            Err(AttemptFailure::MarkAfterSuccess(message)) => {
                ProcessResult::failed(&item, &message)
            }
        };

        self.stats.record_result(&result);
        Ok(result)
    }

    /// Current queue contents.
    pub fn queue_snapshot(&self) -> Vec<QueuedItem> {
        self.dispatcher.snapshot()
    }
}
