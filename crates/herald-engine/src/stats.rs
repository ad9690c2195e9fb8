//! Process-wide statistics and recent-activity buffers.
//!
//! One tracker instance is created by the binary and shared (via `Arc`)
//! between the scheduler, the dispatcher, and the web boundary. All state
//! sits behind a std mutex with short critical sections; nothing here ever
//! awaits while holding the lock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::types::{ContentKind, ProcessResult, RunReport};

/// Retained recent publish results.
const RECENT_RESULTS_CAP: usize = 100;

/// Retained recent log lines.
const LOG_CAP: usize = 200;

/// One entry in the bounded activity log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Read-only view of the tracker, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub is_running: bool,
    pub active_jobs: usize,
    pub queue_size: usize,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries: u64,
}

/// Result of probing every backing integration.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub errors: Vec<String>,
}

#[derive(Default)]
struct Inner {
    total_processed: u64,
    successful: u64,
    failed: u64,
    retries: u64,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    is_running: bool,
    active_jobs: usize,
    queue_size: usize,
    recent_results: VecDeque<ProcessResult>,
    log: VecDeque<LogEntry>,
}

/// Shared lifetime counters plus bounded recent results and log lines.
#[derive(Default)]
pub struct StatsTracker {
    inner: Mutex<Inner>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one terminal result into the lifetime counters.
    pub fn record_result(&self, result: &ProcessResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_processed += 1;
        if result.success {
            inner.successful += 1;
        } else {
            inner.failed += 1;
        }

        if inner.recent_results.len() == RECENT_RESULTS_CAP {
            inner.recent_results.pop_front();
        }
        inner.recent_results.push_back(result.clone());

        let message = if result.success {
            format!("{}/{} published", result.kind, result.item_id)
        } else {
            format!(
                "{}/{} failed: {}",
                result.kind,
                result.item_id,
                result.error.as_deref().unwrap_or("unknown error")
            )
        };
        let level = if result.success { "info" } else { "error" };
        push_log(&mut inner, level, message);
    }

    /// Count one retry decision.
    pub fn record_retry(&self, kind: ContentKind, id: &str, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.retries += 1;
        let message = format!(
            "{}/{} retry scheduled in {}ms",
            kind,
            id,
            delay.as_millis()
        );
        push_log(&mut inner, "warn", message);
    }

    /// Record a completed tick.
    pub fn record_run(&self, report: &RunReport) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_run_at = Some(Utc::now());
        let message = format!(
            "run complete: {} processed, {} ok, {} failed, {} retries in {}ms",
            report.total_processed,
            report.successful,
            report.failed,
            report.retries,
            report.duration_ms
        );
        push_log(&mut inner, "info", message);
    }

    /// Append a free-form line to the activity log.
    pub fn log(&self, level: &str, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        push_log(&mut inner, level, message.into());
    }

    pub fn set_running(&self, running: bool) {
        self.inner.lock().unwrap().is_running = running;
    }

    pub fn set_next_run(&self, at: Option<DateTime<Utc>>) {
        self.inner.lock().unwrap().next_run_at = at;
    }

    pub fn set_active_jobs(&self, n: usize) {
        self.inner.lock().unwrap().active_jobs = n;
    }

    pub fn set_queue_size(&self, n: usize) {
        self.inner.lock().unwrap().queue_size = n;
    }

    /// Zero the lifetime counters. Buffers and lifecycle flags survive.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_processed = 0;
        inner.successful = 0;
        inner.failed = 0;
        inner.retries = 0;
        push_log(&mut inner, "info", "statistics reset".to_string());
        info!("scheduler statistics reset");
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap();
        StatsSnapshot {
            is_running: inner.is_running,
            active_jobs: inner.active_jobs,
            queue_size: inner.queue_size,
            last_run_at: inner.last_run_at,
            next_run_at: inner.next_run_at,
            total_processed: inner.total_processed,
            successful: inner.successful,
            failed: inner.failed,
            retries: inner.retries,
        }
    }

    /// The most recent `limit` results, oldest first.
    pub fn recent_results(&self, limit: usize) -> Vec<ProcessResult> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.recent_results.len().saturating_sub(limit);
        inner.recent_results.iter().skip(skip).cloned().collect()
    }

    /// The most recent `limit` log entries, oldest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<LogEntry> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.log.len().saturating_sub(limit);
        inner.log.iter().skip(skip).cloned().collect()
    }
}

fn push_log(inner: &mut Inner, level: &str, message: String) {
    if inner.log.len() == LOG_CAP {
        inner.log.pop_front();
    }
    inner.log.push_back(LogEntry {
        timestamp: Utc::now(),
        level: level.to_string(),
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScheduledItem;

    fn ok_result(id: &str) -> ProcessResult {
        let item = ScheduledItem::new(id, ContentKind::Blog, Utc::now());
        ProcessResult::ok(&item, None)
    }

    fn failed_result(id: &str) -> ProcessResult {
        let item = ScheduledItem::new(id, ContentKind::Social, Utc::now());
        ProcessResult::failed(&item, "timeout")
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = StatsTracker::new();
        stats.record_result(&ok_result("a"));
        stats.record_result(&ok_result("b"));
        stats.record_result(&failed_result("c"));
        stats.record_retry(ContentKind::Social, "c", Duration::from_millis(1000));

        let snap = stats.snapshot();
        assert_eq!(snap.total_processed, 3);
        assert_eq!(snap.successful, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.retries, 1);
    }

    #[test]
    fn test_reset_zeroes_counters_only() {
        let stats = StatsTracker::new();
        stats.record_result(&ok_result("a"));
        stats.set_running(true);
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.total_processed, 0);
        assert_eq!(snap.successful, 0);
        // Lifecycle state is not statistics
        assert!(snap.is_running);
        // The results buffer still shows history
        assert_eq!(stats.recent_results(10).len(), 1);
    }

    #[test]
    fn test_recent_results_are_bounded() {
        let stats = StatsTracker::new();
        for i in 0..(RECENT_RESULTS_CAP + 25) {
            stats.record_result(&ok_result(&format!("item-{}", i)));
        }

        let results = stats.recent_results(usize::MAX);
        assert_eq!(results.len(), RECENT_RESULTS_CAP);
        // Oldest entries were evicted
        assert_eq!(results[0].item_id, "item-25");
    }

    #[test]
    fn test_recent_logs_limit_returns_newest() {
        let stats = StatsTracker::new();
        stats.log("info", "first");
        stats.log("info", "second");
        stats.log("info", "third");

        let logs = stats.recent_logs(2);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "second");
        assert_eq!(logs[1].message, "third");
    }
}
