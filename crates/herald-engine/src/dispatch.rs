//! Dispatcher: a FIFO queue of scheduled items drained with bounded
//! concurrency.
//!
//! Items live in an arena keyed by `(kind, id)` with an explicit state tag,
//! so the queue endpoint can show exactly where every item sits. The arena
//! is in-memory only: a restart empties it and the next sweep rebuilds it
//! from the source stores.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::adapter::{AdapterSet, ContentAdapter};
use crate::retry::{PublishError, RetryDecision, RetryPolicy};
use crate::stats::StatsTracker;
use crate::types::{ContentKind, ItemState, ProcessResult, QueuedItem, ScheduledItem};
use crate::EngineError;

type ItemKey = (ContentKind, String);

struct Entry {
    item: ScheduledItem,
    state: ItemState,
}

#[derive(Default)]
struct Inner {
    /// FIFO of keys waiting to run (pending or retry-scheduled).
    order: VecDeque<ItemKey>,
    /// Every live item, including in-flight ones.
    items: HashMap<ItemKey, Entry>,
}

/// What one drain call produced.
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Terminal results, in completion order.
    pub results: Vec<ProcessResult>,
    /// Retry decisions taken during this drain.
    pub retries: u64,
}

/// Why an attempt did not produce a confirmed success.
pub(crate) enum AttemptFailure {
    /// The publish action itself failed; the source record is untouched and
    /// a terminal failure may be recorded on it.
    Publish(PublishError),
    /// The publish succeeded but the outcome could not be recorded. The
    /// record must be left alone: it is still `scheduled` in its store and
    /// the next sweep rediscovers it (at-least-once delivery).
    MarkAfterSuccess(String),
}

/// FIFO queue + arena, drained with at most `max_concurrent` publishes in
/// flight. The drain loop is the only writer during a tick; the mutex
/// exists so the web boundary can snapshot concurrently.
#[derive(Default)]
pub struct Dispatcher {
    inner: Mutex<Inner>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the queue tail.
    ///
    /// Returns `Ok(false)` for duplicates (the item is already queued or in
    /// flight) and [`EngineError::QueueFull`] beyond `max_queue_size`;
    /// neither crashes the tick.
    pub fn enqueue(
        &self,
        item: ScheduledItem,
        max_queue_size: usize,
    ) -> Result<bool, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let key = item.key();

        if inner.items.contains_key(&key) {
            debug!(kind = %item.kind, id = %item.id, "item already queued, skipping");
            return Ok(false);
        }
        if inner.items.len() >= max_queue_size {
            return Err(EngineError::QueueFull {
                id: item.id,
                capacity: max_queue_size,
            });
        }

        inner.order.push_back(key.clone());
        inner.items.insert(
            key,
            Entry {
                item,
                state: ItemState::Pending,
            },
        );
        Ok(true)
    }

    /// Items currently live in the arena (any state).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items waiting to run (not in flight).
    pub fn waiting(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .items
            .values()
            .filter(|e| e.state != ItemState::InFlight)
            .count()
    }

    /// Current queue contents for the operational boundary.
    pub fn snapshot(&self) -> Vec<QueuedItem> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<QueuedItem> = inner
            .items
            .values()
            .map(|e| QueuedItem {
                item: e.item.clone(),
                state: e.state,
            })
            .collect();
        out.sort_by(|a, b| a.item.due_at.cmp(&b.item.due_at));
        out
    }

    /// Pop the first queued item that is ready at `now`, marking it in
    /// flight. Skips retry-scheduled items still waiting out their delay.
    fn next_ready(&self, now: DateTime<Utc>) -> Option<ScheduledItem> {
        let mut inner = self.inner.lock().unwrap();

        let position = inner.order.iter().position(|key| {
            match inner.items.get(key).map(|e| e.state) {
                Some(ItemState::Pending) => true,
                Some(ItemState::RetryScheduled { ready_at }) => ready_at <= now,
                _ => false,
            }
        })?;

        let key = inner.order.remove(position).expect("position valid");
        let entry = inner.items.get_mut(&key).expect("order references arena");
        entry.state = ItemState::InFlight;
        Some(entry.item.clone())
    }

    /// Re-enqueue a transiently failed item with its backoff delay.
    fn requeue_retry(&self, mut item: ScheduledItem, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        item.attempt += 1;
        let key = item.key();
        let ready_at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);

        inner.order.push_back(key.clone());
        inner.items.insert(
            key,
            Entry {
                item,
                state: ItemState::RetryScheduled { ready_at },
            },
        );
    }

    /// Drop a terminally finished item from the arena.
    fn remove(&self, key: &ItemKey) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.remove(key);
        inner.order.retain(|k| k != key);
    }

    /// When the earliest queued item becomes ready, if any are waiting.
    fn earliest_ready(&self) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().unwrap();
        inner
            .items
            .values()
            .filter_map(|e| match e.state {
                ItemState::Pending => Some(Utc::now()),
                ItemState::RetryScheduled { ready_at } => Some(ready_at),
                ItemState::InFlight => None,
            })
            .min()
    }

    /// Drain the queue: run publishes with at most `max_concurrent` in
    /// flight until the queue is empty or `budget` is spent. Past the
    /// budget, in-flight publishes finish but nothing new is dequeued;
    /// waiting items stay queued for the next tick.
    pub async fn drain(
        &self,
        adapters: &AdapterSet,
        policy: RetryPolicy,
        stats: &StatsTracker,
        max_concurrent: usize,
        budget: Duration,
    ) -> DrainOutcome {
        let deadline = Instant::now() + budget;
        let mut outcome = DrainOutcome::default();
        let mut join_set: JoinSet<(ScheduledItem, Result<ProcessResult, AttemptFailure>)> =
            JoinSet::new();

        loop {
            // Fill free worker slots while budget remains.
            while join_set.len() < max_concurrent && Instant::now() < deadline {
                let Some(item) = self.next_ready(Utc::now()) else {
                    break;
                };
                let adapter = adapters.get(item.kind).clone();
                debug!(kind = %item.kind, id = %item.id, attempt = item.attempt, "publishing");
                join_set.spawn(async move {
                    let result = attempt(&adapter, &item).await;
                    (item, result)
                });
            }

            stats.set_active_jobs(join_set.len());
            stats.set_queue_size(self.waiting());

            let Some(joined) = join_set.join_next().await else {
                // Nothing in flight.
                if self.is_empty() || Instant::now() >= deadline {
                    break;
                }
                // Only retry-scheduled items remain: wait out the shortest
                // delay, but never past the budget.
                let Some(ready_at) = self.earliest_ready() else {
                    break;
                };
                let wait = (ready_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .min(deadline.saturating_duration_since(Instant::now()));
                tokio::time::sleep(wait).await;
                continue;
            };

            let Ok((item, result)) = joined else {
                // A panicking publish task is a programming error; the tick
                // keeps going for everything else.
                error!("publish task panicked");
                continue;
            };

            let key = item.key();
            match result {
                Ok(process_result) => {
                    self.remove(&key);
                    stats.record_result(&process_result);
                    outcome.results.push(process_result);
                }
                Err(AttemptFailure::MarkAfterSuccess(message)) => {
                    // The record stays scheduled in its store, so the next
                    // sweep picks it up again; nothing to mark here.
                    let process_result = ProcessResult::failed(&item, &message);
                    self.remove(&key);
                    stats.record_result(&process_result);
                    outcome.results.push(process_result);
                }
                Err(AttemptFailure::Publish(publish_err)) => {
                    match policy.decide(item.attempt, publish_err.class) {
                        RetryDecision::Retry { delay } => {
                            warn!(
                                kind = %item.kind,
                                id = %item.id,
                                attempt = item.attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %publish_err.message,
                                "publish failed, retry scheduled"
                            );
                            stats.record_retry(item.kind, &item.id, delay);
                            outcome.retries += 1;
                            self.requeue_retry(item, delay);
                        }
                        RetryDecision::GiveUp => {
                            let process_result =
                                ProcessResult::failed(&item, &publish_err.message);
                            let adapter = adapters.get(item.kind);
                            if let Err(e) = adapter.mark_outcome(&item, &process_result).await {
                                warn!(
                                    kind = %item.kind,
                                    id = %item.id,
                                    error = %e,
                                    "failed to record terminal failure in source store"
                                );
                            }
                            error!(
                                kind = %item.kind,
                                id = %item.id,
                                attempt = item.attempt,
                                error = %publish_err.message,
                                "publish failed terminally"
                            );
                            self.remove(&key);
                            stats.record_result(&process_result);
                            outcome.results.push(process_result);
                        }
                    }
                }
            }
        }

        stats.set_active_jobs(0);
        stats.set_queue_size(self.waiting());
        outcome
    }
}

/// One publish attempt plus outcome persistence.
///
/// Success is only reported once the source record is durably marked. If
/// marking fails after a successful publish, the record is still
/// `scheduled` in its store and the next sweep rediscovers it; the attempt
/// reports as failed without touching the record (at-least-once delivery).
pub(crate) async fn attempt(
    adapter: &ContentAdapter,
    item: &ScheduledItem,
) -> Result<ProcessResult, AttemptFailure> {
    let result = adapter
        .publish(item)
        .await
        .map_err(AttemptFailure::Publish)?;

    match adapter.mark_outcome(item, &result).await {
        Ok(()) => Ok(result),
        Err(e) => {
            warn!(
                kind = %item.kind,
                id = %item.id,
                error = %e,
                "publish succeeded but outcome was not recorded; item will be rediscovered"
            );
            Err(AttemptFailure::MarkAfterSuccess(format!(
                "published but outcome not recorded: {}",
                e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, kind: ContentKind) -> ScheduledItem {
        ScheduledItem::new(id, kind, Utc::now())
    }

    #[test]
    fn test_enqueue_rejects_beyond_capacity() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.enqueue(item("a", ContentKind::Blog), 2).unwrap());
        assert!(dispatcher.enqueue(item("b", ContentKind::Blog), 2).unwrap());

        let err = dispatcher
            .enqueue(item("c", ContentKind::Blog), 2)
            .unwrap_err();
        assert!(matches!(err, EngineError::QueueFull { capacity: 2, .. }));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_enqueue_duplicate_is_noop() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.enqueue(item("a", ContentKind::Blog), 10).unwrap());
        assert!(!dispatcher.enqueue(item("a", ContentKind::Blog), 10).unwrap());
        assert_eq!(dispatcher.len(), 1);

        // Same id under a different kind is a different item.
        assert!(dispatcher.enqueue(item("a", ContentKind::Social), 10).unwrap());
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_next_ready_is_fifo() {
        let dispatcher = Dispatcher::new();
        dispatcher.enqueue(item("a", ContentKind::Blog), 10).unwrap();
        dispatcher.enqueue(item("b", ContentKind::Social), 10).unwrap();

        let now = Utc::now();
        assert_eq!(dispatcher.next_ready(now).unwrap().id, "a");
        assert_eq!(dispatcher.next_ready(now).unwrap().id, "b");
        assert!(dispatcher.next_ready(now).is_none());
    }

    #[test]
    fn test_retry_scheduled_waits_for_ready_time() {
        let dispatcher = Dispatcher::new();
        dispatcher.enqueue(item("a", ContentKind::Blog), 10).unwrap();

        let popped = dispatcher.next_ready(Utc::now()).unwrap();
        dispatcher.requeue_retry(popped, Duration::from_secs(30));

        // Not ready yet; attempt counter advanced.
        assert!(dispatcher.next_ready(Utc::now()).is_none());
        let snapshot = dispatcher.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].item.attempt, 1);
        assert!(matches!(
            snapshot[0].state,
            ItemState::RetryScheduled { .. }
        ));

        // Ready once the delay has passed.
        let later = Utc::now() + chrono::Duration::seconds(31);
        assert_eq!(dispatcher.next_ready(later).unwrap().id, "a");
    }

    #[test]
    fn test_ready_pending_item_is_taken_past_waiting_retry() {
        let dispatcher = Dispatcher::new();
        dispatcher.enqueue(item("slow", ContentKind::Blog), 10).unwrap();
        let popped = dispatcher.next_ready(Utc::now()).unwrap();
        dispatcher.requeue_retry(popped, Duration::from_secs(60));

        dispatcher.enqueue(item("fresh", ContentKind::Social), 10).unwrap();

        // The waiting retry at the queue head does not block fresh work.
        assert_eq!(dispatcher.next_ready(Utc::now()).unwrap().id, "fresh");
    }

    #[test]
    fn test_remove_clears_arena_and_order() {
        let dispatcher = Dispatcher::new();
        let it = item("a", ContentKind::Blog);
        let key = it.key();
        dispatcher.enqueue(it, 10).unwrap();
        dispatcher.remove(&key);

        assert!(dispatcher.is_empty());
        assert!(dispatcher.next_ready(Utc::now()).is_none());
    }
}
