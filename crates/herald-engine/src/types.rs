//! Engine data types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of content types the engine processes.
///
/// Adding a kind means adding an adapter variant; every dispatch site
/// matches exhaustively, so the compiler walks you through the extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Blog,
    Social,
    Newsletter,
}

impl ContentKind {
    /// All kinds, in the order they are swept each tick.
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Blog,
        ContentKind::Social,
        ContentKind::Newsletter,
    ];
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentKind::Blog => "blog",
            ContentKind::Social => "social",
            ContentKind::Newsletter => "newsletter",
        };
        f.write_str(s)
    }
}

/// One unit of publishable work discovered by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledItem {
    /// Source-specific record id.
    pub id: String,
    /// Which content source the item came from.
    pub kind: ContentKind,
    /// The stored publish time that made the item due.
    pub due_at: DateTime<Utc>,
    /// Attempts already made in this process (in-memory only).
    pub attempt: u32,
    /// Opaque reference back to the source record.
    pub payload: String,
}

impl ScheduledItem {
    /// Create a fresh item for a just-discovered record.
    pub fn new(
        id: impl Into<String>,
        kind: ContentKind,
        due_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            payload: id.clone(),
            id,
            kind,
            due_at,
            attempt: 0,
        }
    }

    /// Arena key: ids are only unique within a content source.
    pub fn key(&self) -> (ContentKind, String) {
        (self.kind, self.id.clone())
    }
}

/// Queue-side lifecycle of an item. Terminal items leave the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    /// Waiting in the FIFO queue.
    Pending,
    /// A worker is publishing it right now.
    InFlight,
    /// Failed transiently; becomes pending again at `ready_at`.
    RetryScheduled { ready_at: DateTime<Utc> },
}

/// An item plus its queue state, as exposed by the queue snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedItem {
    #[serde(flatten)]
    pub item: ScheduledItem,
    #[serde(flatten)]
    pub state: ItemState,
}

/// Outcome of one publish attempt. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub item_id: String,
    pub kind: ContentKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessResult {
    /// Successful publish, optionally carrying an external reference.
    pub fn ok(item: &ScheduledItem, platform_ref: Option<String>) -> Self {
        Self {
            item_id: item.id.clone(),
            kind: item.kind,
            success: true,
            error: None,
            platform_ref,
            timestamp: Utc::now(),
        }
    }

    /// Failed publish with the reason.
    pub fn failed(item: &ScheduledItem, error: impl Into<String>) -> Self {
        Self {
            item_id: item.id.clone(),
            kind: item.kind,
            success: false,
            error: Some(error.into()),
            platform_ref: None,
            timestamp: Utc::now(),
        }
    }
}

/// Per-kind slice of a run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Summary of one scheduler tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries: u64,
    pub duration_ms: u64,
    pub by_kind: BTreeMap<ContentKind, KindReport>,
    pub errors: Vec<String>,
}

impl RunReport {
    /// Fold one terminal result into the report.
    pub fn record(&mut self, result: &ProcessResult) {
        self.total_processed += 1;
        let slot = self.by_kind.entry(result.kind).or_default();
        slot.processed += 1;
        if result.success {
            self.successful += 1;
            slot.successful += 1;
        } else {
            self.failed += 1;
            slot.failed += 1;
            if let Some(error) = &result.error {
                self.errors
                    .push(format!("{}/{}: {}", result.kind, result.item_id, error));
            }
        }
    }
}
