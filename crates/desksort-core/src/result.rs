//! Per-item and per-batch outcomes reported by the engines.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Outcome of one processed move source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Skipped,
    Cancelled,
    Error,
}

/// Result for a single source of a move batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveItemResult {
    /// The source as given in the request.
    pub src: PathBuf,
    /// Destination path. `None` when the source was rejected before a
    /// destination was computed.
    pub dest: Option<PathBuf>,
    pub status: ItemStatus,
    /// Whether the destination already existed.
    pub conflict: bool,
    /// Classified, path-qualified message for `ItemStatus::Error`.
    pub error: Option<String>,
}

impl MoveItemResult {
    /// A successful move.
    pub fn ok(src: PathBuf, dest: PathBuf, conflict: bool) -> Self {
        Self {
            src,
            dest: Some(dest),
            status: ItemStatus::Ok,
            conflict,
            error: None,
        }
    }

    /// A source left in place because of a skip decision.
    pub fn skipped(src: PathBuf, dest: PathBuf, conflict: bool) -> Self {
        Self {
            src,
            dest: Some(dest),
            status: ItemStatus::Skipped,
            conflict,
            error: None,
        }
    }

    /// The item where the batch was cancelled.
    pub fn cancelled(src: PathBuf, dest: PathBuf) -> Self {
        Self {
            src,
            dest: Some(dest),
            status: ItemStatus::Cancelled,
            conflict: true,
            error: None,
        }
    }

    /// A failed item.
    pub fn error(src: PathBuf, dest: Option<PathBuf>, conflict: bool, message: impl Into<String>) -> Self {
        Self {
            src,
            dest,
            status: ItemStatus::Error,
            conflict,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ItemStatus::Ok
    }
}

/// Counts per status for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub ok: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub error: usize,
}

impl BatchSummary {
    /// Total number of processed items.
    pub fn total(&self) -> usize {
        self.ok + self.skipped + self.cancelled + self.error
    }
}

/// Result of one submitted move request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// One entry per processed source, in submission order.
    pub items: Vec<MoveItemResult>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Batch-level failure. When set, no item was processed.
    pub error: Option<String>,
}

impl BatchResult {
    /// A batch that failed before processing any item.
    pub fn aborted(message: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            items: Vec::new(),
            started_at: now,
            finished_at: now,
            error: Some(message.into()),
        }
    }

    /// Count items per status.
    pub fn summary(&self) -> BatchSummary {
        self.items
            .iter()
            .fold(BatchSummary::default(), |mut summary, item| {
                match item.status {
                    ItemStatus::Ok => summary.ok += 1,
                    ItemStatus::Skipped => summary.skipped += 1,
                    ItemStatus::Cancelled => summary.cancelled += 1,
                    ItemStatus::Error => summary.error += 1,
                }
                summary
            })
    }

    /// Check if every processed item moved and nothing was aborted.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.items.iter().all(MoveItemResult::is_ok)
    }

    /// Get a human-readable summary of the batch.
    pub fn summary_line(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }

        let summary = self.summary();
        let mut line = format!("Moved {} items", summary.ok);
        if summary.skipped > 0 {
            line.push_str(&format!(", {} skipped", summary.skipped));
        }
        if summary.error > 0 {
            line.push_str(&format!(", {} failed", summary.error));
        }
        if summary.cancelled > 0 {
            line.push_str(", cancelled");
        }
        line
    }
}

/// Outcome of one trash request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    Ok,
    Error,
}

/// Result for one path sent to the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// The path as given in the request.
    pub path: PathBuf,
    pub status: DeleteStatus,
    pub error: Option<String>,
}

impl DeleteResult {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            path,
            status: DeleteStatus::Ok,
            error: None,
        }
    }

    pub fn error(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            path,
            status: DeleteStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DeleteStatus::Ok
    }
}
