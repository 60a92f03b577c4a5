use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Result of one worker's attempt on one candidate object.
#[derive(Debug)]
pub enum ProcessOutcome {
    Processed {
        key: String,
        target_key: String,
        duration: Duration,
    },
    Failed {
        key: String,
        error: String,
    },
}

impl ProcessOutcome {
    pub fn key(&self) -> &str {
        match self {
            ProcessOutcome::Processed { key, .. } | ProcessOutcome::Failed { key, .. } => key,
        }
    }
}

/// A failed object key and the cause reported by its worker.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub key: String,
    pub error: String,
}

/// Aggregate counts for a single run.
///
/// Every listed object lands in exactly one of `skipped`, `processed` or
/// `failed`, so once the run is finalized their sum equals `listed`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub listed: usize,
    pub candidates: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            listed: 0,
            candidates: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            duration_ms: 0,
        }
    }

    /// Tally one worker outcome, returning the failure detail if it was one.
    pub fn record(&mut self, outcome: ProcessOutcome) -> Option<ItemFailure> {
        match outcome {
            ProcessOutcome::Processed { .. } => {
                self.processed += 1;
                None
            }
            ProcessOutcome::Failed { key, error } => {
                self.failed += 1;
                Some(ItemFailure { key, error })
            }
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = elapsed.as_millis() as u64;
    }

    /// True when every listed object is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.skipped + self.processed + self.failed == self.listed
    }
}
