//! Per-sweep state
//!
//! A [`SweepSession`] owns everything that lives exactly as long as one sweep:
//! the fingerprint set, the counters and a handle on the event channel. It is
//! passed by reference into the orchestrator and sink instead of living in
//! globals, so two sweeps in one process never share dedup state.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::dedup::DedupStore;
use crate::types::{Event, ResponseOutcome, SweepResult};

/// Monotonic counters, safe to update from concurrent workers
#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    hits: AtomicU64,
    attempts: AtomicU64,
    duplicates: AtomicU64,
    empty: AtomicU64,
    invalid: AtomicU64,
    transport_errors: AtomicU64,
}

/// State of one sweep
#[derive(Debug)]
pub struct SweepSession {
    total: u64,
    dedup: DedupStore,
    counters: Counters,
    event_tx: broadcast::Sender<Event>,
    started_at: DateTime<Utc>,
}

impl SweepSession {
    /// Start a session for a grid of `total` coordinates
    pub fn new(total: u64, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            total,
            dedup: DedupStore::new(),
            counters: Counters::default(),
            event_tx,
            started_at: Utc::now(),
        }
    }

    /// Coordinates in the grid
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fingerprints seen so far
    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Count one request outcome
    pub fn record_attempt(&self, outcome: &ResponseOutcome) {
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ResponseOutcome::Accepted { .. } => return,
            ResponseOutcome::Duplicate { .. } => &self.counters.duplicates,
            ResponseOutcome::Empty { .. } => &self.counters.empty,
            ResponseOutcome::Invalid { .. } => &self.counters.invalid,
            ResponseOutcome::TransportError { .. } => &self.counters.transport_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a persisted document and return the new hit total
    pub fn record_hit(&self) -> u64 {
        self.counters.hits.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a finished coordinate and return how many are done
    pub fn record_processed(&self) -> u64 {
        self.counters.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Documents persisted so far
    pub fn hits(&self) -> u64 {
        self.counters.hits.load(Ordering::SeqCst)
    }

    /// Coordinates finished so far
    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::SeqCst)
    }

    /// Publish an event; having no subscriber is not an error
    pub fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Snapshot the counters into a [`SweepResult`]
    pub fn result(&self, output_dir: PathBuf, cancelled: bool) -> SweepResult {
        let c = &self.counters;
        SweepResult {
            total: self.total,
            processed: c.processed.load(Ordering::SeqCst),
            hits: c.hits.load(Ordering::SeqCst),
            attempts: c.attempts.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            empty: c.empty.load(Ordering::Relaxed),
            invalid: c.invalid.load(Ordering::Relaxed),
            transport_errors: c.transport_errors.load(Ordering::Relaxed),
            cancelled,
            output_dir,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
