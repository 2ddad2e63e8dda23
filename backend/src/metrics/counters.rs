use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub shifts_started: Arc<AtomicU64>,
    pub shifts_completed: Arc<AtomicU64>,
    pub shifts_reviewed: Arc<AtomicU64>,

    // conflict visibility
    pub start_conflicts: Arc<AtomicU64>,

    pub readings_updated: Arc<AtomicU64>,
    pub payment_mutations: Arc<AtomicU64>,
    pub summaries_served: Arc<AtomicU64>,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            shifts_started: self.shifts_started.load(Ordering::Relaxed),
            shifts_completed: self.shifts_completed.load(Ordering::Relaxed),
            shifts_reviewed: self.shifts_reviewed.load(Ordering::Relaxed),
            start_conflicts: self.start_conflicts.load(Ordering::Relaxed),
            readings_updated: self.readings_updated.load(Ordering::Relaxed),
            payment_mutations: self.payment_mutations.load(Ordering::Relaxed),
            summaries_served: self.summaries_served.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time read of the counters, serialized by the status endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CountersSnapshot {
    pub shifts_started: u64,
    pub shifts_completed: u64,
    pub shifts_reviewed: u64,
    pub start_conflicts: u64,
    pub readings_updated: u64,
    pub payment_mutations: u64,
    pub summaries_served: u64,
}
