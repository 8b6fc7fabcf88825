//! Statistics Collector Module
//!
//! Aggregates Call Events into hit/miss tallies, per-operation counters,
//! cumulative latency and an ordered call log.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::observe::bus::CallObserver;
use crate::observe::event::{CacheOp, CallEvent, CallOutcome, Frame};

// == Call Record ==
/// One entry of the call log: a lightweight, display-ready view of an event.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Time spent in the delegated call, in milliseconds
    pub time_ms: f64,
    /// Which operation was invoked
    pub op: CacheOp,
    /// Display form of the primary argument(s)
    pub args: String,
    /// Captured call site
    pub call_site: Vec<Frame>,
    /// Enclosing rendering context, if resolved
    pub context_hint: Option<String>,
    /// When the call was made
    pub at: DateTime<Utc>,
}

// == Stats Snapshot ==
/// Serializable view of the aggregates at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Sum of all observed durations in milliseconds
    pub total_time_ms: f64,
    /// Read operations that found a value
    pub hits: u64,
    /// Read operations that found nothing
    pub misses: u64,
    /// Call count per operation kind, every kind present
    pub op_counts: BTreeMap<CacheOp, u64>,
    /// Total number of observed calls
    pub total_calls: usize,
    /// The ordered call log
    pub calls: Vec<CallRecord>,
}

// == Collector State ==
#[derive(Debug)]
struct StatsInner {
    total_time_ms: f64,
    hits: u64,
    misses: u64,
    op_counts: BTreeMap<CacheOp, u64>,
    calls: Vec<CallRecord>,
}

impl StatsInner {
    fn new() -> Self {
        // Every known kind starts at zero so the read surface always
        // exposes a complete mapping.
        let op_counts = CacheOp::ALL.iter().map(|op| (*op, 0)).collect();
        Self {
            total_time_ms: 0.0,
            hits: 0,
            misses: 0,
            op_counts,
            calls: Vec::new(),
        }
    }

    fn record(&mut self, event: &CallEvent) {
        match (&event.op, &event.outcome) {
            (CacheOp::Get, CallOutcome::Value(found)) => match found {
                Some(_) => self.hits += 1,
                None => self.misses += 1,
            },
            (CacheOp::GetMany, CallOutcome::Values(found)) => {
                // One classification per requested key, not per call.
                for value in found.values() {
                    match value {
                        Some(_) => self.hits += 1,
                        None => self.misses += 1,
                    }
                }
            }
            _ => {}
        }

        self.total_time_ms += event.duration.as_secs_f64() * 1000.0;
        *self.op_counts.entry(event.op).or_insert(0) += 1;
        self.calls.push(CallRecord {
            time_ms: event.duration.as_secs_f64() * 1000.0,
            op: event.op,
            args: event.args.clone(),
            call_site: event.call_site.clone(),
            context_hint: event.context_hint.clone(),
            at: event.at,
        });
    }
}

// == Stats Collector ==
/// Subscriber that turns the event stream into aggregate statistics.
///
/// One collector is meant to measure one unit of work (e.g. one request):
/// create it, subscribe it to the bus for the lifetime of that work, read
/// the aggregates at the end, drop it. The aggregates sit behind a mutex so
/// reads are safe while events may still arrive.
pub struct StatsCollector {
    inner: Mutex<StatsInner>,
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a collector with all counters at zero and an empty log.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner::new()),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Read Surface ==
    /// Sum of all observed durations in milliseconds.
    pub fn total_time_ms(&self) -> f64 {
        self.locked().total_time_ms
    }

    /// Number of read operations that found a value.
    pub fn hits(&self) -> u64 {
        self.locked().hits
    }

    /// Number of read operations that found nothing.
    pub fn misses(&self) -> u64 {
        self.locked().misses
    }

    /// Hit rate over all classified reads, or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let inner = self.locked();
        let total = inner.hits + inner.misses;
        if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        }
    }

    /// Call count per operation kind. Every kind is present, zero included.
    pub fn op_counts(&self) -> BTreeMap<CacheOp, u64> {
        self.locked().op_counts.clone()
    }

    /// The ordered call log, insertion order = emission order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.locked().calls.clone()
    }

    /// Total number of observed calls.
    pub fn call_count(&self) -> usize {
        self.locked().calls.len()
    }

    /// Consistent view of all aggregates at this instant.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.locked();
        StatsSnapshot {
            total_time_ms: inner.total_time_ms,
            hits: inner.hits,
            misses: inner.misses,
            op_counts: inner.op_counts.clone(),
            total_calls: inner.calls.len(),
            calls: inner.calls.clone(),
        }
    }

    /// Emits the current aggregates through tracing.
    pub fn log(&self) {
        let inner = self.locked();
        info!(
            total_calls = inner.calls.len(),
            hits = inner.hits,
            misses = inner.misses,
            total_time_ms = inner.total_time_ms,
            "cache call statistics"
        );
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CallObserver for StatsCollector {
    fn on_call(&self, event: &CallEvent) {
        self.locked().record(event);
    }
}
