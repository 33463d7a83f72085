//! Profilers: no-op, `tracing`-backed, and in-memory recording.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::traits::{ProfiledCall, Profiler};

/// Profiler that measures nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfiler;

struct NoopCall;

impl ProfiledCall for NoopCall {
    fn stop(self: Box<Self>) {}
}

impl Profiler for NoopProfiler {
    fn start(&self, _name: &str) -> Box<dyn ProfiledCall> {
        Box::new(NoopCall)
    }
}

/// Profiler that emits one `tracing` span per call and logs its duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProfiler;

struct TracingCall {
    span: tracing::Span,
    started: Instant,
}

impl ProfiledCall for TracingCall {
    fn stop(self: Box<Self>) {
        let elapsed_us = self.started.elapsed().as_micros() as u64;
        self.span.in_scope(|| {
            tracing::debug!(elapsed_us, "profiled call finished");
        });
    }
}

impl Profiler for TracingProfiler {
    fn start(&self, name: &str) -> Box<dyn ProfiledCall> {
        Box::new(TracingCall {
            span: tracing::debug_span!("profiled_call", call = %name),
            started: Instant::now(),
        })
    }
}

/// Aggregated measurements for one call name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub count: u64,
    pub total: Duration,
}

/// Profiler that keeps per-name call counts and durations in memory.
///
/// Cheaply cloneable; clones share the same recordings.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProfiler {
    calls: Arc<Mutex<BTreeMap<String, CallStats>>>,
}

impl InMemoryProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for `name`, if it was ever stopped.
    pub fn stats(&self, name: &str) -> Option<CallStats> {
        self.calls.lock().get(name).copied()
    }

    /// Number of completed calls named `name`.
    pub fn count(&self, name: &str) -> u64 {
        self.stats(name).map(|s| s.count).unwrap_or(0)
    }

    /// All recorded call names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().keys().cloned().collect()
    }
}

struct RecordedCall {
    name: String,
    started: Instant,
    calls: Arc<Mutex<BTreeMap<String, CallStats>>>,
}

impl ProfiledCall for RecordedCall {
    fn stop(self: Box<Self>) {
        let elapsed = self.started.elapsed();
        let mut calls = self.calls.lock();
        let stats = calls.entry(self.name).or_default();
        stats.count += 1;
        stats.total += elapsed;
    }
}

impl Profiler for InMemoryProfiler {
    fn start(&self, name: &str) -> Box<dyn ProfiledCall> {
        Box::new(RecordedCall {
            name: name.to_string(),
            started: Instant::now(),
            calls: Arc::clone(&self.calls),
        })
    }
}
