//! Phase profiling
//!
//! Runtime-selectable strategy instead of compile-time gating: sessions hold
//! a [`Profiler`] trait object, either the no-op variant or a recording one
//! that accumulates wall-clock durations per phase label.

use std::time::{Duration, Instant};

use tracing::info;

/// Timing sink for build/run phases
pub trait Profiler: Send {
    /// Record one completed phase
    fn record(&mut self, phase: &str, elapsed: Duration);

    /// Emit whatever was collected; no-op for the null profiler
    fn report(&self);
}

/// Discards all measurements
#[derive(Debug, Default)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn record(&mut self, _phase: &str, _elapsed: Duration) {}

    fn report(&self) {}
}

/// Accumulates per-phase durations; repeated phases sum up
#[derive(Debug, Default)]
pub struct RecordingProfiler {
    records: Vec<(String, Duration)>,
}

impl RecordingProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total accumulated duration for one phase label
    pub fn elapsed(&self, phase: &str) -> Option<Duration> {
        self.records
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, d)| *d)
    }

    pub fn phases(&self) -> impl Iterator<Item = &(String, Duration)> {
        self.records.iter()
    }
}

impl Profiler for RecordingProfiler {
    fn record(&mut self, phase: &str, elapsed: Duration) {
        if let Some(entry) = self.records.iter_mut().find(|(name, _)| name == phase) {
            entry.1 += elapsed;
        } else {
            self.records.push((phase.to_string(), elapsed));
        }
    }

    fn report(&self) {
        let total: Duration = self.records.iter().map(|(_, d)| *d).sum();
        for (phase, elapsed) in &self.records {
            info!(phase = %phase, ms = elapsed.as_secs_f64() * 1000.0, "profile");
        }
        info!(total_ms = total.as_secs_f64() * 1000.0, "profile total");
    }
}

/// Time one closure and record it under `phase`
pub fn timed<T>(profiler: &mut dyn Profiler, phase: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    profiler.record(phase, start.elapsed());
    result
}
