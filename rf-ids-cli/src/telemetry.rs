//! Periodic sampling of the core's performance counters into operator-facing
//! rate statistics.

use crate::logging::CounterStatsEvent;
use chrono::Utc;
use rf_ids_core::counters::{CounterSnapshot, PerformanceCounters};
use std::sync::Arc;
use std::time::Instant;

pub struct CounterSampler {
    counters: Arc<PerformanceCounters>,
    sample_interval_secs: f64,
    last_sample_time: Instant,
    last_snapshot: CounterSnapshot,
    start_time: Instant,
}

impl CounterSampler {
    pub fn new(counters: Arc<PerformanceCounters>, sample_interval_secs: f64) -> Self {
        Self {
            last_snapshot: counters.snapshot(),
            counters,
            sample_interval_secs,
            last_sample_time: Instant::now(),
            start_time: Instant::now(),
        }
    }

    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Take a snapshot and compute per-second rates since the last sample.
    /// Returns `None` if called before the sampling interval has elapsed.
    pub fn sample(&mut self) -> Option<CounterStatsEvent> {
        if !self.should_sample() {
            return None;
        }

        let elapsed_since_last = self.last_sample_time.elapsed().as_secs_f64();
        let snapshot = self.counters.snapshot();

        let frames_per_sec = (snapshot.frames_demuxed.saturating_sub(self.last_snapshot.frames_demuxed)) as f64
            / elapsed_since_last;
        let events_emitted = snapshot.events_benign
            + snapshot.events_suspicious
            + snapshot.events_malicious
            + snapshot.events_critical;
        let prev_events_emitted = self.last_snapshot.events_benign
            + self.last_snapshot.events_suspicious
            + self.last_snapshot.events_malicious
            + self.last_snapshot.events_critical;
        let events_per_sec = (events_emitted.saturating_sub(prev_events_emitted)) as f64 / elapsed_since_last;

        let event = CounterStatsEvent {
            timestamp: Utc::now(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            snapshot,
            frames_per_sec,
            events_per_sec,
        };

        self.last_snapshot = snapshot;
        self.last_sample_time = Instant::now();

        Some(event)
    }
}
