//! Process-wide performance counters. All updates are monotonic atomics;
//! snapshot reads never take a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use atomic_float::AtomicF64;

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct CounterSnapshot {
    pub frames_demuxed: u64,
    pub frames_dropped_short_read: u64,
    pub frames_dropped_malformed: u64,
    pub frames_dropped_non_finite: u64,
    pub frames_dropped_deadline: u64,
    pub signals_keyfob: u64,
    pub signals_tpms: u64,
    pub signals_unknown: u64,
    pub verdicts_replay: u64,
    pub verdicts_jamming: u64,
    pub verdicts_brute_force: u64,
    pub events_benign: u64,
    pub events_suspicious: u64,
    pub events_malicious: u64,
    pub events_critical: u64,
    pub events_dropped_backpressure: u64,
    pub mean_frame_latency_ms: f64,
    pub max_frame_latency_ms: f64,
}

/// Atomic counters; cheap to clone (an `Arc` internally) so every pipeline
/// stage can hold its own handle.
#[derive(Default)]
pub struct PerformanceCounters {
    frames_demuxed: AtomicU64,
    frames_dropped_short_read: AtomicU64,
    frames_dropped_malformed: AtomicU64,
    frames_dropped_non_finite: AtomicU64,
    frames_dropped_deadline: AtomicU64,
    signals_keyfob: AtomicU64,
    signals_tpms: AtomicU64,
    signals_unknown: AtomicU64,
    verdicts_replay: AtomicU64,
    verdicts_jamming: AtomicU64,
    verdicts_brute_force: AtomicU64,
    events_benign: AtomicU64,
    events_suspicious: AtomicU64,
    events_malicious: AtomicU64,
    events_critical: AtomicU64,
    events_dropped_backpressure: AtomicU64,
    latency_count: AtomicU64,
    latency_sum_ms: AtomicF64,
    latency_max_ms: AtomicF64,
}

impl PerformanceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_demuxed(&self) {
        self.frames_demuxed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped_short_read(&self) {
        self.frames_dropped_short_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped_malformed(&self) {
        self.frames_dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped_non_finite(&self) {
        self.frames_dropped_non_finite.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped_deadline(&self) {
        self.frames_dropped_deadline.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self, signal_type: crate::model::SignalType) {
        use crate::model::SignalType::*;
        let counter = match signal_type {
            KeyFob => &self.signals_keyfob,
            Tpms => &self.signals_tpms,
            Unknown => &self.signals_unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, kind: crate::model::ThreatKind) {
        use crate::model::ThreatKind::*;
        let counter = match kind {
            Replay => &self.verdicts_replay,
            Jamming => &self.verdicts_jamming,
            BruteForce => &self.verdicts_brute_force,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self, threat_level: crate::model::ThreatLevel) {
        use crate::model::ThreatLevel::*;
        let counter = match threat_level {
            Benign => &self.events_benign,
            Suspicious => &self.events_suspicious,
            Malicious => &self.events_malicious,
            Critical => &self.events_critical,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure_drop(&self) {
        self.events_dropped_backpressure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_latency_ms(&self, latency_ms: f64) {
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        let mut current_max = self.latency_max_ms.load(Ordering::Relaxed);
        while latency_ms > current_max {
            match self.latency_max_ms.compare_exchange_weak(
                current_max,
                latency_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current_max = observed,
            }
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let count = self.latency_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_ms.load(Ordering::Relaxed);
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };

        CounterSnapshot {
            frames_demuxed: self.frames_demuxed.load(Ordering::Relaxed),
            frames_dropped_short_read: self.frames_dropped_short_read.load(Ordering::Relaxed),
            frames_dropped_malformed: self.frames_dropped_malformed.load(Ordering::Relaxed),
            frames_dropped_non_finite: self.frames_dropped_non_finite.load(Ordering::Relaxed),
            frames_dropped_deadline: self.frames_dropped_deadline.load(Ordering::Relaxed),
            signals_keyfob: self.signals_keyfob.load(Ordering::Relaxed),
            signals_tpms: self.signals_tpms.load(Ordering::Relaxed),
            signals_unknown: self.signals_unknown.load(Ordering::Relaxed),
            verdicts_replay: self.verdicts_replay.load(Ordering::Relaxed),
            verdicts_jamming: self.verdicts_jamming.load(Ordering::Relaxed),
            verdicts_brute_force: self.verdicts_brute_force.load(Ordering::Relaxed),
            events_benign: self.events_benign.load(Ordering::Relaxed),
            events_suspicious: self.events_suspicious.load(Ordering::Relaxed),
            events_malicious: self.events_malicious.load(Ordering::Relaxed),
            events_critical: self.events_critical.load(Ordering::Relaxed),
            events_dropped_backpressure: self.events_dropped_backpressure.load(Ordering::Relaxed),
            mean_frame_latency_ms: mean,
            max_frame_latency_ms: self.latency_max_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SignalType, ThreatLevel};

    #[test]
    fn counters_start_at_zero() {
        let counters = PerformanceCounters::new();
        let snap = counters.snapshot();
        assert_eq!(snap.frames_demuxed, 0);
        assert_eq!(snap.mean_frame_latency_ms, 0.0);
    }

    #[test]
    fn counts_accumulate() {
        let counters = PerformanceCounters::new();
        counters.record_frame_demuxed();
        counters.record_frame_demuxed();
        counters.record_signal(SignalType::KeyFob);
        counters.record_event(ThreatLevel::Malicious);

        let snap = counters.snapshot();
        assert_eq!(snap.frames_demuxed, 2);
        assert_eq!(snap.signals_keyfob, 1);
        assert_eq!(snap.events_malicious, 1);
    }

    #[test]
    fn latency_tracks_mean_and_max() {
        let counters = PerformanceCounters::new();
        counters.record_frame_latency_ms(10.0);
        counters.record_frame_latency_ms(30.0);

        let snap = counters.snapshot();
        assert_eq!(snap.mean_frame_latency_ms, 20.0);
        assert_eq!(snap.max_frame_latency_ms, 30.0);
    }
}
