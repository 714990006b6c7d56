//! Bounded, time-windowed, thread-safe store of recently detected signals.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::config::HistoryConfig;
use crate::model::{DetectedSignal, SignalType};

/// Multiple concurrent readers, single writer. Cloning shares the
/// underlying store (an `Arc<RwLock<_>>`), matching the reader-writer
/// discipline detectors need: they never block the pipeline's writer for
/// longer than one lock acquisition.
#[derive(Clone)]
pub struct SignalHistory {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    max_size: usize,
    retention_s: f64,
    entries: VecDeque<DetectedSignal>,
}

impl SignalHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                max_size: config.max_size,
                retention_s: config.retention_s,
                entries: VecDeque::with_capacity(config.max_size),
            })),
        }
    }

    /// Insert in timestamp order, then evict from the head until both the
    /// size and retention bounds hold. Entries older than retention relative
    /// to the newly inserted signal's timestamp are dropped, not just
    /// capacity-evicted.
    pub fn insert(&self, signal: DetectedSignal) {
        let mut inner = self.inner.write().expect("history lock poisoned");

        if let Some(back) = inner.entries.back() {
            if signal.timestamp < back.timestamp {
                // Out of order relative to what's stored; still insert, but
                // in the right position rather than silently dropping data.
                let pos = inner
                    .entries
                    .iter()
                    .position(|e| e.timestamp > signal.timestamp)
                    .unwrap_or(inner.entries.len());
                inner.entries.insert(pos, signal);
                evict(&mut inner);
                return;
            }
        }

        inner.entries.push_back(signal);
        evict(&mut inner);
    }

    /// All entries with `now - ts <= window_seconds`, oldest first.
    pub fn recent(&self, now: f64, window_seconds: f64) -> Vec<DetectedSignal> {
        let inner = self.inner.read().expect("history lock poisoned");
        inner
            .entries
            .iter()
            .filter(|e| now - e.timestamp <= window_seconds)
            .cloned()
            .collect()
    }

    pub fn by_type(&self, signal_type: SignalType, now: f64, window_seconds: f64) -> Vec<DetectedSignal> {
        self.recent(now, window_seconds)
            .into_iter()
            .filter(|e| e.signal_type == signal_type)
            .collect()
    }

    /// Entries with `signal_type` whose center frequency is within
    /// `tolerance_hz` of `center_freq_hz`.
    pub fn by_type_and_freq(
        &self,
        signal_type: SignalType,
        center_freq_hz: f64,
        tolerance_hz: f64,
        now: f64,
        window_seconds: f64,
    ) -> Vec<DetectedSignal> {
        self.by_type(signal_type, now, window_seconds)
            .into_iter()
            .filter(|e| (e.center_freq_hz - center_freq_hz).abs() <= tolerance_hz)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("history lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn oldest(&self) -> Option<DetectedSignal> {
        self.inner
            .read()
            .expect("history lock poisoned")
            .entries
            .front()
            .cloned()
    }

    pub fn newest(&self) -> Option<DetectedSignal> {
        self.inner
            .read()
            .expect("history lock poisoned")
            .entries
            .back()
            .cloned()
    }
}

fn evict(inner: &mut Inner) {
    while inner.entries.len() > inner.max_size {
        inner.entries.pop_front();
    }

    if let Some(newest_ts) = inner.entries.back().map(|e| e.timestamp) {
        while let Some(front) = inner.entries.front() {
            if newest_ts - front.timestamp > inner.retention_s {
                inner.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
