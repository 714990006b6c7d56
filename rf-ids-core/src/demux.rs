//! Converts a raw interleaved-byte IQ stream into fixed-length [`IqFrame`]s.

use std::time::Instant;

use num_complex::Complex64;

use crate::errors::FrameError;
use crate::model::IqFrame;

/// Source of wall-clock-compatible monotonic timestamps, injectable for
/// deterministic tests.
pub trait Clock: Send {
    fn now_s(&self) -> f64;
}

/// Default clock backed by `std::time::Instant`.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Accumulates raw IQ bytes into fixed-length frames.
pub struct Demux {
    frame_samples: usize,
    sample_rate_hz: f64,
    center_freq_hz: f64,
    pending_byte: Option<u8>,
    buffer: Vec<Complex64>,
    clock: Box<dyn Clock>,
}

impl Demux {
    pub fn new(frame_samples: usize, sample_rate_hz: f64, center_freq_hz: f64) -> Self {
        Self::with_clock(
            frame_samples,
            sample_rate_hz,
            center_freq_hz,
            Box::new(MonotonicClock::new()),
        )
    }

    pub fn with_clock(
        frame_samples: usize,
        sample_rate_hz: f64,
        center_freq_hz: f64,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            frame_samples,
            sample_rate_hz,
            center_freq_hz,
            pending_byte: None,
            buffer: Vec::with_capacity(frame_samples),
            clock,
        }
    }

    pub fn set_center_freq_hz(&mut self, center_freq_hz: f64) {
        self.center_freq_hz = center_freq_hz;
    }

    /// Feed raw bytes; returns any frames completed by this chunk, in order.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<IqFrame> {
        let mut iter = bytes.iter().copied();
        let mut completed = Vec::new();

        loop {
            let i = match self.pending_byte.take().or_else(|| iter.next()) {
                Some(b) => b,
                None => break,
            };
            let q = match iter.next() {
                Some(b) => b,
                None => {
                    self.pending_byte = Some(i);
                    break;
                }
            };

            self.buffer.push(to_complex(i, q));

            if self.buffer.len() >= self.frame_samples {
                completed.push(self.take_frame());
            }
        }

        completed
    }

    /// Called at clean end-of-stream: drops any partial frame. If a stray
    /// unpaired byte is still pending, the overall stream had an odd byte
    /// count; that byte is drained and reported as `MalformedLength`.
    pub fn flush(&mut self) -> Option<FrameError> {
        self.buffer.clear();
        if self.pending_byte.take().is_some() {
            Some(FrameError::MalformedLength { byte_len: 1 })
        } else {
            None
        }
    }

    fn take_frame(&mut self) -> IqFrame {
        let samples = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.frame_samples));
        IqFrame {
            timestamp: self.clock.now_s(),
            sample_rate_hz: self.sample_rate_hz,
            center_freq_hz: self.center_freq_hz,
            samples,
        }
    }
}

fn to_complex(i: u8, q: u8) -> Complex64 {
    let re = (i as f64 - 127.5) / 127.5;
    let im = (q as f64 - 127.5) / 127.5;
    Complex64::new(re, im)
}
