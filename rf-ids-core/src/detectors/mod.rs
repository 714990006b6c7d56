//! Stateful detectors consulted by the threat engine for every detected
//! signal. Each conforms to the same small capability: look at the current
//! signal plus a read-only view of recent history, and optionally produce a
//! verdict.

pub mod brute_force;
pub mod jamming;
pub mod replay;

use crate::history::SignalHistory;
use crate::model::{DetectedSignal, ThreatVerdict};

pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    fn analyze(&self, current: &DetectedSignal, history: &SignalHistory) -> Option<ThreatVerdict>;
}

pub use brute_force::BruteForceDetector;
pub use jamming::JammingDetector;
pub use replay::ReplayDetector;
