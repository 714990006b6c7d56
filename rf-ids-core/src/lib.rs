//! Real-time automotive RF intrusion-detection core.
//!
//! IQ bytes come in through [`demux::Demux`], get turned into classified
//! [`model::DetectedSignal`]s by [`analyzer::SignalAnalyzer`], and are run
//! through the three stateful [`detectors`] by [`threat_engine::ThreatEngine`].
//! [`correlator::ProximityCorrelator`] escalates RF events against NFC
//! proximity reads, and [`emitter::EventEmitter`] serializes the result as
//! NDJSON. [`pipeline::spawn`] wires all of it into its own threads.

pub mod analyzer;
pub mod config;
pub mod correlator;
pub mod counters;
pub mod demux;
pub mod detectors;
pub mod dsp_stats;
pub mod emitter;
pub mod errors;
pub mod history;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod signal_processing;
pub mod threat_engine;

pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use model::{OutboundMessage, ProximityEvent, SecurityEvent, ThreatLevel};
pub use pipeline::{spawn, EngineHandles};
