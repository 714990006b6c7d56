//! Shared data types passed between pipeline stages.
//!
//! Internal stages pass these typed values directly; serialization only
//! happens at the emitter boundary (see [`crate::emitter`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One analysis window of IQ samples, produced by the demux.
#[derive(Debug, Clone)]
pub struct IqFrame {
    pub timestamp: f64,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
    pub samples: Vec<num_complex::Complex64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    Fsk,
    Gfsk,
    Ask,
    Ook,
    Noise,
    Wideband,
    Unknown,
}

/// A single contiguous above-threshold interval within a frame, in seconds
/// relative to frame start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    pub start_s: f64,
    pub end_s: f64,
}

impl Burst {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// Features extracted from one [`IqFrame`] by the signal analyzer.
#[derive(Debug, Clone)]
pub struct SignalFeatures {
    /// Power spectrum in dB, DC-centered.
    pub power_spectrum_db: Vec<f64>,
    pub bin_hz: f64,
    pub peak_freq_offset_hz: f64,
    pub bandwidth_hz: f64,
    pub snr_db: f64,
    pub rssi_db: f64,
    pub noise_floor_db: f64,
    pub bursts: Vec<Burst>,
    pub freq_deviation_hz: f64,
    pub freq_std_hz: f64,
    pub spectral_flatness: f64,
    pub modulation: Modulation,
}

impl SignalFeatures {
    /// Inter-burst gaps in seconds, in order.
    pub fn inter_burst_gaps_s(&self) -> Vec<f64> {
        self.bursts
            .windows(2)
            .map(|w| w[1].start_s - w[0].end_s)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    KeyFob,
    Tpms,
    Unknown,
}

/// A classified signal, ready for history storage and detector analysis.
#[derive(Debug, Clone)]
pub struct DetectedSignal {
    pub id: Uuid,
    pub timestamp: f64,
    pub center_freq_hz: f64,
    pub features: SignalFeatures,
    pub signal_type: SignalType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    Replay,
    Jamming,
    BruteForce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum JammingPattern {
    Continuous,
    Pulse,
    Sweep,
    Spot,
}

/// Evidence attached to a detector verdict; one variant per detector kind so
/// each carries only the fields relevant to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Evidence {
    Replay {
        original_event_id: Uuid,
        original_timestamp: f64,
        replay_timestamp: f64,
        time_delta_s: f64,
        spectrum_similarity: f64,
        burst_similarity: f64,
        freq_deviation_similarity: f64,
        bandwidth_similarity: f64,
    },
    Jamming {
        noise_elevation_db: f64,
        spectral_flatness: f64,
        pattern: JammingPattern,
        center_freq_hz: f64,
        snr_degradation_db: f64,
    },
    BruteForce {
        tier: BruteForceTier,
        short_window_count: usize,
        medium_window_count: usize,
        long_window_count: usize,
        burst_window_count: usize,
        inter_arrival_cv: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BruteForceTier {
    Suspicious,
    Moderate,
    High,
    Critical,
}

/// The output of a single detector for a single signal.
#[derive(Debug, Clone)]
pub struct ThreatVerdict {
    pub kind: ThreatKind,
    pub confidence: f64,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Benign,
    Suspicious,
    Malicious,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Rf,
    Nfc,
    Correlated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Monitor,
    Investigate,
    Alert,
    CriticalAlert,
}

/// Serializable snapshot of a [`SignalFeatures`] + [`SignalType`] pair,
/// matching the `signal` object in the outbound JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub center_freq_hz: f64,
    pub rssi_db: f64,
    pub snr_db: f64,
    pub modulation: Modulation,
    pub bandwidth_hz: f64,
    pub burst_count: usize,
    pub confidence: f64,
}

impl SignalSnapshot {
    pub fn from_signal(signal: &DetectedSignal) -> Self {
        Self {
            signal_type: signal.signal_type,
            center_freq_hz: signal.center_freq_hz,
            rssi_db: signal.features.rssi_db,
            snr_db: signal.features.snr_db,
            modulation: signal.features.modulation,
            bandwidth_hz: signal.features.bandwidth_hz,
            burst_count: signal.features.bursts.len(),
            confidence: signal.confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictSnapshot {
    pub kind: ThreatKind,
    pub confidence: f64,
    pub evidence: Evidence,
}

/// The canonical security event emitted to the outbound NDJSON stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_id: Uuid,
    pub ts: f64,
    pub source: EventSource,
    pub threat_level: ThreatLevel,
    pub signal: Option<SignalSnapshot>,
    pub verdicts: Vec<VerdictSnapshot>,
    pub recommended_action: RecommendedAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rf_trigger_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_delta_s: Option<f64>,
}

/// Correlator lifecycle events; share the outbound envelope shape via a
/// `type` discriminant rather than the `SecurityEvent` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuxiliaryEvent {
    CorrelationActivated {
        event_id: Uuid,
        ts: f64,
        rf_trigger_id: Uuid,
    },
    CorrelationTimeout {
        event_id: Uuid,
        ts: f64,
        rf_trigger_id: Uuid,
    },
}

/// Anything the pipeline may hand to the emitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Security(SecurityEvent),
    Auxiliary(AuxiliaryEvent),
}

impl OutboundMessage {
    pub fn threat_level(&self) -> Option<ThreatLevel> {
        match self {
            OutboundMessage::Security(e) => Some(e.threat_level),
            OutboundMessage::Auxiliary(_) => None,
        }
    }
}

/// A proximity-tag read from the (external) NFC reader.
#[derive(Debug, Clone)]
pub struct ProximityEvent {
    pub timestamp: f64,
    pub uid: Vec<u8>,
}

impl ProximityEvent {
    pub fn uid_hex(&self) -> String {
        self.uid.iter().map(|b| format!("{b:02x}")).collect()
    }
}
