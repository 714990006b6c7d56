//! Merges detector verdicts into a threat level and constructs the outbound
//! `SecurityEvent`.

use uuid::Uuid;

use crate::detectors::{BruteForceDetector, Detector, JammingDetector, ReplayDetector};
use crate::history::SignalHistory;
use crate::logging::SignalLogger;
use crate::model::{
    DetectedSignal, EventSource, RecommendedAction, SecurityEvent, SignalSnapshot, ThreatLevel, ThreatVerdict,
    VerdictSnapshot,
};

const MALICIOUS_CONFIDENCE_THRESHOLD: f64 = 0.9;
const SUSPICIOUS_CONFIDENCE_THRESHOLD: f64 = 0.6;

pub struct ThreatEngine {
    replay: ReplayDetector,
    jamming: JammingDetector,
    brute_force: BruteForceDetector,
    history: SignalHistory,
}

impl ThreatEngine {
    pub fn new(replay: ReplayDetector, jamming: JammingDetector, brute_force: BruteForceDetector, history: SignalHistory) -> Self {
        Self {
            replay,
            jamming,
            brute_force,
            history,
        }
    }

    /// Run the detector chain against `signal`, insert it into history
    /// (after verdicts are computed, so replay never self-matches), and
    /// build the resulting `SecurityEvent` if the merged threat level
    /// warrants emission.
    pub fn process(&self, signal: DetectedSignal, logger: &mut SignalLogger) -> Option<SecurityEvent> {
        let mut verdicts = Vec::new();
        if let Some(v) = self.replay.analyze(&signal, &self.history) {
            logger.info("THREAT", format!("replay verdict confidence={:.2}", v.confidence));
            verdicts.push(v);
        }
        if let Some(v) = self.jamming.analyze(&signal, &self.history) {
            logger.info("THREAT", format!("jamming verdict confidence={:.2}", v.confidence));
            verdicts.push(v);
        }
        if let Some(v) = self.brute_force.analyze(&signal, &self.history) {
            logger.info("THREAT", format!("brute_force verdict confidence={:.2}", v.confidence));
            verdicts.push(v);
        }

        self.history.insert(signal.clone());

        let threat_level = merge_threat_level(&verdicts, &signal);

        // Benign events are only worth emitting when the signal matched a
        // known automotive template; an unclassified, verdict-free signal
        // produces no event at all.
        if threat_level == ThreatLevel::Benign && signal.signal_type == crate::model::SignalType::Unknown {
            return None;
        }

        Some(build_event(signal, verdicts, threat_level))
    }
}

fn merge_threat_level(verdicts: &[ThreatVerdict], signal: &DetectedSignal) -> ThreatLevel {
    use crate::model::{BruteForceTier, Evidence};

    let any_critical_tier = verdicts.iter().any(|v| {
        matches!(
            &v.evidence,
            Evidence::BruteForce {
                tier: BruteForceTier::Critical,
                ..
            }
        )
    });
    if any_critical_tier {
        return ThreatLevel::Malicious;
    }

    let any_high_confidence = verdicts.iter().any(|v| {
        matches!(v.kind, crate::model::ThreatKind::Jamming | crate::model::ThreatKind::Replay)
            && v.confidence >= MALICIOUS_CONFIDENCE_THRESHOLD
    });
    if any_high_confidence {
        return ThreatLevel::Malicious;
    }

    let any_suspicious = verdicts.iter().any(|v| v.confidence >= SUSPICIOUS_CONFIDENCE_THRESHOLD);
    if any_suspicious {
        return ThreatLevel::Suspicious;
    }

    if signal.signal_type != crate::model::SignalType::Unknown {
        return ThreatLevel::Benign;
    }

    ThreatLevel::Benign
}

fn recommended_action(threat_level: ThreatLevel) -> RecommendedAction {
    match threat_level {
        ThreatLevel::Benign => RecommendedAction::Monitor,
        ThreatLevel::Suspicious => RecommendedAction::Investigate,
        ThreatLevel::Malicious => RecommendedAction::Alert,
        ThreatLevel::Critical => RecommendedAction::CriticalAlert,
    }
}

fn build_event(signal: DetectedSignal, verdicts: Vec<ThreatVerdict>, threat_level: ThreatLevel) -> SecurityEvent {
    let snapshot = SignalSnapshot::from_signal(&signal);
    let verdict_snapshots = verdicts
        .into_iter()
        .map(|v| VerdictSnapshot {
            kind: v.kind,
            confidence: v.confidence,
            evidence: v.evidence,
        })
        .collect();

    SecurityEvent {
        event_id: Uuid::new_v4(),
        ts: signal.timestamp,
        source: EventSource::Rf,
        threat_level,
        signal: Some(snapshot),
        verdicts: verdict_snapshots,
        recommended_action: recommended_action(threat_level),
        rf_trigger_id: None,
        nfc_uid: None,
        time_delta_s: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BruteForceConfig, HistoryConfig, JammingConfig, ReplayConfig};
    use crate::model::{Modulation, SignalFeatures, SignalType};

    fn signal(ts: f64) -> DetectedSignal {
        DetectedSignal {
            id: Uuid::new_v4(),
            timestamp: ts,
            center_freq_hz: 433_920_000.0,
            features: SignalFeatures {
                power_spectrum_db: vec![-40.0, -50.0, -60.0],
                bin_hz: 1.0,
                peak_freq_offset_hz: 0.0,
                bandwidth_hz: 5_000.0,
                snr_db: 22.0,
                rssi_db: -40.0,
                noise_floor_db: -62.0,
                bursts: vec![],
                freq_deviation_hz: 1_000.0,
                freq_std_hz: 1_200.0,
                spectral_flatness: 0.1,
                modulation: Modulation::Fsk,
            },
            signal_type: SignalType::KeyFob,
            confidence: 0.8,
        }
    }

    fn engine() -> ThreatEngine {
        let history = SignalHistory::new(&HistoryConfig::default());
        ThreatEngine::new(
            ReplayDetector::new(ReplayConfig::default()),
            JammingDetector::new(JammingConfig::default(), 60.0),
            BruteForceDetector::new(BruteForceConfig::default()),
            history,
        )
    }

    #[test]
    fn benign_keyfob_with_no_verdicts_is_emitted_as_benign() {
        let engine = engine();
        let mut logger = SignalLogger::default();
        let event = engine.process(signal(1.0), &mut logger).expect("should emit");
        assert_eq!(event.threat_level, ThreatLevel::Benign);
        assert!(event.verdicts.is_empty());
    }

    #[test]
    fn unknown_signal_with_no_verdicts_is_not_emitted() {
        let engine = engine();
        let mut logger = SignalLogger::default();
        let mut s = signal(1.0);
        s.signal_type = SignalType::Unknown;
        assert!(engine.process(s, &mut logger).is_none());
    }

    #[test]
    fn signal_is_inserted_after_verdicts_so_later_signals_can_match_it() {
        let engine = engine();
        let mut logger = SignalLogger::default();
        engine.process(signal(10.0), &mut logger);
        assert_eq!(engine.history.len(), 1);
    }
}
