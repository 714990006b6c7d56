//! End-to-end detection scenarios driving the threat engine through
//! realistic signal sequences, the way an operator's SDR front end would
//! feed it.

use rf_ids_core::config::{BruteForceConfig, EngineConfig, HistoryConfig, JammingConfig, ReplayConfig};
use rf_ids_core::detectors::{BruteForceDetector, JammingDetector, ReplayDetector};
use rf_ids_core::history::SignalHistory;
use rf_ids_core::logging::SignalLogger;
use rf_ids_core::model::{Burst, DetectedSignal, Modulation, SignalFeatures, SignalType, ThreatKind, ThreatLevel};
use rf_ids_core::threat_engine::ThreatEngine;
use uuid::Uuid;

const KEYFOB_FREQ_HZ: f64 = 433_920_000.0;

fn keyfob_signal(ts: f64, power_spectrum: Vec<f64>) -> DetectedSignal {
    DetectedSignal {
        id: Uuid::new_v4(),
        timestamp: ts,
        center_freq_hz: KEYFOB_FREQ_HZ,
        features: SignalFeatures {
            power_spectrum_db: power_spectrum,
            bin_hz: 1.0,
            peak_freq_offset_hz: 0.0,
            bandwidth_hz: 5_000.0,
            snr_db: 22.0,
            rssi_db: -40.0,
            noise_floor_db: -62.0,
            bursts: vec![
                Burst { start_s: 0.0, end_s: 0.01 },
                Burst { start_s: 0.02, end_s: 0.03 },
                Burst { start_s: 0.04, end_s: 0.05 },
            ],
            freq_deviation_hz: 1_000.0,
            freq_std_hz: 1_200.0,
            spectral_flatness: 0.1,
            modulation: Modulation::Fsk,
        },
        signal_type: SignalType::KeyFob,
        confidence: 0.8,
    }
}

fn noisy_signal(ts: f64, noise_floor: f64, rssi: f64, flatness: f64) -> DetectedSignal {
    DetectedSignal {
        id: Uuid::new_v4(),
        timestamp: ts,
        center_freq_hz: KEYFOB_FREQ_HZ,
        features: SignalFeatures {
            power_spectrum_db: vec![noise_floor; 64],
            bin_hz: 1.0,
            peak_freq_offset_hz: 0.0,
            bandwidth_hz: 150_000.0,
            snr_db: rssi - noise_floor,
            rssi_db: rssi,
            noise_floor_db: noise_floor,
            bursts: vec![Burst { start_s: 0.0, end_s: 0.01 }],
            freq_deviation_hz: 0.0,
            freq_std_hz: 0.0,
            spectral_flatness: flatness,
            modulation: Modulation::Wideband,
        },
        signal_type: SignalType::Unknown,
        confidence: 0.0,
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
fn single_benign_keyfob_press_produces_no_verdicts() {
    let engine = engine();
    let mut logger = SignalLogger::default();

    let event = engine
        .process(keyfob_signal(5.0, vec![-40.0, -50.0, -60.0, -70.0]), &mut logger)
        .expect("keyfob press should still be emitted as benign");

    assert_eq!(event.threat_level, ThreatLevel::Benign);
    assert!(event.verdicts.is_empty());
}

#[test]
fn replayed_keyfob_press_escalates_to_malicious() {
    let engine = engine();
    let mut logger = SignalLogger::default();

    let power = vec![-40.0, -50.0, -60.0, -70.0];
    let original = engine.process(keyfob_signal(5.0, power.clone()), &mut logger).unwrap();
    assert_eq!(original.threat_level, ThreatLevel::Benign);

    let replay = engine.process(keyfob_signal(35.0, power), &mut logger).unwrap();
    assert_eq!(replay.threat_level, ThreatLevel::Malicious);
    assert_eq!(replay.verdicts.len(), 1);
    assert_eq!(replay.verdicts[0].kind, ThreatKind::Replay);
}

#[test]
fn continuous_broadband_noise_is_flagged_as_jamming() {
    let engine = engine();
    let mut logger = SignalLogger::default();

    for i in 0..25 {
        engine.process(noisy_signal(i as f64, -90.0, -85.0, 0.2), &mut logger);
    }

    let jammed = engine.process(noisy_signal(25.0, -70.0, -65.0, 0.8), &mut logger).unwrap();
    assert!(jammed.verdicts.iter().any(|v| v.kind == ThreatKind::Jamming));
    assert!(jammed.threat_level >= ThreatLevel::Suspicious);
}

#[test]
fn rapid_fire_keyfob_presses_trigger_brute_force() {
    let engine = engine();
    let mut logger = SignalLogger::default();

    let mut last = None;
    for i in 0..4 {
        last = engine.process(keyfob_signal(i as f64 * 0.25, vec![-20.0 - i as f64, -45.0, -55.0]), &mut logger);
    }

    let event = last.expect("should emit the final burst press");
    assert!(event.verdicts.iter().any(|v| v.kind == ThreatKind::BruteForce));
    assert_eq!(event.threat_level, ThreatLevel::Malicious);
}

#[test]
fn sparse_legitimate_presses_never_escalate() {
    // Spaced beyond every detector's longest window (replay's 300s max and
    // brute force's 300s long window), so identical presses still read as
    // independent, unrelated key-fob uses.
    let engine = engine();
    let mut logger = SignalLogger::default();

    for i in 0..5 {
        let event = engine
            .process(keyfob_signal(i as f64 * 350.0, vec![-41.0, -51.0, -61.0, -71.0]), &mut logger)
            .expect("each press should be emitted");
        assert_eq!(event.threat_level, ThreatLevel::Benign);
    }
}

#[test]
fn history_retains_only_signals_within_configured_bounds() {
    let history = SignalHistory::new(&HistoryConfig {
        max_size: 2,
        retention_s: 1_000.0,
    });
    let engine = ThreatEngine::new(
        ReplayDetector::new(ReplayConfig::default()),
        JammingDetector::new(JammingConfig::default(), 60.0),
        BruteForceDetector::new(BruteForceConfig::default()),
        history.clone(),
    );
    let mut logger = SignalLogger::default();

    for i in 0..5 {
        engine.process(keyfob_signal(i as f64, vec![-41.0, -51.0, -61.0]), &mut logger);
    }

    assert_eq!(history.len(), 2);
}
