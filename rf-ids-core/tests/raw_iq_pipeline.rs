//! Drives raw IQ bytes through the full demux -> analyzer -> threat engine
//! chain, the way the live pipeline thread does, rather than hand-building
//! `DetectedSignal`s. This is what actually exercises the FFT scaling,
//! envelope thresholding, and burst extraction rather than assuming their
//! output.

use std::f64::consts::PI;

use num_complex::Complex64;
use rf_ids_core::analyzer::SignalAnalyzer;
use rf_ids_core::config::{EngineConfig, HistoryConfig};
use rf_ids_core::demux::{Clock, Demux};
use rf_ids_core::detectors::{BruteForceDetector, JammingDetector, ReplayDetector};
use rf_ids_core::history::SignalHistory;
use rf_ids_core::logging::SignalLogger;
use rf_ids_core::model::{Modulation, SignalType, ThreatKind, ThreatLevel};
use rf_ids_core::threat_engine::ThreatEngine;

const CENTER_FREQ_HZ: f64 = 433_920_000.0;
const SAMPLE_RATE_HZ: f64 = 1_000_000.0;

struct FixedClock(f64);
impl Clock for FixedClock {
    fn now_s(&self) -> f64 {
        self.0
    }
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sample_rate_hz = SAMPLE_RATE_HZ;
    config.frame_duration_ms = 100.0;
    config.fft_size = 65_536;
    config
}

/// Five alternating-frequency tone bursts separated by quiet gaps, encoded as
/// raw interleaved IQ bytes the way an SDR front end would hand them to the
/// demux. Mirrors the classic key-fob rolling-code burst cadence.
fn keyfob_burst_bytes(sample_rate_hz: f64) -> Vec<u8> {
    let tone_len = (sample_rate_hz * 0.010) as usize;
    let gap_len = (sample_rate_hz * 0.010) as usize;
    let mut bytes = Vec::with_capacity((tone_len + gap_len) * 5 * 2);
    let dt = 1.0 / sample_rate_hz;
    let mut t = 0.0;

    for burst in 0..5 {
        let freq = if burst % 2 == 0 { 20_000.0 } else { 15_000.0 };
        for _ in 0..tone_len {
            push_sample(&mut bytes, Complex64::new((2.0 * PI * freq * t).cos(), (2.0 * PI * freq * t).sin()));
            t += dt;
        }
        for _ in 0..gap_len {
            push_sample(&mut bytes, Complex64::new(1e-6, 0.0));
            t += dt;
        }
    }
    bytes
}

fn push_sample(bytes: &mut Vec<u8>, sample: Complex64) {
    bytes.push(to_byte(sample.re));
    bytes.push(to_byte(sample.im));
}

fn to_byte(value: f64) -> u8 {
    (value * 127.5 + 127.5).round().clamp(0.0, 255.0) as u8
}

/// Pushes `bytes` through a demux fixed at `timestamp_s` and returns the one
/// frame it produces, sized to exactly `config.frame_samples()`.
fn demux_single_frame(config: &EngineConfig, bytes: &[u8], timestamp_s: f64) -> rf_ids_core::model::IqFrame {
    let mut demux = Demux::with_clock(
        config.frame_samples(),
        config.sample_rate_hz,
        CENTER_FREQ_HZ,
        Box::new(FixedClock(timestamp_s)),
    );
    let mut frames = demux.push_bytes(bytes);
    assert_eq!(frames.len(), 1, "test fixture should produce exactly one full frame");
    frames.remove(0)
}

#[test]
fn raw_keyfob_bursts_demux_and_classify_as_keyfob() {
    let config = test_config();
    let bytes = keyfob_burst_bytes(config.sample_rate_hz);
    assert_eq!(bytes.len(), config.frame_samples() * 2, "fixture must exactly fill one frame");

    let frame = demux_single_frame(&config, &bytes, 5.0);
    let analyzer = SignalAnalyzer::new(config.clone());
    let history = SignalHistory::new(&HistoryConfig::default());

    let signal = analyzer
        .analyze(&frame, &history)
        .expect("analysis should not error")
        .expect("a strong 5-burst FSK pattern should clear the detection bar");

    assert_eq!(signal.signal_type, SignalType::KeyFob);
    assert_eq!(signal.features.modulation, Modulation::Fsk);
    assert_eq!(signal.features.bursts.len(), 5);
}

#[test]
fn replaying_the_same_raw_bursts_escalates_to_malicious() {
    let config = test_config();
    let bytes = keyfob_burst_bytes(config.sample_rate_hz);
    let analyzer = SignalAnalyzer::new(config.clone());

    let engine = ThreatEngine::new(
        ReplayDetector::new(config.replay.clone()),
        JammingDetector::new(config.jamming.clone(), config.jamming.baseline_window_s),
        BruteForceDetector::new(config.brute_force.clone()),
        SignalHistory::new(&config.history),
    );
    let mut logger = SignalLogger::default();

    let first_frame = demux_single_frame(&config, &bytes, 5.0);
    let first_signal = analyzer
        .analyze(&first_frame, &SignalHistory::new(&HistoryConfig::default()))
        .unwrap()
        .unwrap();
    let first_event = engine.process(first_signal, &mut logger).expect("should emit");
    assert_eq!(first_event.threat_level, ThreatLevel::Benign);

    let second_frame = demux_single_frame(&config, &bytes, 35.0);
    let second_signal = analyzer
        .analyze(&second_frame, &SignalHistory::new(&HistoryConfig::default()))
        .unwrap()
        .unwrap();
    let second_event = engine.process(second_signal, &mut logger).expect("should emit");

    assert_eq!(second_event.threat_level, ThreatLevel::Malicious);
    assert!(second_event.verdicts.iter().any(|v| v.kind == ThreatKind::Replay));
}
