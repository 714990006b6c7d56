//! Detects broadband/pattern interference against a same-frequency noise
//! floor baseline.

use crate::config::JammingConfig;
use crate::dsp_stats::{coefficient_of_variation, median, std_dev};
use crate::history::SignalHistory;
use crate::model::{DetectedSignal, Evidence, JammingPattern, ThreatKind, ThreatVerdict};

use super::Detector;

const SWEEP_MIN_FRAMES: usize = 8;
const SWEEP_DIRECTION_CONSISTENCY: f64 = 0.6;
const SWEEP_MIN_MEAN_POWER_DB: f64 = -40.0;
const CONTINUOUS_MIN_DURATION_S: f64 = 2.0;
const CONTINUOUS_MAX_VARIANCE_DB2: f64 = 25.0;
const PULSE_MIN_PEAKS: usize = 4;
const PULSE_MAX_INTERVAL_CV: f64 = 0.2;
const PULSE_MAX_HEIGHT_SPREAD_DB: f64 = 3.0;
/// Matches the frequency tolerance the analyzer uses for channel matching;
/// jamming looks at "same center frequency" history the way the replay and
/// brute-force detectors do.
const FREQ_TOLERANCE_HZ: f64 = 100_000.0;

pub struct JammingDetector {
    config: JammingConfig,
    baseline_window_s: f64,
}

impl JammingDetector {
    pub fn new(config: JammingConfig, baseline_window_s: f64) -> Self {
        Self {
            config,
            baseline_window_s,
        }
    }
}

impl Detector for JammingDetector {
    fn name(&self) -> &'static str {
        "jamming"
    }

    fn analyze(&self, current: &DetectedSignal, history: &SignalHistory) -> Option<ThreatVerdict> {
        let recent = history.recent(current.timestamp, self.baseline_window_s);
        let same_freq: Vec<_> = recent
            .iter()
            .filter(|s| (s.center_freq_hz - current.center_freq_hz).abs() <= FREQ_TOLERANCE_HZ)
            .collect();

        let baseline = if same_freq.is_empty() {
            current.features.noise_floor_db
        } else {
            median(&same_freq.iter().map(|s| s.features.noise_floor_db).collect::<Vec<_>>())
        };
        let elevation = current.features.noise_floor_db - baseline;
        let elevated = elevation >= self.config.noise_elevation_db;
        let broadband = current.features.spectral_flatness > self.config.flatness_threshold;

        let pattern = identify_pattern(current, &same_freq, &self.config);

        let confidence = 0.3 * indicator(elevated) + 0.2 * indicator(broadband) + 0.5 * indicator(pattern.is_some());

        if confidence < self.config.min_confidence {
            return None;
        }

        let pattern = pattern.unwrap_or(JammingPattern::Spot);

        Some(ThreatVerdict {
            kind: ThreatKind::Jamming,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Evidence::Jamming {
                noise_elevation_db: elevation,
                spectral_flatness: current.features.spectral_flatness,
                pattern,
                center_freq_hz: current.center_freq_hz,
                snr_degradation_db: (30.0 - current.features.snr_db).max(0.0),
            },
        })
    }
}

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Checked in priority order: continuous, pulse, sweep, spot. The first
/// criterion that clears its own threshold wins, per the mutually-exclusive
/// pattern classification the jamming detector reports.
fn identify_pattern(
    current: &DetectedSignal,
    same_freq: &[&DetectedSignal],
    config: &JammingConfig,
) -> Option<JammingPattern> {
    let mut timeline: Vec<&DetectedSignal> = same_freq.to_vec();
    timeline.push(current);
    timeline.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

    if is_continuous(&timeline, config) {
        return Some(JammingPattern::Continuous);
    }
    if is_pulse(&timeline, config) {
        return Some(JammingPattern::Pulse);
    }
    if is_sweep(&timeline) {
        return Some(JammingPattern::Sweep);
    }
    if is_spot(current, config) {
        return Some(JammingPattern::Spot);
    }
    None
}

fn is_continuous(timeline: &[&DetectedSignal], config: &JammingConfig) -> bool {
    if timeline.len() < 2 {
        return false;
    }
    let span = timeline.last().unwrap().timestamp - timeline.first().unwrap().timestamp;
    if span < CONTINUOUS_MIN_DURATION_S {
        return false;
    }
    let rssi: Vec<f64> = timeline.iter().map(|s| s.features.rssi_db).collect();
    let variance = std_dev(&rssi).powi(2);
    let elevated = timeline
        .iter()
        .all(|s| s.features.noise_floor_db - median(&rssi) >= config.noise_elevation_db - 20.0);
    variance < CONTINUOUS_MAX_VARIANCE_DB2 && elevated
}

fn is_pulse(timeline: &[&DetectedSignal], config: &JammingConfig) -> bool {
    let threshold = median(&timeline.iter().map(|s| s.features.noise_floor_db).collect::<Vec<_>>())
        + config.noise_elevation_db;
    let peaks: Vec<&DetectedSignal> = timeline
        .iter()
        .copied()
        .filter(|s| s.features.rssi_db >= threshold)
        .collect();

    if peaks.len() < PULSE_MIN_PEAKS {
        return false;
    }

    let intervals: Vec<f64> = peaks.windows(2).map(|w| w[1].timestamp - w[0].timestamp).collect();
    let cv = coefficient_of_variation(&intervals).unwrap_or(f64::INFINITY);

    let heights: Vec<f64> = peaks.iter().map(|s| s.features.rssi_db).collect();
    let spread = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        - heights.iter().cloned().fold(f64::INFINITY, f64::min);

    cv <= PULSE_MAX_INTERVAL_CV && spread <= PULSE_MAX_HEIGHT_SPREAD_DB
}

fn is_sweep(timeline: &[&DetectedSignal]) -> bool {
    if timeline.len() < SWEEP_MIN_FRAMES {
        return false;
    }
    let offsets: Vec<f64> = timeline.iter().map(|s| s.features.peak_freq_offset_hz).collect();
    let steps = offsets.len() - 1;
    let increasing = offsets.windows(2).filter(|w| w[1] > w[0]).count();
    let decreasing = offsets.windows(2).filter(|w| w[1] < w[0]).count();
    let consistency = (increasing.max(decreasing) as f64) / steps as f64;

    let mean_power = crate::dsp_stats::mean(&timeline.iter().map(|s| s.features.rssi_db).collect::<Vec<_>>());

    consistency >= SWEEP_DIRECTION_CONSISTENCY && mean_power > SWEEP_MIN_MEAN_POWER_DB
}

fn is_spot(current: &DetectedSignal, config: &JammingConfig) -> bool {
    let spectrum = &current.features.power_spectrum_db;
    if spectrum.is_empty() {
        return false;
    }
    let max_db = spectrum.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let linear: Vec<f64> = spectrum.iter().map(|db| 10f64.powf(db / 10.0)).collect();
    let max_linear = linear.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean_linear = crate::dsp_stats::mean(&linear);
    if mean_linear <= 0.0 {
        return false;
    }
    let ratio = max_linear / mean_linear;
    ratio > config.spot_peak_ratio && max_db > config.spot_min_power
}
