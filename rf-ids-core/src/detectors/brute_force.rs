//! Detects high-rate repeated transmissions aimed at guessing a code space.

use crate::config::BruteForceConfig;
use crate::dsp_stats::coefficient_of_variation;
use crate::history::SignalHistory;
use crate::model::{BruteForceTier, DetectedSignal, Evidence, SignalType, ThreatKind, ThreatVerdict};

use super::Detector;

/// Same tolerance the analyzer uses for its channel allowlist matching;
/// brute-force counting bands by the same notion of "same frequency".
const FREQ_TOLERANCE_HZ: f64 = 100_000.0;

pub struct BruteForceDetector {
    config: BruteForceConfig,
}

impl BruteForceDetector {
    pub fn new(config: BruteForceConfig) -> Self {
        Self { config }
    }
}

impl Detector for BruteForceDetector {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn analyze(&self, current: &DetectedSignal, history: &SignalHistory) -> Option<ThreatVerdict> {
        if current.signal_type == SignalType::Unknown {
            return None;
        }

        let same_band = |window_s: f64| -> Vec<DetectedSignal> {
            history
                .by_type_and_freq(
                    current.signal_type,
                    current.center_freq_hz,
                    FREQ_TOLERANCE_HZ,
                    current.timestamp,
                    window_s,
                )
                .into_iter()
                .filter(|s| s.id != current.id)
                .collect()
        };

        let short = same_band(self.config.short_window_s).len() + 1;
        let medium = same_band(self.config.medium_window_s).len() + 1;
        let long = same_band(self.config.long_window_s).len() + 1;
        let burst_signals = same_band(self.config.burst_window_s);
        let burst_count = burst_signals.len() + 1;

        let inter_arrival_cv = {
            let mut timestamps: Vec<f64> = burst_signals.iter().map(|s| s.timestamp).collect();
            timestamps.push(current.timestamp);
            timestamps.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
            coefficient_of_variation(&intervals)
        };

        let burst_triggered = burst_count >= self.config.burst_threshold
            && inter_arrival_cv.map(|cv| cv <= self.config.burst_cv_max).unwrap_or(false);

        let (tier, count, threshold) = if burst_triggered {
            (BruteForceTier::Critical, burst_count, self.config.burst_threshold)
        } else if long >= self.config.long_threshold {
            (BruteForceTier::High, long, self.config.long_threshold)
        } else if medium >= self.config.medium_threshold {
            (BruteForceTier::Moderate, medium, self.config.medium_threshold)
        } else if short >= self.config.short_threshold {
            (BruteForceTier::Suspicious, short, self.config.short_threshold)
        } else {
            return None;
        };

        let confidence = (((count - threshold) as f64) / threshold as f64).clamp(0.0, 1.0) * 0.4 + 0.6;

        Some(ThreatVerdict {
            kind: ThreatKind::BruteForce,
            confidence: confidence.clamp(0.6, 1.0),
            evidence: Evidence::BruteForce {
                tier,
                short_window_count: short,
                medium_window_count: medium,
                long_window_count: long,
                burst_window_count: burst_count,
                inter_arrival_cv,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::model::{Modulation, SignalFeatures};
    use uuid::Uuid;

    fn signal(ts: f64, signal_type: SignalType) -> DetectedSignal {
        DetectedSignal {
            id: Uuid::new_v4(),
            timestamp: ts,
            center_freq_hz: 433_920_000.0,
            features: SignalFeatures {
                power_spectrum_db: vec![],
                bin_hz: 1.0,
                peak_freq_offset_hz: 0.0,
                bandwidth_hz: 0.0,
                snr_db: 20.0,
                rssi_db: -40.0,
                noise_floor_db: -60.0,
                bursts: vec![],
                freq_deviation_hz: 0.0,
                freq_std_hz: 0.0,
                spectral_flatness: 0.1,
                modulation: Modulation::Fsk,
            },
            signal_type,
            confidence: 0.9,
        }
    }

    #[test]
    fn unknown_signal_type_is_ignored() {
        let history = SignalHistory::new(&HistoryConfig::default());
        let detector = BruteForceDetector::new(BruteForceConfig::default());
        let current = signal(0.0, SignalType::Unknown);
        assert!(detector.analyze(&current, &history).is_none());
    }

    #[test]
    fn rapid_identical_bursts_trigger_critical_tier() {
        let history = SignalHistory::new(&HistoryConfig::default());
        for i in 0..3 {
            history.insert(signal(i as f64 * 0.25, SignalType::KeyFob));
        }
        let current = signal(0.75, SignalType::KeyFob);
        let detector = BruteForceDetector::new(BruteForceConfig::default());
        let verdict = detector.analyze(&current, &history).expect("should flag brute force");
        assert!(matches!(
            verdict.evidence,
            Evidence::BruteForce { tier: BruteForceTier::Critical, .. }
        ));
    }

    #[test]
    fn moderate_rate_over_medium_window_triggers_suspicious_or_higher() {
        let history = SignalHistory::new(&HistoryConfig::default());
        for i in 0..4 {
            history.insert(signal(i as f64 * 2.0, SignalType::Tpms));
        }
        let current = signal(8.0, SignalType::Tpms);
        let detector = BruteForceDetector::new(BruteForceConfig::default());
        let verdict = detector.analyze(&current, &history).expect("should flag rate");
        assert!(verdict.confidence >= 0.6);
    }

    #[test]
    fn sparse_signals_do_not_trigger() {
        let history = SignalHistory::new(&HistoryConfig::default());
        history.insert(signal(0.0, SignalType::KeyFob));
        let current = signal(100.0, SignalType::KeyFob);
        let detector = BruteForceDetector::new(BruteForceConfig::default());
        assert!(detector.analyze(&current, &history).is_none());
    }
}
