//! Per-frame feature extraction and automotive-protocol template matching.

use crate::config::EngineConfig;
use crate::dsp_stats::{coefficient_of_variation, mean};
use crate::errors::FrameError;
use crate::history::SignalHistory;
use crate::model::{Burst, DetectedSignal, IqFrame, Modulation, SignalFeatures, SignalType};
use crate::signal_processing::{extract_bursts, instantaneous_frequency, Spectrum};
use uuid::Uuid;

const ASK_ENVELOPE_VARIANCE_THRESHOLD: f64 = 0.05;
const FSK_FREQ_STD_THRESHOLD_HZ: f64 = 1_000.0;
const FSK_FREQ_RANGE_THRESHOLD_HZ: f64 = 5_000.0;
const WIDEBAND_BANDWIDTH_THRESHOLD_HZ: f64 = 100_000.0;
const WIDEBAND_SNR_THRESHOLD_DB: f64 = 3.0;
const TPMS_MIN_GAP_S: f64 = 30.0;

#[derive(Clone)]
pub struct SignalAnalyzer {
    config: EngineConfig,
}

impl SignalAnalyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Extract features from `frame` and, if a template matches (or the
    /// frame is strong enough to be worth keeping as `Unknown`), return a
    /// `DetectedSignal`. Returns `Ok(None)` for frames that don't clear the
    /// bar for anything downstream needs.
    pub fn analyze(
        &self,
        frame: &IqFrame,
        history: &SignalHistory,
    ) -> Result<Option<DetectedSignal>, FrameError> {
        if frame.samples.is_empty() {
            return Err(FrameError::EmptyFrame);
        }
        for (i, s) in frame.samples.iter().enumerate() {
            if !s.re.is_finite() || !s.im.is_finite() {
                return Err(FrameError::NonFiniteSample { index: i });
            }
        }

        let spectrum = match Spectrum::analyze(&frame.samples, frame.sample_rate_hz, self.config.fft_size) {
            Some(s) => s,
            None => return Ok(None),
        };

        let bursts = extract_bursts(&frame.samples, frame.sample_rate_hz, spectrum.noise_floor_db);
        let inst_freq = instantaneous_frequency(&frame.samples, frame.sample_rate_hz);
        let envelope_variance = envelope_variance(&frame.samples);

        let modulation = classify_modulation(&spectrum, &inst_freq, envelope_variance);

        let features = SignalFeatures {
            power_spectrum_db: spectrum.power_db.clone(),
            bin_hz: spectrum.bin_hz,
            peak_freq_offset_hz: spectrum.peak_freq_offset_hz,
            bandwidth_hz: spectrum.bandwidth_hz,
            snr_db: spectrum.snr_db,
            rssi_db: spectrum.rssi_db,
            noise_floor_db: spectrum.noise_floor_db,
            bursts,
            freq_deviation_hz: inst_freq.mean_hz,
            freq_std_hz: inst_freq.std_hz,
            spectral_flatness: spectrum.spectral_flatness,
            modulation,
        };

        let keyfob_score = score_keyfob(&self.config, &features);
        let tpms_score = score_tpms(&self.config, frame.center_freq_hz, &features, history, frame.timestamp);

        let (signal_type, confidence) = if keyfob_score >= tpms_score && keyfob_score >= self.config.min_confidence {
            (SignalType::KeyFob, keyfob_score)
        } else if tpms_score >= self.config.min_confidence {
            (SignalType::Tpms, tpms_score)
        } else if features.snr_db >= self.config.min_snr_db {
            (SignalType::Unknown, 0.0)
        } else {
            return Ok(None);
        };

        Ok(Some(DetectedSignal {
            id: Uuid::new_v4(),
            timestamp: frame.timestamp,
            center_freq_hz: frame.center_freq_hz,
            features,
            signal_type,
            confidence,
        }))
    }
}

fn envelope_variance(samples: &[num_complex::Complex64]) -> f64 {
    let envelopes: Vec<f64> = samples.iter().map(|s| s.norm()).collect();
    let m = mean(&envelopes);
    mean(&envelopes.iter().map(|e| (e - m).powi(2)).collect::<Vec<_>>())
}

fn classify_modulation(spectrum: &Spectrum, inst_freq: &crate::signal_processing::instantaneous_freq::InstantaneousFrequency, envelope_variance: f64) -> Modulation {
    if inst_freq.std_hz > FSK_FREQ_STD_THRESHOLD_HZ && inst_freq.range_hz > FSK_FREQ_RANGE_THRESHOLD_HZ {
        return Modulation::Fsk;
    }
    if inst_freq.std_hz <= FSK_FREQ_STD_THRESHOLD_HZ && envelope_variance > ASK_ENVELOPE_VARIANCE_THRESHOLD {
        return Modulation::Ook;
    }
    if spectrum.bandwidth_hz > WIDEBAND_BANDWIDTH_THRESHOLD_HZ && spectrum.snr_db < WIDEBAND_SNR_THRESHOLD_DB {
        return Modulation::Wideband;
    }
    Modulation::Unknown
}

fn is_fsk_family(modulation: Modulation) -> bool {
    matches!(modulation, Modulation::Fsk | Modulation::Gfsk)
}

/// True if `center_freq_hz` falls within `tolerance_hz` of any entry in
/// `channels`, or `channels` contains a `0.0` wildcard entry.
fn channel_allowed(center_freq_hz: f64, channels: &[f64], tolerance_hz: f64) -> bool {
    channels
        .iter()
        .any(|&c| c == 0.0 || (center_freq_hz - c).abs() <= tolerance_hz)
}

fn score_keyfob(config: &EngineConfig, features: &SignalFeatures) -> f64 {
    if !is_fsk_family(features.modulation) || features.snr_db < config.min_snr_db {
        return 0.0;
    }
    let burst_count = features.bursts.len();
    if !(3..=8).contains(&burst_count) {
        return 0.0;
    }

    let modulation_fit = 1.0;
    let burst_count_fit = 1.0 - ((burst_count as f64 - 5.0).abs() / 5.0).clamp(0.0, 1.0);
    let regularity = inter_burst_regularity(features);
    let channel_fit = if channel_allowed(features.peak_freq_offset_hz, &config.keyfob_channels_hz, config.channel_tolerance_hz) {
        1.0
    } else {
        0.0
    };
    let quality = (features.snr_db / 30.0).clamp(0.0, 1.0);

    0.30 * modulation_fit + 0.25 * burst_count_fit + 0.20 * regularity + 0.15 * channel_fit + 0.10 * quality
}

fn score_tpms(
    config: &EngineConfig,
    center_freq_hz: f64,
    features: &SignalFeatures,
    history: &SignalHistory,
    now: f64,
) -> f64 {
    if !is_fsk_family(features.modulation) || features.snr_db < config.min_snr_db {
        return 0.0;
    }
    let burst_count = features.bursts.len();
    if !(1..=3).contains(&burst_count) {
        return 0.0;
    }
    if !features
        .bursts
        .iter()
        .all(|b| b.duration_s() >= 0.005 && b.duration_s() <= 0.015)
    {
        return 0.0;
    }

    let modulation_fit = 1.0;
    let burst_count_fit = 1.0;

    let last_tpms = history
        .by_type_and_freq(SignalType::Tpms, center_freq_hz, config.channel_tolerance_hz, now, f64::MAX)
        .into_iter()
        .last();
    let gap_fit = match last_tpms {
        Some(prev) if now - prev.timestamp < TPMS_MIN_GAP_S => 0.0,
        _ => 1.0,
    };

    let channel_fit = if channel_allowed(features.peak_freq_offset_hz, &config.tpms_channels_hz, config.channel_tolerance_hz) {
        1.0
    } else {
        0.0
    };
    let quality = (features.snr_db / 30.0).clamp(0.0, 1.0);

    0.30 * modulation_fit + 0.25 * burst_count_fit + 0.20 * gap_fit + 0.15 * channel_fit + 0.10 * quality
}

/// `1 - sigma/mu` of inter-burst gaps, clamped to `[0, 1]`; 1.0 when there
/// are too few bursts to compute a ratio.
fn inter_burst_regularity(features: &SignalFeatures) -> f64 {
    let gaps = features.inter_burst_gaps_s();
    match coefficient_of_variation(&gaps) {
        Some(cv) => (1.0 - cv).clamp(0.0, 1.0),
        None => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    fn fsk_frame(sample_rate: f64, center_freq_hz: f64) -> IqFrame {
        // Alternate between two tones to produce FSK-like frequency spread,
        // with quiet gaps to produce distinct bursts.
        let mut samples = Vec::new();
        let tone_len = (sample_rate * 0.010) as usize;
        let gap_len = (sample_rate * 0.010) as usize;
        let mut t = 0.0;
        let dt = 1.0 / sample_rate;
        for burst in 0..5 {
            let freq = if burst % 2 == 0 { 20_000.0 } else { 15_000.0 };
            for _ in 0..tone_len {
                samples.push(Complex64::new((2.0 * PI * freq * t).cos(), (2.0 * PI * freq * t).sin()));
                t += dt;
            }
            for _ in 0..gap_len {
                samples.push(Complex64::new(1e-6, 0.0));
                t += dt;
            }
        }
        IqFrame {
            timestamp: 1.0,
            sample_rate_hz: sample_rate,
            center_freq_hz,
            samples,
        }
    }

    #[test]
    fn rejects_empty_frame() {
        let analyzer = SignalAnalyzer::new(EngineConfig::default());
        let history = SignalHistory::new(&HistoryConfig::default());
        let frame = IqFrame {
            timestamp: 0.0,
            sample_rate_hz: 1_000.0,
            center_freq_hz: 0.0,
            samples: vec![],
        };
        assert!(matches!(analyzer.analyze(&frame, &history), Err(FrameError::EmptyFrame)));
    }

    #[test]
    fn rejects_non_finite_samples() {
        let analyzer = SignalAnalyzer::new(EngineConfig::default());
        let history = SignalHistory::new(&HistoryConfig::default());
        let frame = IqFrame {
            timestamp: 0.0,
            sample_rate_hz: 1_000.0,
            center_freq_hz: 0.0,
            samples: vec![Complex64::new(f64::NAN, 0.0); 512],
        };
        assert!(matches!(
            analyzer.analyze(&frame, &history),
            Err(FrameError::NonFiniteSample { index: 0 })
        ));
    }

    #[test]
    fn fsk_burst_pattern_is_plausible_keyfob_candidate() {
        let mut config = EngineConfig::default();
        config.keyfob_channels_hz = vec![0.0];
        let analyzer = SignalAnalyzer::new(config);
        let history = SignalHistory::new(&HistoryConfig::default());
        let frame = fsk_frame(1_000_000.0, 433_920_000.0);
        let result = analyzer.analyze(&frame, &history).unwrap();
        assert!(result.is_some());
        let signal = result.unwrap();
        assert_eq!(signal.features.modulation, Modulation::Fsk);
    }
}
