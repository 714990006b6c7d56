//! Configuration types for the RF intrusion-detection pipeline.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JammingConfig {
    pub noise_elevation_db: f64,
    pub flatness_threshold: f64,
    pub spot_peak_ratio: f64,
    pub spot_min_power: f64,
    pub min_confidence: f64,
    pub baseline_window_s: f64,
}

impl Default for JammingConfig {
    fn default() -> Self {
        Self {
            noise_elevation_db: 10.0,
            flatness_threshold: 0.5,
            spot_peak_ratio: 10.0,
            spot_min_power: 2.0,
            min_confidence: 0.5,
            baseline_window_s: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceConfig {
    pub short_window_s: f64,
    pub short_threshold: usize,
    pub medium_window_s: f64,
    pub medium_threshold: usize,
    pub long_window_s: f64,
    pub long_threshold: usize,
    pub burst_window_s: f64,
    pub burst_threshold: usize,
    pub burst_cv_max: f64,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            short_window_s: 10.0,
            short_threshold: 5,
            medium_window_s: 60.0,
            medium_threshold: 10,
            long_window_s: 300.0,
            long_threshold: 25,
            burst_window_s: 1.0,
            burst_threshold: 4,
            burst_cv_max: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub similarity_threshold: f64,
    pub window_min_s: f64,
    pub window_max_s: f64,
    pub center_freq_tolerance_hz: f64,
    pub dtw_window: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.95,
            window_min_s: 1.0,
            window_max_s: 300.0,
            center_freq_tolerance_hz: 1_000.0,
            dtw_window: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub max_size: usize,
    pub retention_s: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            retention_s: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    pub queue_capacity: usize,
    pub shutdown_drain_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4_096,
            shutdown_drain_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    pub timeout_s: f64,
    pub proximity_confidence: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            timeout_s: 30.0,
            proximity_confidence: 0.95,
        }
    }
}

/// Top-level engine configuration. Every numeric knob in this tree has a
/// documented default and can be overridden by a TOML file loaded by the CLI
/// wrapper; the core itself never reads files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate_hz: f64,
    pub frame_duration_ms: f64,
    pub fft_size: usize,

    pub min_confidence: f64,
    pub min_snr_db: f64,

    pub keyfob_channels_hz: Vec<f64>,
    pub tpms_channels_hz: Vec<f64>,
    pub channel_tolerance_hz: f64,

    pub fft_worker_deadline_ms: u64,

    pub replay: ReplayConfig,
    pub jamming: JammingConfig,
    pub brute_force: BruteForceConfig,
    pub history: HistoryConfig,
    pub outbound: OutboundConfig,
    pub correlator: CorrelatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 2_048_000.0,
            frame_duration_ms: 100.0,
            fft_size: 65_536,
            min_confidence: 0.6,
            min_snr_db: 10.0,
            // Offsets (Hz) relative to the configured center frequency; not
            // physical constants, purely an operator-tunable allowlist.
            keyfob_channels_hz: vec![0.0, 433_920_000.0, 315_000_000.0],
            tpms_channels_hz: vec![0.0, 433_920_000.0, 315_000_000.0],
            channel_tolerance_hz: 100_000.0,
            fft_worker_deadline_ms: 100,
            replay: ReplayConfig::default(),
            jamming: JammingConfig::default(),
            brute_force: BruteForceConfig::default(),
            history: HistoryConfig::default(),
            outbound: OutboundConfig::default(),
            correlator: CorrelatorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate_hz * self.frame_duration_ms / 1_000.0).round() as usize
    }

    /// Validate invariants that the rest of the pipeline assumes hold.
    /// Called once at startup; a violation is always a `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidSampleRate {
                rate_hz: self.sample_rate_hz,
            });
        }
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::InvalidFftSize {
                size: self.fft_size,
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidThreshold {
                field: "min_confidence",
                value: self.min_confidence,
                valid_range: "[0.0, 1.0]",
            });
        }
        if self.history.max_size == 0 {
            return Err(ConfigError::InvalidHistorySize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn frame_samples_matches_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.frame_samples(), 204_800);
    }

    #[test]
    fn rejects_non_power_of_two_fft_size() {
        let mut cfg = EngineConfig::default();
        cfg.fft_size = 1_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidFftSize { size: 1_000 })
        ));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let mut cfg = EngineConfig::default();
        cfg.sample_rate_hz = 0.0;
        assert!(cfg.validate().is_err());
    }
}
