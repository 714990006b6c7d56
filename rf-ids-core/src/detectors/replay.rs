//! Detects retransmission of a previously observed legitimate signal.

use crate::config::ReplayConfig;
use crate::dsp_stats::{dtw_similarity, pearson_correlation};
use crate::history::SignalHistory;
use crate::model::{DetectedSignal, Evidence, ThreatKind, ThreatVerdict};

use super::Detector;

pub struct ReplayDetector {
    config: ReplayConfig,
}

impl ReplayDetector {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }
}

impl Detector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn analyze(&self, current: &DetectedSignal, history: &SignalHistory) -> Option<ThreatVerdict> {
        let candidates = history.by_type_and_freq(
            current.signal_type,
            current.center_freq_hz,
            self.config.center_freq_tolerance_hz,
            current.timestamp,
            self.config.window_max_s,
        );

        let mut best: Option<(f64, &DetectedSignal)> = None;

        for candidate in &candidates {
            if candidate.id == current.id {
                continue;
            }
            let delta = current.timestamp - candidate.timestamp;
            if !(self.config.window_min_s..=self.config.window_max_s).contains(&delta) {
                continue;
            }

            let sim = similarity(current, candidate, self.config.dtw_window);
            let is_better = match best {
                None => true,
                Some((best_sim, best_candidate)) => {
                    sim > best_sim || (sim == best_sim && candidate.timestamp > best_candidate.timestamp)
                }
            };
            if is_better {
                best = Some((sim, candidate));
            }
        }

        let (sim, candidate) = best?;
        if sim < self.config.similarity_threshold {
            return None;
        }

        let breakdown = similarity_breakdown(current, candidate, self.config.dtw_window);

        Some(ThreatVerdict {
            kind: ThreatKind::Replay,
            confidence: sim,
            evidence: Evidence::Replay {
                original_event_id: candidate.id,
                original_timestamp: candidate.timestamp,
                replay_timestamp: current.timestamp,
                time_delta_s: current.timestamp - candidate.timestamp,
                spectrum_similarity: breakdown.0,
                burst_similarity: breakdown.1,
                freq_deviation_similarity: breakdown.2,
                bandwidth_similarity: breakdown.3,
            },
        })
    }
}

fn similarity(a: &DetectedSignal, b: &DetectedSignal, dtw_window: usize) -> f64 {
    let (spectrum_sim, burst_sim, freq_sim, bw_sim) = similarity_breakdown(a, b, dtw_window);
    0.40 * spectrum_sim + 0.30 * burst_sim + 0.20 * freq_sim + 0.10 * bw_sim
}

fn similarity_breakdown(a: &DetectedSignal, b: &DetectedSignal, dtw_window: usize) -> (f64, f64, f64, f64) {
    let spectrum_sim = pearson_correlation(&a.features.power_spectrum_db, &b.features.power_spectrum_db)
        .max(0.0);

    let a_bursts: Vec<f64> = a.features.bursts.iter().map(|burst| burst.start_s).collect();
    let b_bursts: Vec<f64> = b.features.bursts.iter().map(|burst| burst.start_s).collect();
    let burst_sim = dtw_similarity(&a_bursts, &b_bursts, dtw_window);

    let freq_sim = (1.0 - (a.features.freq_deviation_hz - b.features.freq_deviation_hz).abs() / 5_000.0).max(0.0);

    let max_bw = a.features.bandwidth_hz.max(b.features.bandwidth_hz);
    let bw_sim = if max_bw <= 0.0 {
        1.0
    } else {
        (1.0 - (a.features.bandwidth_hz - b.features.bandwidth_hz).abs() / max_bw).max(0.0)
    };

    (spectrum_sim, burst_sim, freq_sim, bw_sim)
}
