//! Envelope-threshold burst extraction.

use num_complex::Complex64;

use crate::model::Burst;

const MIN_BURST_DURATION_S: f64 = 0.001;
const THRESHOLD_ABOVE_NOISE_FLOOR_DB: f64 = 10.0;

/// Find contiguous runs of samples whose instantaneous envelope power
/// exceeds `noise_floor_db + 10 dB`, each at least 1 ms long.
pub fn extract_bursts(samples: &[Complex64], sample_rate_hz: f64, noise_floor_db: f64) -> Vec<Burst> {
    if samples.is_empty() || sample_rate_hz <= 0.0 {
        return Vec::new();
    }

    let threshold_db = noise_floor_db + THRESHOLD_ABOVE_NOISE_FLOOR_DB;
    let min_samples = (MIN_BURST_DURATION_S * sample_rate_hz).ceil() as usize;
    let sample_period_s = 1.0 / sample_rate_hz;

    let above: Vec<bool> = samples
        .iter()
        .map(|s| envelope_db(*s) >= threshold_db)
        .collect();

    let mut bursts = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &is_above) in above.iter().enumerate() {
        match (is_above, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                push_if_long_enough(&mut bursts, start, i, min_samples, sample_period_s);
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        push_if_long_enough(&mut bursts, start, above.len(), min_samples, sample_period_s);
    }

    bursts
}

fn push_if_long_enough(
    bursts: &mut Vec<Burst>,
    start: usize,
    end_exclusive: usize,
    min_samples: usize,
    sample_period_s: f64,
) {
    if end_exclusive - start >= min_samples.max(1) {
        bursts.push(Burst {
            start_s: start as f64 * sample_period_s,
            end_s: end_exclusive as f64 * sample_period_s,
        });
    }
}

fn envelope_db(sample: Complex64) -> f64 {
    let power = sample.norm_sqr();
    if power > 1e-14 {
        10.0 * power.log10()
    } else {
        -140.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst_samples(sample_rate_hz: f64) -> Vec<Complex64> {
        // 2 ms of silence, 2 ms of a strong tone, 2 ms of silence.
        let quiet = (sample_rate_hz * 0.002) as usize;
        let loud = (sample_rate_hz * 0.002) as usize;
        let mut samples = vec![Complex64::new(1e-6, 0.0); quiet];
        samples.extend(vec![Complex64::new(1.0, 0.0); loud]);
        samples.extend(vec![Complex64::new(1e-6, 0.0); quiet]);
        samples
    }

    #[test]
    fn detects_a_single_burst() {
        let sample_rate = 1_000_000.0;
        let samples = burst_samples(sample_rate);
        let bursts = extract_bursts(&samples, sample_rate, -80.0);
        assert_eq!(bursts.len(), 1);
        assert!(bursts[0].duration_s() > 0.0015);
    }

    #[test]
    fn empty_input_yields_no_bursts() {
        assert!(extract_bursts(&[], 1_000_000.0, -80.0).is_empty());
    }

    #[test]
    fn short_spikes_below_min_duration_are_ignored() {
        let sample_rate = 1_000_000.0;
        let mut samples = vec![Complex64::new(1e-6, 0.0); 100];
        samples[50] = Complex64::new(1.0, 0.0); // single-sample spike
        let bursts = extract_bursts(&samples, sample_rate, -80.0);
        assert!(bursts.is_empty());
    }
}
