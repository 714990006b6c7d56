//! Windowed FFT spectral analysis of one IQ frame.

use num_complex::Complex64;
use rustfft::{num_complex::Complex32, FftPlanner};

const MIN_SAMPLES_FOR_SPECTRUM: usize = 256;
const POWER_FLOOR_DB: f64 = -140.0;

/// Power spectrum and derived quantities for a single frame.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Power spectrum in dB, DC-centered (bin 0 = most negative frequency).
    pub power_db: Vec<f64>,
    pub bin_hz: f64,
    pub noise_floor_db: f64,
    pub rssi_db: f64,
    pub snr_db: f64,
    pub peak_freq_offset_hz: f64,
    pub bandwidth_hz: f64,
    pub spectral_flatness: f64,
}

impl Spectrum {
    /// Compute the windowed power spectrum of `samples`. `fft_size_cap`
    /// bounds the FFT length (must be a power of two); the actual length
    /// used is the largest power of two that does not exceed
    /// `samples.len()`, capped by `fft_size_cap`.
    pub fn analyze(samples: &[Complex64], sample_rate_hz: f64, fft_size_cap: usize) -> Option<Self> {
        if samples.len() < MIN_SAMPLES_FOR_SPECTRUM {
            return None;
        }

        let fft_len = largest_power_of_two_leq(samples.len()).min(fft_size_cap.max(MIN_SAMPLES_FOR_SPECTRUM));
        let mut buffer = prepare_fft_buffer(samples, fft_len);
        apply_hann_window(&mut buffer);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);
        fft.process(&mut buffer);

        let power_db = centered_power_spectrum_db(&buffer);
        let bin_hz = sample_rate_hz / fft_len as f64;

        let noise_floor_db = noise_floor(&power_db);
        let rssi_db = rssi(&power_db);
        let snr_db = rssi_db - noise_floor_db;
        let (peak_idx, peak_val) = peak_bin(&power_db);
        let peak_freq_offset_hz = (peak_idx as f64 - (power_db.len() as f64 / 2.0)) * bin_hz;
        let bandwidth_hz = bandwidth_at_minus_3db(&power_db, peak_idx, peak_val, bin_hz);
        let spectral_flatness = flatness(&buffer);

        Some(Self {
            power_db,
            bin_hz,
            noise_floor_db,
            rssi_db,
            snr_db,
            peak_freq_offset_hz,
            bandwidth_hz,
            spectral_flatness,
        })
    }
}

fn largest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1usize << (usize::BITS - 1 - n.leading_zeros())
}

fn prepare_fft_buffer(samples: &[Complex64], fft_len: usize) -> Vec<Complex32> {
    let mut buffer = Vec::with_capacity(fft_len);
    for s in samples.iter().take(fft_len) {
        buffer.push(Complex32::new(s.re as f32, s.im as f32));
    }
    while buffer.len() < fft_len {
        buffer.push(Complex32::new(0.0, 0.0));
    }
    buffer
}

fn apply_hann_window(buffer: &mut [Complex32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    for (i, sample) in buffer.iter_mut().enumerate() {
        let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos();
        *sample = *sample * w;
    }
}

/// Power spectrum in dB, rotated so index 0 is the most negative frequency
/// (DC-centered, like an fftshift).
fn centered_power_spectrum_db(buffer: &[Complex32]) -> Vec<f64> {
    let n = buffer.len();
    let scale = 1.0 / (n as f64);
    let db: Vec<f64> = buffer
        .iter()
        .map(|c| {
            let power = (c.norm_sqr() as f64) * scale;
            if power > 1e-14 {
                10.0 * power.log10()
            } else {
                POWER_FLOOR_DB
            }
        })
        .collect();

    let half = n / 2;
    let mut centered = Vec::with_capacity(n);
    centered.extend_from_slice(&db[half..]);
    centered.extend_from_slice(&db[..half]);
    centered
}

/// Median of the lowest 40% of spectrum bins.
fn noise_floor(power_db: &[f64]) -> f64 {
    let mut sorted = power_db.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let cutoff = ((sorted.len() as f64) * 0.4).ceil() as usize;
    let cutoff = cutoff.max(1).min(sorted.len());
    median(&sorted[..cutoff])
}

/// Mean of the highest 10% of spectrum bins.
fn rssi(power_db: &[f64]) -> f64 {
    let mut sorted = power_db.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = ((sorted.len() as f64) * 0.10).ceil() as usize;
    let count = count.max(1).min(sorted.len());
    let top = &sorted[sorted.len() - count..];
    top.iter().sum::<f64>() / top.len() as f64
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return POWER_FLOOR_DB;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn peak_bin(power_db: &[f64]) -> (usize, f64) {
    power_db
        .iter()
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
}

/// Width, in Hz, of the region around `peak_idx` that stays within 3 dB of
/// `peak_val`.
fn bandwidth_at_minus_3db(power_db: &[f64], peak_idx: usize, peak_val: f64, bin_hz: f64) -> f64 {
    let threshold = peak_val - 3.0;
    let mut lo = peak_idx;
    while lo > 0 && power_db[lo - 1] >= threshold {
        lo -= 1;
    }
    let mut hi = peak_idx;
    while hi + 1 < power_db.len() && power_db[hi + 1] >= threshold {
        hi += 1;
    }
    ((hi - lo + 1) as f64) * bin_hz
}

/// Ratio of geometric mean to arithmetic mean of the linear power spectrum;
/// close to 1.0 indicates broadband/noise-like energy.
fn flatness(fft_buffer: &[Complex32]) -> f64 {
    let linear_power: Vec<f64> = fft_buffer.iter().map(|c| (c.norm_sqr() as f64).max(1e-20)).collect();
    let n = linear_power.len() as f64;
    let log_sum: f64 = linear_power.iter().map(|p| p.ln()).sum();
    let geomean = (log_sum / n).exp();
    let arithmean = linear_power.iter().sum::<f64>() / n;
    if arithmean <= 0.0 {
        0.0
    } else {
        (geomean / arithmean).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq_hz: f64, sample_rate_hz: f64, n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate_hz;
                Complex64::new((2.0 * PI * freq_hz * t).cos(), (2.0 * PI * freq_hz * t).sin())
            })
            .collect()
    }

    #[test]
    fn too_few_samples_returns_none() {
        let samples = vec![Complex64::new(1.0, 0.0); 64];
        assert!(Spectrum::analyze(&samples, 48_000.0, 1024).is_none());
    }

    #[test]
    fn tone_peak_matches_offset() {
        let sample_rate = 48_000.0;
        let samples = tone(5_000.0, sample_rate, 4096);
        let spectrum = Spectrum::analyze(&samples, sample_rate, 4096).unwrap();
        assert!((spectrum.peak_freq_offset_hz - 5_000.0).abs() < spectrum.bin_hz * 2.0);
    }

    #[test]
    fn rssi_exceeds_noise_floor_for_a_tone() {
        let sample_rate = 48_000.0;
        let samples = tone(1_000.0, sample_rate, 4096);
        let spectrum = Spectrum::analyze(&samples, sample_rate, 4096).unwrap();
        assert!(spectrum.rssi_db > spectrum.noise_floor_db);
        assert!(spectrum.snr_db > 0.0);
    }

    #[test]
    fn flatness_is_bounded() {
        let sample_rate = 48_000.0;
        let samples = tone(2_000.0, sample_rate, 2048);
        let spectrum = Spectrum::analyze(&samples, sample_rate, 2048).unwrap();
        assert!(spectrum.spectral_flatness >= 0.0 && spectrum.spectral_flatness <= 1.0);
    }
}
