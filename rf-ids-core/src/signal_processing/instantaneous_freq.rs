//! Instantaneous-frequency estimation from the complex baseband (analytic)
//! signal.
//!
//! IQ samples from a direct-conversion SDR are already an analytic signal
//! (no negative-frequency image), so the Hilbert-transform step a real-valued
//! recording would need collapses to reading the phase of the complex sample
//! directly: `phase[n] = atan2(Q[n], I[n])`.

use num_complex::Complex64;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstantaneousFrequency {
    pub mean_hz: f64,
    pub std_hz: f64,
    pub range_hz: f64,
}

/// Estimate instantaneous frequency statistics from one frame of complex
/// baseband samples via unwrapped phase differencing.
pub fn instantaneous_frequency(samples: &[Complex64], sample_rate_hz: f64) -> InstantaneousFrequency {
    if samples.len() < 2 {
        return InstantaneousFrequency::default();
    }

    let phases: Vec<f64> = samples.iter().map(|s| s.im.atan2(s.re)).collect();
    let unwrapped = unwrap_phase(&phases);

    let scale = sample_rate_hz / (2.0 * std::f64::consts::PI);
    let freqs: Vec<f64> = unwrapped
        .windows(2)
        .map(|w| (w[1] - w[0]) * scale)
        .collect();

    if freqs.is_empty() {
        return InstantaneousFrequency::default();
    }

    let mean = freqs.iter().sum::<f64>() / freqs.len() as f64;
    let variance = freqs.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / freqs.len() as f64;
    let std_hz = variance.sqrt();
    let range_hz = freqs
        .iter()
        .fold(f64::NEG_INFINITY, |a, &b| a.max(b))
        - freqs.iter().fold(f64::INFINITY, |a, &b| a.min(b));

    InstantaneousFrequency {
        mean_hz: mean,
        std_hz,
        range_hz,
    }
}

/// Classic phase-unwrapping: accumulate a +/- 2*pi correction whenever a
/// consecutive phase jump exceeds pi in magnitude.
fn unwrap_phase(phases: &[f64]) -> Vec<f64> {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut unwrapped = Vec::with_capacity(phases.len());
    let mut offset = 0.0;
    let mut prev = phases[0];
    unwrapped.push(phases[0]);

    for &p in &phases[1..] {
        let mut delta = p - prev;
        while delta > std::f64::consts::PI {
            offset -= two_pi;
            delta -= two_pi;
        }
        while delta < -std::f64::consts::PI {
            offset += two_pi;
            delta += two_pi;
        }
        unwrapped.push(p + offset);
        prev = p;
    }

    unwrapped
}
