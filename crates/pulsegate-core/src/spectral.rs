//! Power spectral density estimation for the intensity trace.
//!
//! The trace is mean-detrended and fed through Welch's method: Hann-windowed
//! segments of `min(256, n)` samples with 50% overlap, each segment
//! constant-detrended, periodograms averaged and scaled to a one-sided density.
//! Averaging trades frequency resolution for variance, which is all the
//! band-power decision needs.

use realfft::RealFftPlanner;

/// Upper bound on the Welch segment length.
pub const MAX_SEGMENT_LEN: usize = 256;

/// One-sided PSD: `frequencies[i]` (Hz) pairs with `power[i]`.
#[derive(Debug, Clone)]
pub struct SpectralEstimate {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl SpectralEstimate {
    /// Sum of power over bins whose frequency lies in `[low_hz, high_hz]`.
    pub fn band_power(&self, low_hz: f64, high_hz: f64) -> f64 {
        self.frequencies
            .iter()
            .zip(&self.power)
            .filter(|(f, _)| **f >= low_hz && **f <= high_hz)
            .map(|(_, p)| *p)
            .sum()
    }

    pub fn total_power(&self) -> f64 {
        self.power.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }
}

/// Subtract the arithmetic mean from every sample.
pub fn detrend_mean(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|s| s - mean).collect()
}

/// Periodic Hann window of length `size`.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos())
        .collect()
}

/// Detrend `samples` and estimate their PSD at sample rate `fs`.
///
/// Callers are expected to pass a non-trivial trace (see
/// [`crate::liveness::has_enough_data`]); an empty input yields an empty
/// estimate.
pub fn analyse(samples: &[f64], fs: f64) -> SpectralEstimate {
    welch(&detrend_mean(samples), fs)
}

/// Welch PSD with Hann window, `nperseg = min(256, n)` and `noverlap = nperseg / 2`.
pub fn welch(signal: &[f64], fs: f64) -> SpectralEstimate {
    let seg_len = signal.len().min(MAX_SEGMENT_LEN);
    if seg_len == 0 {
        return SpectralEstimate {
            frequencies: Vec::new(),
            power: Vec::new(),
        };
    }

    let step = seg_len - seg_len / 2;
    let n_bins = seg_len / 2 + 1;
    let window = hann_window(seg_len);
    let window_energy: f64 = window.iter().map(|w| w * w).sum();
    let scale = if window_energy > 0.0 {
        1.0 / (fs * window_energy)
    } else {
        0.0
    };

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(seg_len);
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut accum = vec![0.0f64; n_bins];
    let mut segments = 0usize;
    let mut start = 0usize;

    while start + seg_len <= signal.len() {
        let segment = &signal[start..start + seg_len];
        let seg_mean = segment.iter().sum::<f64>() / seg_len as f64;
        for ((dst, s), w) in input.iter_mut().zip(segment).zip(&window) {
            *dst = (s - seg_mean) * w;
        }

        // Lengths always match the plan, so this cannot fail.
        if fft.process(&mut input, &mut spectrum).is_err() {
            break;
        }

        for (acc, bin) in accum.iter_mut().zip(&spectrum) {
            *acc += bin.norm_sqr();
        }
        segments += 1;
        start += step;
    }

    let has_nyquist = seg_len % 2 == 0;
    let power = accum
        .iter()
        .enumerate()
        .map(|(k, acc)| {
            let mut p = acc * scale / segments.max(1) as f64;
            // Fold negative frequencies in; DC and Nyquist have no mirror.
            if k != 0 && !(has_nyquist && k == n_bins - 1) {
                p *= 2.0;
            }
            p
        })
        .collect();

    let frequencies = (0..n_bins)
        .map(|k| k as f64 * fs / seg_len as f64)
        .collect();

    SpectralEstimate { frequencies, power }
}
