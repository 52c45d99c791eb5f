//! Pulse-based liveness decision.
//!
//! Living tissue under a camera shows a faint periodic change in reflected
//! light as blood volume rises and falls with each heartbeat. A photograph,
//! print or silicone cast has no circulation, so the intensity trace of its ROI
//! carries sensor noise and lighting drift but no energy concentrated in the
//! heart-rate band.
//!
//! The decision is the fraction of spectral power that falls in
//! [`PULSE_BAND_LOW_HZ`, `PULSE_BAND_HIGH_HZ`] (45–240 bpm), compared against a
//! threshold. Too little data is a negative verdict, never an error.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed or displayed photographs, static prints, silicone or
//!   gelatine replicas without a pulsatile light source.
//! - **Does not block:** Replayed videos of a real finger, or spoofs engineered
//!   to flicker inside the pulse band.

use crate::spectral::{self, SpectralEstimate};

/// Lower edge of the physiological pulse band (45 bpm).
pub const PULSE_BAND_LOW_HZ: f64 = 0.75;
/// Upper edge of the physiological pulse band (240 bpm).
pub const PULSE_BAND_HIGH_HZ: f64 = 4.0;

/// Default minimum in-band power fraction for a live verdict.
pub const DEFAULT_POWER_THRESHOLD: f64 = 0.35;

/// Added to total power so a perfectly flat trace gives a ratio of ~0.
const TOTAL_POWER_EPSILON: f64 = 1e-8;

/// Minimum trace length, in seconds, before a verdict is attempted.
const MIN_SECONDS_OF_DATA: f64 = 2.0;

/// Result of analysing one session's intensity trace.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessReport {
    /// Whether the trace passed the check (true = likely live).
    pub is_live: bool,
    /// In-band to total power ratio. `None` if there was not enough data to compute it.
    pub ratio: Option<f64>,
    /// Number of samples the verdict was based on.
    pub samples: usize,
}

/// Whether `buffer_len` samples at `fs` Hz cover at least two seconds.
pub fn has_enough_data(buffer_len: usize, fs: f64) -> bool {
    buffer_len as f64 >= fs * MIN_SECONDS_OF_DATA
}

/// Fraction of the estimate's power inside the pulse band.
pub fn band_power_ratio(estimate: &SpectralEstimate) -> f64 {
    let band = estimate.band_power(PULSE_BAND_LOW_HZ, PULSE_BAND_HIGH_HZ);
    let total = estimate.total_power() + TOTAL_POWER_EPSILON;
    band / total
}

/// Live iff the in-band power ratio reaches `power_threshold`.
pub fn decide(estimate: &SpectralEstimate, power_threshold: f64) -> bool {
    passes(band_power_ratio(estimate), power_threshold)
}

fn passes(ratio: f64, power_threshold: f64) -> bool {
    ratio >= power_threshold
}

/// Run the full analysis on a snapshot of the signal buffer.
///
/// Returns a negative report without touching the spectral analyser when the
/// trace is shorter than two seconds.
pub fn evaluate(samples: &[f64], fs: f64, power_threshold: f64) -> LivenessReport {
    if !has_enough_data(samples.len(), fs) {
        tracing::debug!(
            samples = samples.len(),
            required = fs * MIN_SECONDS_OF_DATA,
            "insufficient data, treating as spoof"
        );
        return LivenessReport {
            is_live: false,
            ratio: None,
            samples: samples.len(),
        };
    }

    let estimate = spectral::analyse(samples, fs);
    let ratio = band_power_ratio(&estimate);

    LivenessReport {
        is_live: passes(ratio, power_threshold),
        ratio: Some(ratio),
        samples: samples.len(),
    }
}
