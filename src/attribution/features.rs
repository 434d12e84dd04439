//! Audio feature extraction for voice matching
//!
//! Three cheap scalar features are enough to tell apart the handful of
//! voices on a stream: RMS volume, a pitch proxy from the zero-crossing
//! rate, and speech rate in characters per second.

use serde::{Deserialize, Serialize};

/// Scalar voice features extracted from one audio sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// RMS volume of the sample, in [0, 1] for normalized PCM
    pub volume: f64,
    /// Fundamental frequency estimate in Hz (zero-crossing proxy)
    pub pitch_hz: f64,
    /// Speech rate in characters per second
    pub speech_rate: f64,
}

/// Extract features from mono PCM samples.
///
/// Returns `None` when the sample is empty, too short to measure, or
/// contains non-finite values — malformed audio degrades attribution to
/// lexical-only scoring instead of failing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn extract(samples: &[f32], sample_rate: u32, text: &str) -> Option<AudioFeatures> {
    if samples.len() < 2 || sample_rate == 0 {
        return None;
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let duration_secs = samples.len() as f64 / f64::from(sample_rate);

    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let volume = (sum_squares / samples.len() as f64).sqrt();

    // Each full pitch period crosses zero twice.
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let pitch_hz = crossings as f64 / 2.0 / duration_secs;

    let speech_rate = text.chars().count() as f64 / duration_secs;

    Some(AudioFeatures {
        volume,
        pitch_hz,
        speech_rate,
    })
}
