//! Score-dependent panic threshold.

use crate::types::{Classification, PanicScore};

/// Below this score the bar is raised.
const LOW_CONFIDENCE_BOUND: f32 = 0.5;
/// Above this score the bar is lowered.
const HIGH_CONFIDENCE_BOUND: f32 = 0.7;
const THRESHOLD_SHIFT: f32 = 0.1;

/// Threshold applied to `score` for a given base threshold.
///
/// Both bounds are strict, so scores of exactly 0.5 or 0.7 use `base`.
pub fn dynamic_threshold(score: f32, base: f32) -> f32 {
    if score < LOW_CONFIDENCE_BOUND {
        base + THRESHOLD_SHIFT
    } else if score > HIGH_CONFIDENCE_BOUND {
        base - THRESHOLD_SHIFT
    } else {
        base
    }
}

/// Classify a score as panic when it strictly exceeds its dynamic threshold.
pub fn classify(score: PanicScore, base_threshold: f32) -> Classification {
    let score = score.value();
    let threshold_used = dynamic_threshold(score, base_threshold);
    Classification {
        is_panic: score > threshold_used,
        score,
        threshold_used,
    }
}
