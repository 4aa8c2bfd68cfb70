//! # Display scores
//! composite (0–100) → compressed (0–100) → display (`score_min..=score_max`).
//!
//! Compression is a tanh soft saturation around 50: values near the centre
//! pass almost linearly, values near 0 or 100 are pulled inward. The display
//! range defaults to 1–70.

use serde::{Deserialize, Serialize};

use crate::indicator::ScoreMap;

const CENTER: f64 = 50.0;
const MIN_WIDTH: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayParams {
    pub score_min: f64,
    pub score_max: f64,
    pub compress_enabled: bool,
    pub compress_width: f64,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            score_min: 1.0,
            score_max: 70.0,
            compress_enabled: true,
            compress_width: 18.0,
        }
    }
}

/// Both views of the composite produced by [`build_display_scores`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayScores {
    /// Still on the 0–100 scale, shrunk toward 50.
    pub compressed: ScoreMap,
    /// Compressed value rescaled onto the display range.
    pub display: ScoreMap,
}

fn clamp_0_100(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Soft-saturate a 0–100 value toward the centre.
pub fn compress(v: f64, p: &DisplayParams) -> f64 {
    let v = clamp_0_100(v);
    if !p.compress_enabled {
        return v;
    }
    let z = (v - CENTER) / p.compress_width.max(MIN_WIDTH);
    clamp_0_100(CENTER + CENTER * z.tanh())
}

/// Linear map of a 0–100 value onto `score_min..=score_max`.
pub fn to_display(compressed: f64, p: &DisplayParams) -> f64 {
    let c = clamp_0_100(compressed);
    p.score_min + (c / 100.0) * (p.score_max - p.score_min)
}

pub fn build_display_scores(composite: &ScoreMap, p: &DisplayParams) -> DisplayScores {
    let compressed: ScoreMap = composite
        .iter()
        .map(|(&k, &v)| (k, compress(v, p)))
        .collect();
    let display = compressed
        .iter()
        .map(|(&k, &c)| (k, to_display(c, p)))
        .collect();
    DisplayScores {
        compressed,
        display,
    }
}
