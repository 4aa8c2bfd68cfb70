//! # Composite score
//! Blends the two normalized indicator sources into one 0–100 value per horse
//! and decides whether the blended field is too flat to publish.
//!
//! A horse covered by only one source keeps that source's value as is; it is
//! not scaled down by the weight of the missing source.

use serde::{Deserialize, Serialize};

use crate::indicator::{HorseNumber, ScoreMap};

/// Blend weights for the primary and secondary sources.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub primary: f64,
    pub secondary: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            primary: 0.80,
            secondary: 0.20,
        }
    }
}

/// Flatness gate parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatnessParams {
    pub enabled: bool,
    /// Upper bound on the number of composite values needed before judging.
    pub min_sample_count: usize,
    /// A field whose composite spread is at most this wide is flat.
    pub max_range: f64,
}

impl Default for FlatnessParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_sample_count: 10,
            max_range: 3.0,
        }
    }
}

/// Weighted union of two normalized maps.
pub fn combine(primary: &ScoreMap, secondary: &ScoreMap, w: &BlendWeights) -> ScoreMap {
    let mut out = ScoreMap::new();
    for &k in primary.keys().chain(secondary.keys()) {
        if out.contains_key(&k) {
            continue;
        }
        let v = match (primary.get(&k), secondary.get(&k)) {
            (Some(&a), Some(&b)) => w.primary * a + w.secondary * b,
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => continue,
        };
        out.insert(k, v);
    }
    out
}

/// An empty composite becomes an all-zero map over the whole field, so the
/// ranking downstream is never empty.
pub fn with_field_fallback<I>(composite: ScoreMap, field: I) -> ScoreMap
where
    I: IntoIterator<Item = HorseNumber>,
{
    if !composite.is_empty() {
        return composite;
    }
    field.into_iter().map(|n| (n, 0.0)).collect()
}

/// Number of composite values required before the flatness check applies.
pub fn flat_sample_need(field_size: usize, min_sample_count: usize) -> usize {
    min_sample_count.min(field_size.max(3))
}

/// `true` when the composite spread carries no usable signal.
pub fn is_flat(composite: &ScoreMap, field_size: usize, p: &FlatnessParams) -> bool {
    if !p.enabled || composite.is_empty() {
        return false;
    }
    if composite.len() < flat_sample_need(field_size, p.min_sample_count) {
        return false;
    }
    let (lo, hi) = composite
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    hi - lo <= p.max_range
}
