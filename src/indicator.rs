//! # Indicators
//! Per-horse indicator maps and the two leaf operations applied to each
//! source before blending: the sufficiency gate and min-max normalization.
//!
//! Maps are keyed by horse number and use `BTreeMap` so that iteration is
//! always horse-number ascending.

use std::collections::BTreeMap;

/// Horse number ("umaban"), unique within a race.
pub type HorseNumber = u8;

/// Horse number → score. Used for raw, normalized and composite values alike.
pub type ScoreMap = BTreeMap<HorseNumber, f64>;

/// Largest horse number a JRA field can have.
pub const MAX_HORSE_NUMBER: HorseNumber = 18;

/// Value every horse gets when a source carries no differentiation.
pub const FLAT_NORMALIZED: f64 = 50.0;

/// Smallest point count any source must reach, regardless of field size.
pub const MIN_POINTS_FLOOR: usize = 3;

/// `true` for numbers a race card can contain (1..=18).
pub fn is_valid_number(n: HorseNumber) -> bool {
    (1..=MAX_HORSE_NUMBER).contains(&n)
}

/// Rescale a raw indicator map onto `[0, 100]`.
///
/// - empty input → empty output (never zero-filled)
/// - all values equal → every key maps to `50.0`
/// - otherwise `(v - min) / (max - min) * 100`
pub fn normalize_0_100(raw: &ScoreMap) -> ScoreMap {
    let mut values = raw.values().copied();
    let Some(first) = values.next() else {
        return ScoreMap::new();
    };
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if max == min {
        return raw.keys().map(|&k| (k, FLAT_NORMALIZED)).collect();
    }

    let span = max - min;
    raw.iter()
        .map(|(&k, &v)| (k, (v - min) / span * 100.0))
        .collect()
}

/// Effective minimum point count for a field: never more than "all but one"
/// horse, never fewer than three.
pub fn required_points(field_size: usize, min_required: usize) -> usize {
    let all_but_one = field_size.saturating_sub(1).max(1);
    min_required.min(all_but_one).max(MIN_POINTS_FLOOR)
}

/// Sufficiency gate: is a source with `points` values usable for this race?
pub fn is_sufficient(points: usize, field_size: usize, min_required: usize) -> bool {
    if points == 0 {
        return false;
    }
    points >= required_points(field_size, min_required)
}

/// Normalize `raw` if it passes the gate, otherwise treat the source as absent.
pub fn gated_normalize(raw: &ScoreMap, field_size: usize, min_required: usize) -> ScoreMap {
    if is_sufficient(raw.len(), field_size, min_required) {
        normalize_0_100(raw)
    } else {
        ScoreMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(u8, f64)]) -> ScoreMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn three_horse_example() {
        let out = normalize_0_100(&map(&[(1, 80.0), (2, 60.0), (3, 40.0)]));
        assert_eq!(out, map(&[(1, 100.0), (2, 50.0), (3, 0.0)]));
    }

    #[test]
    fn empty_stays_empty() {
        assert!(normalize_0_100(&ScoreMap::new()).is_empty());
    }

    #[test]
    fn all_equal_maps_to_fifty() {
        let out = normalize_0_100(&map(&[(4, 12.5), (9, 12.5), (11, 12.5)]));
        assert!(out.values().all(|&v| v == 50.0));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn single_entry_is_flat() {
        let out = normalize_0_100(&map(&[(5, -3.0)]));
        assert_eq!(out, map(&[(5, 50.0)]));
    }

    #[test]
    fn negative_values_translate() {
        let out = normalize_0_100(&map(&[(1, -10.0), (2, -20.0), (3, -15.0)]));
        assert_eq!(out[&1], 100.0);
        assert_eq!(out[&2], 0.0);
        assert!((out[&3] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn gate_tolerates_one_missing_in_small_field() {
        // field 6, min 8 → threshold max(3, min(8, 5)) = 5
        assert_eq!(required_points(6, 8), 5);
        assert!(is_sufficient(5, 6, 8));
        assert!(!is_sufficient(4, 6, 8));
    }

    #[test]
    fn gate_never_below_three() {
        assert_eq!(required_points(3, 8), 3);
        assert_eq!(required_points(2, 8), 3);
        assert_eq!(required_points(0, 8), 3);
        assert_eq!(required_points(16, 1), 3);
        assert!(!is_sufficient(2, 3, 8));
        assert!(is_sufficient(3, 3, 8));
    }

    #[test]
    fn gate_caps_at_min_required_for_large_fields() {
        assert_eq!(required_points(18, 8), 8);
        assert!(is_sufficient(8, 18, 8));
        assert!(!is_sufficient(7, 18, 8));
    }

    #[test]
    fn zero_points_is_never_sufficient() {
        assert!(!is_sufficient(0, 0, 0));
        assert!(!is_sufficient(0, 18, 3));
    }

    #[test]
    fn gated_normalize_drops_thin_sources() {
        let thin = map(&[(1, 10.0), (2, 20.0)]);
        assert!(gated_normalize(&thin, 12, 8).is_empty());
        let ok = map(&[(1, 10.0), (2, 20.0), (3, 30.0)]);
        assert_eq!(gated_normalize(&ok, 4, 8).len(), 3);
    }

    #[test]
    fn valid_numbers() {
        assert!(!is_valid_number(0));
        assert!(is_valid_number(1));
        assert!(is_valid_number(18));
        assert!(!is_valid_number(19));
    }
}
