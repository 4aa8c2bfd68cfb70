//! # Congestion index
//! How tightly packed the top of the field is, on a 0–100 scale computed from
//! the final displayed scores. High congestion means small gaps between the
//! leading picks (hard race to call).
//!
//! ```text
//! gap12 = s1 - s2, gap15 = s1 - s5 (or the last pick when fewer than five)
//! r12 = min(1, gap12 / gap12_mid), r15 = min(1, gap15 / gap15_mid)
//! congestion = ((1 - r12) * 0.4 + (1 - r15) * 0.6) * 100
//! ```
//!
//! A value that rounds to exactly 0.0 is replaced by a seeded value inside
//! `zero_fix_min..zero_fix_max` when the zero fix is enabled.

use serde::{Deserialize, Serialize};

use crate::picks::{round1, round2, Pick, MAX_PICKS};
use crate::seed::{congestion_zero_seed, stable_unit};

const W_GAP12: f64 = 0.4;
const W_GAP15: f64 = 0.6;
const MIN_MID: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLabel {
    Extreme,
    Congested,
    SomewhatCongested,
    Orderly,
    Unknown,
}

impl CongestionLabel {
    /// Label as shown on published pages.
    pub fn ja(self) -> &'static str {
        match self {
            CongestionLabel::Extreme => "超混戦",
            CongestionLabel::Congested => "混戦",
            CongestionLabel::SomewhatCongested => "やや混戦",
            CongestionLabel::Orderly => "順当",
            CongestionLabel::Unknown => "不明",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionParams {
    pub gap12_mid: f64,
    pub gap15_mid: f64,
    pub focus_threshold: f64,
    pub zero_fix_enabled: bool,
    pub zero_fix_min: f64,
    pub zero_fix_max: f64,
    pub extreme_at: f64,
    pub congested_at: f64,
    pub somewhat_at: f64,
}

impl Default for CongestionParams {
    fn default() -> Self {
        Self {
            gap12_mid: 0.8,
            gap15_mid: 3.0,
            focus_threshold: 30.0,
            zero_fix_enabled: true,
            zero_fix_min: 1.2,
            zero_fix_max: 9.8,
            extreme_at: 80.0,
            congested_at: 60.0,
            somewhat_at: 30.0,
        }
    }
}

impl CongestionParams {
    pub fn label_for(&self, value: f64) -> CongestionLabel {
        if value >= self.extreme_at {
            CongestionLabel::Extreme
        } else if value >= self.congested_at {
            CongestionLabel::Congested
        } else if value >= self.somewhat_at {
            CongestionLabel::SomewhatCongested
        } else {
            CongestionLabel::Orderly
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Congestion {
    /// 0–100 with 1 decimal; `None` when fewer than two picks exist.
    pub value: Option<f64>,
    pub label: CongestionLabel,
    pub gap12: Option<f64>,
    pub gap15: Option<f64>,
}

impl Congestion {
    pub fn unknown() -> Self {
        Self {
            value: None,
            label: CongestionLabel::Unknown,
            gap12: None,
            gap15: None,
        }
    }

    /// Focus race: a known value at or above the focus threshold.
    pub fn is_focus(&self, p: &CongestionParams) -> bool {
        self.value.is_some_and(|v| v >= p.focus_threshold)
    }
}

/// Raw 0–100 congestion from the two top gaps, before rounding.
pub fn congestion_from_gaps(gap12: f64, gap15: f64, p: &CongestionParams) -> f64 {
    let r12 = (gap12 / p.gap12_mid.max(MIN_MID)).min(1.0);
    let r15 = (gap15 / p.gap15_mid.max(MIN_MID)).min(1.0);
    (((1.0 - r12) * W_GAP12 + (1.0 - r15) * W_GAP15) * 100.0).clamp(0.0, 100.0)
}

pub fn calc_congestion(picks: &[Pick], race_id: &str, p: &CongestionParams) -> Congestion {
    let scores: Vec<f64> = picks.iter().take(MAX_PICKS).map(|pk| pk.score).collect();
    let (s1, s2, s_last) = match scores.as_slice() {
        [s1, s2, rest @ ..] => (*s1, *s2, rest.last().copied().unwrap_or(*s2)),
        _ => return Congestion::unknown(),
    };

    let gap12 = (s1 - s2).max(0.0);
    let gap15 = (s1 - s_last).max(0.0);

    let mut value = round1(congestion_from_gaps(gap12, gap15, p));
    if p.zero_fix_enabled && value == 0.0 {
        let u = stable_unit(&congestion_zero_seed(race_id));
        value = round1(p.zero_fix_min + u * (p.zero_fix_max - p.zero_fix_min));
    }

    Congestion {
        value: Some(value),
        label: p.label_for(value),
        gap12: Some(round2(gap12)),
        gap15: Some(round2(gap15)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picks(scores: &[f64]) -> Vec<Pick> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| Pick {
                mark: String::new(),
                number: (i + 1) as u8,
                name: format!("H{}", i + 1),
                jockey: String::new(),
                score: s,
                raw: None,
            })
            .collect()
    }

    #[test]
    fn orderly_example() {
        let c = calc_congestion(
            &picks(&[70.0, 69.5, 69.0, 68.0, 65.0]),
            "r",
            &CongestionParams::default(),
        );
        assert_eq!(c.value, Some(15.0));
        assert_eq!(c.label, CongestionLabel::Orderly);
        assert_eq!(c.gap12, Some(0.5));
        assert_eq!(c.gap15, Some(5.0));
    }

    #[test]
    fn identical_scores_are_fully_congested() {
        let c = calc_congestion(&picks(&[50.0; 5]), "r", &CongestionParams::default());
        assert_eq!(c.value, Some(100.0));
        assert_eq!(c.label, CongestionLabel::Extreme);
    }

    #[test]
    fn fewer_than_two_picks_is_unknown() {
        let p = CongestionParams::default();
        assert_eq!(calc_congestion(&picks(&[40.0]), "r", &p), Congestion::unknown());
        assert_eq!(calc_congestion(&[], "r", &p), Congestion::unknown());
        assert!(!Congestion::unknown().is_focus(&p));
    }

    #[test]
    fn two_picks_use_last_available_for_gap15() {
        let c = calc_congestion(&picks(&[60.0, 59.0]), "r", &CongestionParams::default());
        assert_eq!(c.gap12, Some(1.0));
        assert_eq!(c.gap15, Some(1.0));
        // r12 = 1, r15 = 1/3 → 0.6 * 2/3 * 100 = 40
        assert_eq!(c.value, Some(40.0));
        assert_eq!(c.label, CongestionLabel::SomewhatCongested);
    }

    #[test]
    fn zero_is_remapped_into_fix_range() {
        let p = CongestionParams::default();
        let spread = picks(&[70.0, 60.0, 55.0, 50.0, 40.0]);
        let a = calc_congestion(&spread, "202605010211", &p);
        let b = calc_congestion(&spread, "202605010211", &p);
        let v = a.value.unwrap();
        assert!((1.2..=9.8).contains(&v), "got {v}");
        assert_eq!(a, b);
        assert_eq!(a.label, CongestionLabel::Orderly);
    }

    #[test]
    fn zero_kept_when_fix_disabled() {
        let p = CongestionParams {
            zero_fix_enabled: false,
            ..CongestionParams::default()
        };
        let c = calc_congestion(&picks(&[70.0, 60.0, 55.0, 50.0, 40.0]), "r", &p);
        assert_eq!(c.value, Some(0.0));
    }

    #[test]
    fn label_thresholds_are_inclusive() {
        let p = CongestionParams::default();
        assert_eq!(p.label_for(80.0), CongestionLabel::Extreme);
        assert_eq!(p.label_for(79.9), CongestionLabel::Congested);
        assert_eq!(p.label_for(60.0), CongestionLabel::Congested);
        assert_eq!(p.label_for(30.0), CongestionLabel::SomewhatCongested);
        assert_eq!(p.label_for(29.9), CongestionLabel::Orderly);

        let strict = CongestionParams {
            somewhat_at: 40.0,
            ..CongestionParams::default()
        };
        assert_eq!(strict.label_for(35.0), CongestionLabel::Orderly);
    }

    #[test]
    fn focus_at_threshold() {
        let p = CongestionParams::default();
        let c = calc_congestion(&picks(&[60.0, 59.0]), "r", &p);
        assert!(c.is_focus(&p));
        let high = CongestionParams {
            focus_threshold: 40.1,
            ..CongestionParams::default()
        };
        assert!(!c.is_focus(&high));
    }

    #[test]
    fn raw_value_bounded() {
        let p = CongestionParams::default();
        for (g12, g15) in [(0.0, 0.0), (100.0, 100.0), (0.4, 1.5), (5.0, 0.0)] {
            let v = congestion_from_gaps(g12, g15, &p);
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
