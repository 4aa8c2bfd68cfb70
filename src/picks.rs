//! # Picks
//! Ranks the field by display score, keeps the top five with their marks and
//! breaks visual ties at the top with a small seeded jitter.
//!
//! Ranking is a stable sort over the field in horse-number order, so horses
//! with identical display scores keep ascending-number order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::display::DisplayParams;
use crate::indicator::{HorseNumber, ScoreMap};
use crate::race::Horse;
use crate::seed::{jitter_seed, stable_unit};

/// Rank marks for 1st through 5th pick.
pub const MARKS: [&str; 5] = ["◎", "〇", "▲", "△", "☆"];

/// Maximum number of picks per race.
pub const MAX_PICKS: usize = MARKS.len();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub mark: String,
    pub number: HorseNumber,
    pub name: String,
    #[serde(default)]
    pub jockey: String,
    /// Display score, 2 decimals.
    pub score: f64,
    /// Compressed 0–100 value behind the display score, 1 decimal.
    #[serde(rename = "raw_0_100", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterParams {
    pub enabled: bool,
    /// Largest amount subtracted from a score.
    pub max: f64,
    /// Jitter applies once the top score reaches `score_max - trigger_offset`.
    pub trigger_offset: f64,
}

impl Default for JitterParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max: 0.2,
            trigger_offset: 0.0,
        }
    }
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Top picks of `horses` by `display` score.
///
/// Horses missing from `display` score `floor`, normally the bottom of the
/// display range, and carry a raw value of 0.0.
pub fn make_picks(
    horses: &[Horse],
    display: &ScoreMap,
    raw: Option<&ScoreMap>,
    floor: f64,
) -> Vec<Pick> {
    let mut ranked: Vec<(f64, &Horse)> = horses
        .iter()
        .map(|h| (display.get(&h.number).copied().unwrap_or(floor), h))
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .take(MAX_PICKS)
        .zip(MARKS)
        .map(|((score, h), mark)| Pick {
            mark: mark.to_string(),
            number: h.number,
            name: h.name.clone(),
            jockey: h.jockey.clone(),
            score: round2(score),
            raw: raw.map(|m| round1(m.get(&h.number).copied().unwrap_or(0.0))),
        })
        .collect()
}

/// Nudge the top picks apart when the best score sits at the display maximum.
///
/// Each of the first five picks loses `fraction * max` where the fraction is
/// derived from `race_id` and the horse number; scores never drop below
/// `score_min`. Order is left untouched even if two scores cross by a hundredth.
/// Returns `true` when the jitter was applied.
pub fn apply_tie_jitter(
    picks: &mut [Pick],
    race_id: &str,
    jitter: &JitterParams,
    display: &DisplayParams,
) -> bool {
    if !jitter.enabled {
        return false;
    }
    let Some(top) = picks.first() else {
        return false;
    };
    let trigger = display.score_max - jitter.trigger_offset.max(0.0);
    if top.score < trigger {
        return false;
    }

    let magnitude = jitter.max.max(0.0);
    for p in picks.iter_mut().take(MAX_PICKS) {
        let u = stable_unit(&jitter_seed(race_id, p.number));
        p.score = round2((p.score - u * magnitude).max(display.score_min));
    }
    true
}
