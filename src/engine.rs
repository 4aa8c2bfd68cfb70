//! # Race engine
//! Pure, testable pipeline that maps one `RaceInput` → `RaceOutcome`.
//! No I/O, suitable for unit tests, the batch CLI and the HTTP handlers alike.
//!
//! Order: field filter → sufficiency gate → normalize → combine (+ zero
//! fallback) → flatness gate → display scores → picks → tie jitter →
//! congestion → focus flag.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::composite::{combine, is_flat, with_field_fallback};
use crate::config::PipelineConfig;
use crate::congestion::{calc_congestion, Congestion};
use crate::display::build_display_scores;
use crate::indicator::{gated_normalize, is_valid_number, ScoreMap};
use crate::picks::{apply_tie_jitter, make_picks, Pick};
use crate::race::{RaceCard, RaceInput};
use crate::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Neither indicator source passed the sufficiency gate.
    NoData,
    /// Composite spread too narrow to rank meaningfully.
    Flat,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoData => "no_data",
            SkipReason::Flat => "flat",
        }
    }
}

/// How many points of each source survived the gate (0 = treated as absent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub primary: usize,
    pub secondary: usize,
}

/// Published record of one scored race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacePrediction {
    pub race_id: String,
    pub venue: Venue,
    pub race_no: u8,
    #[serde(default)]
    pub race_name: String,
    pub picks: Vec<Pick>,
    pub congestion: Congestion,
    pub focus: bool,
    /// Same number as `congestion.value`, kept flat for listing pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_score: Option<f64>,
    #[serde(default)]
    pub coverage: Coverage,
    #[serde(default)]
    pub jittered: bool,
}

impl RacePrediction {
    /// Horse numbers of the picks, best first.
    pub fn pick_numbers(&self) -> Vec<u8> {
        self.picks.iter().map(|p| p.number).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RaceOutcome {
    Scored(RacePrediction),
    Skipped { race_id: String, reason: SkipReason },
}

impl RaceOutcome {
    /// Should the race appear in published output?
    pub fn is_included(&self) -> bool {
        matches!(self, RaceOutcome::Scored(_))
    }

    pub fn race_id(&self) -> &str {
        match self {
            RaceOutcome::Scored(p) => &p.race_id,
            RaceOutcome::Skipped { race_id, .. } => race_id,
        }
    }

    pub fn prediction(&self) -> Option<&RacePrediction> {
        match self {
            RaceOutcome::Scored(p) => Some(p),
            RaceOutcome::Skipped { .. } => None,
        }
    }

    pub fn into_prediction(self) -> Option<RacePrediction> {
        match self {
            RaceOutcome::Scored(p) => Some(p),
            RaceOutcome::Skipped { .. } => None,
        }
    }
}

/// Keep entries that belong to a runner of this race and carry a finite value.
fn retain_field(raw: &ScoreMap, card: &RaceCard, source: &'static str) -> ScoreMap {
    let mut kept = ScoreMap::new();
    for (&n, &v) in raw {
        if !is_valid_number(n) || !card.has_horse(n) {
            warn!(race_id = %card.race_id, source, number = n, "dropping indicator for unknown horse");
            continue;
        }
        if !v.is_finite() {
            warn!(race_id = %card.race_id, source, number = n, "dropping non-finite indicator");
            continue;
        }
        kept.insert(n, v);
    }
    kept
}

fn skipped(card: &RaceCard, reason: SkipReason) -> RaceOutcome {
    debug!(race_id = %card.race_id, venue = %card.venue, reason = reason.as_str(), "race skipped");
    counter!("races_skipped_total", "reason" => reason.as_str()).increment(1);
    RaceOutcome::Skipped {
        race_id: card.race_id.clone(),
        reason,
    }
}

/// Score one race.
pub fn predict_race(input: &RaceInput, cfg: &PipelineConfig) -> RaceOutcome {
    let card = &input.card;
    let field = card.field();
    let field_size = field.len();

    let primary_raw = retain_field(&input.primary, card, "primary");
    let secondary_raw = retain_field(&input.secondary, card, "secondary");

    let primary = gated_normalize(&primary_raw, field_size, cfg.min_primary_points);
    let secondary = gated_normalize(&secondary_raw, field_size, cfg.min_secondary_points);
    let coverage = Coverage {
        primary: primary.len(),
        secondary: secondary.len(),
    };
    debug!(
        race_id = %card.race_id,
        field_size,
        primary = coverage.primary,
        secondary = coverage.secondary,
        "indicator coverage"
    );

    if cfg.skip_if_no_data && primary.is_empty() && secondary.is_empty() {
        return skipped(card, SkipReason::NoData);
    }

    let composite = with_field_fallback(
        combine(&primary, &secondary, &cfg.weights),
        field.iter().map(|h| h.number),
    );
    if is_flat(&composite, field_size, &cfg.flatness) {
        return skipped(card, SkipReason::Flat);
    }

    let scores = build_display_scores(&composite, &cfg.display);
    let mut picks = make_picks(
        &field,
        &scores.display,
        Some(&scores.compressed),
        cfg.display.score_min,
    );
    let jittered = apply_tie_jitter(&mut picks, &card.race_id, &cfg.jitter, &cfg.display);
    let congestion = calc_congestion(&picks, &card.race_id, &cfg.congestion);
    let focus = congestion.is_focus(&cfg.congestion);

    counter!("races_scored_total").increment(1);
    if focus {
        counter!("focus_races_total").increment(1);
    }
    debug!(
        race_id = %card.race_id,
        picks = picks.len(),
        congestion = ?congestion.value,
        focus,
        jittered,
        "race scored"
    );

    RaceOutcome::Scored(RacePrediction {
        race_id: card.race_id.clone(),
        venue: card.venue,
        race_no: card.race_no,
        race_name: card.race_name.clone(),
        focus_score: congestion.value,
        picks,
        congestion,
        focus,
        coverage,
        jittered,
    })
}

/// Score a batch of races, keeping input order.
pub fn predict_all(inputs: &[RaceInput], cfg: &PipelineConfig) -> Vec<RaceOutcome> {
    inputs.iter().map(|i| predict_race(i, cfg)).collect()
}
