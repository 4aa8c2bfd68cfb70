//! # Settlement
//! Checks published picks against official results and books a trio
//! (三連複) box bet on every focus race.
//!
//! - `pred_hit`: all three finishers are among the predicted top five.
//! - box bet: the first `box_n` picks, every ascending 3-combination, one
//!   `bet_unit` ticket each. A hit needs all three finishers inside the box
//!   and a known positive payout.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::config::SettlementConfig;
use crate::congestion::Congestion;
use crate::indicator::HorseNumber;
use crate::picks::{round1, Pick, MAX_PICKS};
use crate::report::{format_ymd, VenueReport};
use crate::venue::Venue;

/// One of the first three finishers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finisher {
    pub rank: u8,
    pub number: HorseNumber,
    #[serde(default)]
    pub name: String,
}

/// Official trio payout for 100 yen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrioPayout {
    #[serde(default)]
    pub combo: String,
    pub payout_per_100: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    pub race_id: String,
    #[serde(default)]
    pub top3: Vec<Finisher>,
    #[serde(default)]
    pub trio: Option<TrioPayout>,
}

impl RaceResult {
    /// Finisher numbers in rank order; `None` unless exactly three distinct
    /// valid numbers are known.
    pub fn top3_numbers(&self) -> Option<[HorseNumber; 3]> {
        let mut f: Vec<&Finisher> = self.top3.iter().filter(|f| f.number > 0).collect();
        f.sort_by_key(|f| f.rank);
        match f.as_slice() {
            [a, b, c] if a.number != b.number && b.number != c.number && a.number != c.number => {
                Some([a.number, b.number, c.number])
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxBet {
    pub is_focus: bool,
    pub unit: u64,
    pub box_n: usize,
    pub tickets: usize,
    pub invest: u64,
    pub payout: u64,
    pub profit: i64,
    pub hit: bool,
    pub result_top3: Vec<HorseNumber>,
    pub combos: Vec<[HorseNumber; 3]>,
    #[serde(default)]
    pub trio: Option<TrioPayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSettlement {
    pub race_id: String,
    pub race_no: u8,
    #[serde(default)]
    pub race_name: String,
    pub congestion: Congestion,
    pub focus: bool,
    pub pred_top5: Vec<Pick>,
    pub result_top3: Vec<Finisher>,
    pub pred_hit: bool,
    pub bet_box: BoxBet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    pub invest: u64,
    pub payout: u64,
    pub profit: i64,
    pub hits: u32,
    pub focus_races: u32,
    /// payout / invest, percent.
    pub roi: f64,
    /// hits / focus races, percent.
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueResult {
    pub date: String,
    pub venue: Venue,
    pub title: String,
    pub races: Vec<RaceSettlement>,
    pub pnl_summary: PnlSummary,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredStat {
    pub races: u32,
    pub hits: u32,
    pub hit_rate: f64,
}

/// Running totals over every settled venue-day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlTotal {
    pub invest: u64,
    pub payout: u64,
    pub profit: i64,
    /// Focus races bet on.
    pub races: u32,
    pub hits: u32,
    pub pred_races: u32,
    pub pred_hits: u32,
    pub pred_hit_rate: f64,
    /// Keyed by venue slug.
    pub pred_by_venue: BTreeMap<String, PredStat>,
    pub roi: f64,
    pub hit_rate: f64,
    pub last_updated: String,
}

fn pct(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        round1(num / den * 100.0)
    } else {
        0.0
    }
}

fn signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Ascending, de-duplicated 3-combinations of `numbers`.
pub fn trio_box_combos(numbers: &[HorseNumber]) -> Vec<[HorseNumber; 3]> {
    let mut nums: Vec<HorseNumber> = numbers.iter().copied().filter(|&n| n > 0).collect();
    nums.sort_unstable();
    nums.dedup();

    let mut out = Vec::new();
    for i in 0..nums.len() {
        for j in i + 1..nums.len() {
            for k in j + 1..nums.len() {
                out.push([nums[i], nums[j], nums[k]]);
            }
        }
    }
    out
}

/// Trio payout for a winning ticket at `unit` yen.
pub fn scaled_payout(payout_per_100: u64, unit: u64) -> u64 {
    (payout_per_100 as f64 * unit as f64 / 100.0).round() as u64
}

/// Settle one race of a published report.
pub fn settle_race(
    pred: &crate::engine::RacePrediction,
    result: Option<&RaceResult>,
    cfg: &SettlementConfig,
) -> RaceSettlement {
    let pred_top5: Vec<Pick> = pred.picks.iter().take(MAX_PICKS).cloned().collect();
    let top5_nums: Vec<HorseNumber> = pred_top5.iter().map(|p| p.number).collect();
    let top3 = result.and_then(RaceResult::top3_numbers);

    let pred_hit = match top3 {
        Some(t) if top5_nums.len() >= 3 => t.iter().all(|n| top5_nums.contains(n)),
        _ => false,
    };

    let box_nums: Vec<HorseNumber> = top5_nums.iter().copied().take(cfg.box_n).collect();
    let combos = trio_box_combos(&box_nums);
    let trio = result.and_then(|r| r.trio.clone());

    let mut invest = 0;
    let mut payout = 0;
    let mut hit = false;
    if pred.focus && !combos.is_empty() {
        invest = cfg.bet_unit.saturating_mul(combos.len() as u64);
        let in_box = top3.is_some_and(|t| t.iter().all(|n| box_nums.contains(n)));
        if let Some(p) = trio.as_ref().filter(|p| in_box && p.payout_per_100 > 0) {
            payout = scaled_payout(p.payout_per_100, cfg.bet_unit);
            hit = true;
        }
    }
    debug!(race_id = %pred.race_id, pred_hit, hit, invest, payout, "race settled");

    RaceSettlement {
        race_id: pred.race_id.clone(),
        race_no: pred.race_no,
        race_name: pred.race_name.clone(),
        congestion: pred.congestion.clone(),
        focus: pred.focus,
        pred_top5,
        result_top3: result.map(|r| r.top3.clone()).unwrap_or_default(),
        pred_hit,
        bet_box: BoxBet {
            is_focus: pred.focus,
            unit: cfg.bet_unit,
            box_n: cfg.box_n,
            tickets: combos.len(),
            invest,
            payout,
            profit: signed(payout) - signed(invest),
            hit,
            result_top3: top3.map(|t| t.to_vec()).unwrap_or_default(),
            combos,
            trio,
        },
    }
}

impl PnlSummary {
    pub fn from_races(races: &[RaceSettlement]) -> Self {
        let mut s = PnlSummary::default();
        for r in races.iter().filter(|r| r.bet_box.invest > 0) {
            s.focus_races += 1;
            s.invest = s.invest.saturating_add(r.bet_box.invest);
            s.payout = s.payout.saturating_add(r.bet_box.payout);
            if r.bet_box.hit {
                s.hits += 1;
            }
        }
        s.profit = signed(s.payout) - signed(s.invest);
        s.roi = pct(s.payout as f64, s.invest as f64);
        s.hit_rate = pct(f64::from(s.hits), f64::from(s.focus_races));
        s
    }
}

/// Settle every race of a venue report against the day's results.
pub fn settle_venue(
    report: &VenueReport,
    results: &[RaceResult],
    cfg: &SettlementConfig,
    generated_at: &str,
) -> VenueResult {
    let by_id: HashMap<&str, &RaceResult> =
        results.iter().map(|r| (r.race_id.as_str(), r)).collect();

    let races: Vec<RaceSettlement> = report
        .races
        .iter()
        .map(|p| {
            let res = by_id.get(p.race_id.as_str()).copied();
            if res.is_none() {
                warn!(race_id = %p.race_id, venue = %report.venue, "no result for race");
            }
            settle_race(p, res, cfg)
        })
        .collect();

    VenueResult {
        date: report.date.clone(),
        venue: report.venue,
        title: format!("{} {}競馬 結果", format_ymd(&report.date), report.venue.ja_name()),
        pnl_summary: PnlSummary::from_races(&races),
        races,
        generated_at: generated_at.to_string(),
    }
}

impl PnlTotal {
    /// Sum venue results; prediction hit rates count races with a known top three.
    pub fn aggregate<'a, I>(results: I, last_updated: &str) -> Self
    where
        I: IntoIterator<Item = &'a VenueResult>,
    {
        let mut t = PnlTotal {
            last_updated: last_updated.to_string(),
            ..PnlTotal::default()
        };
        for vr in results {
            let s = &vr.pnl_summary;
            t.invest = t.invest.saturating_add(s.invest);
            t.payout = t.payout.saturating_add(s.payout);
            t.races += s.focus_races;
            t.hits += s.hits;

            let slot = t.pred_by_venue.entry(vr.venue.slug().to_string()).or_default();
            for r in vr.races.iter().filter(|r| r.bet_box.result_top3.len() == 3) {
                t.pred_races += 1;
                slot.races += 1;
                if r.pred_hit {
                    t.pred_hits += 1;
                    slot.hits += 1;
                }
            }
            slot.hit_rate = pct(f64::from(slot.hits), f64::from(slot.races));
        }
        t.profit = signed(t.payout) - signed(t.invest);
        t.roi = pct(t.payout as f64, t.invest as f64);
        t.hit_rate = pct(f64::from(t.hits), f64::from(t.races));
        t.pred_hit_rate = pct(f64::from(t.pred_hits), f64::from(t.pred_races));
        t
    }
}
