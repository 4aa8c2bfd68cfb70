// src/store.rs
//! File layout of the batch jobs under one output directory:
//!
//! - `jra_predict_{date}_{venue}.json` / `.html`: one venue report
//! - `latest_jra_predict.json`: `{"date": ...}` of the last day written
//! - `result_jra_{date}_{venue}.json`: settled venue report
//! - `pnl_total_jra.json`: totals over every result file

use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::engine::{predict_all, RaceOutcome};
use crate::race::RaceInput;
use crate::report::{build_venue_reports, now_jst_iso, render_venue_html, VenueReport};
use crate::settlement::{settle_venue, PnlTotal, RaceResult, VenueResult};
use crate::venue::Venue;

pub const LATEST_FILE: &str = "latest_jra_predict.json";
pub const PNL_TOTAL_FILE: &str = "pnl_total_jra.json";
const PREDICT_PREFIX: &str = "jra_predict_";
const RESULT_PREFIX: &str = "result_jra_";

/// Input of `predict`: every race of one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictInput {
    pub date: String,
    pub races: Vec<RaceInput>,
}

impl PredictInput {
    /// Distinct venues on the card, in input order.
    pub fn venues(&self) -> Vec<Venue> {
        let mut out: Vec<Venue> = Vec::new();
        for r in &self.races {
            if !out.contains(&r.card.venue) {
                out.push(r.card.venue);
            }
        }
        out
    }
}

/// Input of `settle`: official results of one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultInput {
    pub date: String,
    pub results: Vec<RaceResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Latest {
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictSummary {
    pub scored: usize,
    pub skipped: usize,
    pub files: Vec<PathBuf>,
}

pub fn predict_file_name(date: &str, venue: Venue, ext: &str) -> String {
    format!("{PREDICT_PREFIX}{date}_{}.{ext}", venue.slug())
}

pub fn result_file_name(date: &str, venue: Venue) -> String {
    format!("{RESULT_PREFIX}{date}_{}.json", venue.slug())
}

pub fn validate_date(date: &str) -> Result<()> {
    ensure!(
        date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()),
        "date must be YYYYMMDD, got {date:?}"
    );
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Files in `dir` whose name starts with `prefix` and ends with `.json`, sorted.
fn list_json(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(".json") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn list_prediction_files(dir: &Path, date: &str) -> Result<Vec<PathBuf>> {
    list_json(dir, &format!("{PREDICT_PREFIX}{date}_"))
}

pub fn list_result_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_json(dir, RESULT_PREFIX)
}

/// Write JSON + HTML per venue; `latest` is only touched when something was written.
pub fn write_venue_reports(dir: &Path, reports: &[VenueReport]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();
    for r in reports {
        let json = dir.join(predict_file_name(&r.date, r.venue, "json"));
        write_json(&json, r)?;
        let html = dir.join(predict_file_name(&r.date, r.venue, "html"));
        write_text(&html, &render_venue_html(r))?;
        info!(venue = %r.venue, races = r.races.len(), path = %json.display(), "wrote venue report");
        written.push(json);
        written.push(html);
    }

    if let Some(first) = reports.first() {
        write_json(
            &dir.join(LATEST_FILE),
            &Latest {
                date: first.date.clone(),
            },
        )?;
    } else {
        info!("no venue reports, {LATEST_FILE} not updated");
    }
    Ok(written)
}

/// Score a day's input file and write the venue reports into `out_dir`.
pub fn predict_to_dir(input: &Path, out_dir: &Path, cfg: &AppConfig) -> Result<PredictSummary> {
    let day: PredictInput = read_json(input)?;
    validate_date(&day.date)?;

    let outcomes = predict_all(&day.races, &cfg.pipeline);
    let skipped = outcomes.iter().filter(|o| !o.is_included()).count();
    let predictions: Vec<_> = outcomes
        .into_iter()
        .filter_map(RaceOutcome::into_prediction)
        .collect();

    let reports = build_venue_reports(
        &day.date,
        &day.venues(),
        &predictions,
        &cfg.pipeline,
        &now_jst_iso(),
    );
    let files = write_venue_reports(out_dir, &reports)?;
    info!(date = %day.date, scored = predictions.len(), skipped, "prediction run finished");
    Ok(PredictSummary {
        scored: predictions.len(),
        skipped,
        files,
    })
}

/// Settle every prediction file of the results' date, then refresh the totals.
pub fn settle_to_dir(results: &Path, out_dir: &Path, cfg: &AppConfig) -> Result<Vec<PathBuf>> {
    let day: ResultInput = read_json(results)?;
    validate_date(&day.date)?;

    let pred_files = list_prediction_files(out_dir, &day.date)?;
    if pred_files.is_empty() {
        warn!(date = %day.date, dir = %out_dir.display(), "no prediction files for date");
        return Ok(Vec::new());
    }

    let generated_at = now_jst_iso();
    let mut written = Vec::new();
    for pf in pred_files {
        let report: VenueReport = read_json(&pf)?;
        let vr = settle_venue(&report, &day.results, &cfg.settlement, &generated_at);
        let path = out_dir.join(result_file_name(&day.date, vr.venue));
        write_json(&path, &vr)?;
        info!(venue = %vr.venue, profit = vr.pnl_summary.profit, path = %path.display(), "wrote venue result");
        written.push(path);
    }

    if let Some(total) = write_pnl_total(out_dir, &generated_at)? {
        info!(invest = total.invest, payout = total.payout, roi = total.roi, "updated totals");
    }
    Ok(written)
}

/// Aggregate every result file into `pnl_total_jra.json`. Unreadable files are skipped.
pub fn write_pnl_total(dir: &Path, last_updated: &str) -> Result<Option<PnlTotal>> {
    let files = list_result_files(dir)?;
    if files.is_empty() {
        warn!("no result files, {PNL_TOTAL_FILE} not written");
        return Ok(None);
    }
    let mut results: Vec<VenueResult> = Vec::with_capacity(files.len());
    for f in &files {
        match read_json::<VenueResult>(f) {
            Ok(v) => results.push(v),
            Err(e) => warn!(path = %f.display(), error = %e, "skipping unreadable result file"),
        }
    }
    let total = PnlTotal::aggregate(&results, last_updated);
    write_json(&dir.join(PNL_TOTAL_FILE), &total)?;
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_use_slug() {
        assert_eq!(
            predict_file_name("20260208", Venue::Tokyo, "html"),
            "jra_predict_20260208_tokyo.html"
        );
        assert_eq!(
            result_file_name("20260208", Venue::Kokura),
            "result_jra_20260208_kokura.json"
        );
    }

    #[test]
    fn date_validation() {
        assert!(validate_date("20260208").is_ok());
        assert!(validate_date("2026-02-08").is_err());
        assert!(validate_date("").is_err());
    }

    #[test]
    fn listing_filters_by_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "jra_predict_20260208_tokyo.json",
            "jra_predict_20260208_tokyo.html",
            "jra_predict_20260207_kyoto.json",
            "result_jra_20260207_kyoto.json",
            "latest_jra_predict.json",
        ] {
            fs::write(tmp.path().join(name), "{}").unwrap();
        }
        let preds = list_prediction_files(tmp.path(), "20260208").unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(list_result_files(tmp.path()).unwrap().len(), 1);
        assert!(list_result_files(&tmp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn no_reports_leaves_latest_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let files = write_venue_reports(tmp.path(), &[]).unwrap();
        assert!(files.is_empty());
        assert!(!tmp.path().join(LATEST_FILE).exists());
    }
}
