// src/config.rs
//! Pipeline and settlement configuration.
//!
//! Layering: built-in defaults → optional file → environment overrides →
//! sanitize. The result is handed around immutably (`Arc<AppConfig>` in the
//! server, by reference everywhere else).
//!
//! File lookup:
//! 1) `$PICKS_CONFIG_PATH`
//! 2) `config/picks.toml`
//! 3) `config/picks.json`
//!
//! ```toml
//! [pipeline]
//! min_primary_points = 8
//!
//! [pipeline.display]
//! score_max = 70.0
//!
//! [settlement]
//! box_n = 5
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::composite::{BlendWeights, FlatnessParams};
use crate::congestion::CongestionParams;
use crate::display::DisplayParams;
use crate::picks::JitterParams;

pub const ENV_PATH: &str = "PICKS_CONFIG_PATH";
const DEFAULT_TOML: &str = "config/picks.toml";
const DEFAULT_JSON: &str = "config/picks.json";

fn default_min_points() -> usize {
    8
}
fn default_bet_unit() -> u64 {
    100
}
fn default_box_n() -> usize {
    5
}

/// Every knob of the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub weights: BlendWeights,
    #[serde(default = "default_min_points")]
    pub min_primary_points: usize,
    #[serde(default = "default_min_points")]
    pub min_secondary_points: usize,
    /// Skip races where neither source is usable instead of ranking a zero-filled field.
    #[serde(default)]
    pub skip_if_no_data: bool,
    #[serde(default)]
    pub flatness: FlatnessParams,
    #[serde(default)]
    pub display: DisplayParams,
    #[serde(default)]
    pub jitter: JitterParams,
    #[serde(default)]
    pub congestion: CongestionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: BlendWeights::default(),
            min_primary_points: default_min_points(),
            min_secondary_points: default_min_points(),
            skip_if_no_data: false,
            flatness: FlatnessParams::default(),
            display: DisplayParams::default(),
            jitter: JitterParams::default(),
            congestion: CongestionParams::default(),
        }
    }
}

/// Trio box betting used when settling focus races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Stake per ticket in yen.
    #[serde(default = "default_bet_unit")]
    pub bet_unit: u64,
    /// Number of leading picks boxed.
    #[serde(default = "default_box_n")]
    pub box_n: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            bet_unit: default_bet_unit(),
            box_n: default_box_n(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

impl AppConfig {
    /// Defaults + optional file + process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse a TOML or JSON file (by extension, falling back to content sniffing).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded pipeline config");
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|k| std::env::var(k).ok())
    }

    /// Apply `KEY=value` overrides from any lookup function.
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let p = &mut self.pipeline;
        set_f64(&get, "PRIMARY_W", &mut p.weights.primary)?;
        set_f64(&get, "SECONDARY_W", &mut p.weights.secondary)?;
        set_usize(&get, "MIN_PRIMARY_N", &mut p.min_primary_points)?;
        set_usize(&get, "MIN_SECONDARY_N", &mut p.min_secondary_points)?;
        set_flag(&get, "SKIP_IF_NO_DATA", &mut p.skip_if_no_data)?;

        set_flag(&get, "SKIP_FLAT_TOTAL", &mut p.flatness.enabled)?;
        set_f64(&get, "FLAT_RANGE_MAX", &mut p.flatness.max_range)?;
        set_usize(&get, "FLAT_MIN_COUNT", &mut p.flatness.min_sample_count)?;

        set_f64(&get, "SCORE_MIN", &mut p.display.score_min)?;
        set_f64(&get, "SCORE_MAX", &mut p.display.score_max)?;
        set_flag(&get, "COMPRESS_ENABLE", &mut p.display.compress_enabled)?;
        set_f64(&get, "COMPRESS_WIDTH", &mut p.display.compress_width)?;

        set_flag(&get, "TIE_JITTER_ENABLE", &mut p.jitter.enabled)?;
        set_f64(&get, "TIE_JITTER_MAX", &mut p.jitter.max)?;
        set_f64(&get, "TIE_JITTER_TRIGGER", &mut p.jitter.trigger_offset)?;

        set_f64(&get, "KONSEN_GAP12_MID", &mut p.congestion.gap12_mid)?;
        set_f64(&get, "KONSEN_GAP15_MID", &mut p.congestion.gap15_mid)?;
        set_f64(&get, "FOCUS_TH", &mut p.congestion.focus_threshold)?;
        set_flag(&get, "KONSEN_ZERO_FIX_ENABLE", &mut p.congestion.zero_fix_enabled)?;
        set_f64(&get, "KONSEN_ZERO_MIN", &mut p.congestion.zero_fix_min)?;
        set_f64(&get, "KONSEN_ZERO_MAX", &mut p.congestion.zero_fix_max)?;

        let s = &mut self.settlement;
        set_u64(&get, "BET_UNIT", &mut s.bet_unit)?;
        set_usize(&get, "BOX_N", &mut s.box_n)?;
        Ok(())
    }

    /// Repair values that would make the pipeline misbehave.
    pub fn sanitize(&mut self) {
        let p = &mut self.pipeline;
        let d = PipelineConfig::default();

        finite_or(&mut p.weights.primary, d.weights.primary);
        finite_or(&mut p.weights.secondary, d.weights.secondary);
        finite_or(&mut p.flatness.max_range, d.flatness.max_range);

        finite_or(&mut p.display.score_min, d.display.score_min);
        finite_or(&mut p.display.score_max, d.display.score_max);
        if p.display.score_min > p.display.score_max {
            std::mem::swap(&mut p.display.score_min, &mut p.display.score_max);
        }
        finite_or(&mut p.display.compress_width, d.display.compress_width);
        finite_or(&mut p.jitter.max, d.jitter.max);
        finite_or(&mut p.jitter.trigger_offset, d.jitter.trigger_offset);

        let c = &mut p.congestion;
        let dc = d.congestion;
        finite_or(&mut c.gap12_mid, dc.gap12_mid);
        finite_or(&mut c.gap15_mid, dc.gap15_mid);
        finite_or(&mut c.focus_threshold, dc.focus_threshold);
        finite_or(&mut c.zero_fix_min, dc.zero_fix_min);
        finite_or(&mut c.zero_fix_max, dc.zero_fix_max);
        if c.zero_fix_min > c.zero_fix_max {
            std::mem::swap(&mut c.zero_fix_min, &mut c.zero_fix_max);
        }
        finite_or(&mut c.extreme_at, dc.extreme_at);
        finite_or(&mut c.congested_at, dc.congested_at);
        finite_or(&mut c.somewhat_at, dc.somewhat_at);
        let mut th = [c.somewhat_at, c.congested_at, c.extreme_at];
        th.sort_by(f64::total_cmp);
        [c.somewhat_at, c.congested_at, c.extreme_at] = th;

        let s = &mut self.settlement;
        if s.bet_unit == 0 {
            s.bet_unit = default_bet_unit();
        }
        s.box_n = s.box_n.clamp(3, 18);
    }
}

/// Which config file to read, if any.
pub fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path {}", pb.display()));
    }
    for candidate in [DEFAULT_TOML, DEFAULT_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}

fn finite_or(v: &mut f64, fallback: f64) {
    if !v.is_finite() {
        *v = fallback;
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn set_flag<F: Fn(&str) -> Option<String>>(get: &F, key: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = parse_flag(&raw).ok_or_else(|| anyhow!("{key}: expected a flag, got {raw:?}"))?;
    }
    Ok(())
}

fn set_f64<F: Fn(&str) -> Option<String>>(get: &F, key: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: expected a number, got {raw:?}"))?;
    }
    Ok(())
}

fn set_usize<F: Fn(&str) -> Option<String>>(get: &F, key: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: expected a count, got {raw:?}"))?;
    }
    Ok(())
}

fn set_u64<F: Fn(&str) -> Option<String>>(get: &F, key: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: expected an amount, got {raw:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = AppConfig::default();
        assert_eq!(c.pipeline.weights.primary, 0.8);
        assert_eq!(c.pipeline.min_primary_points, 8);
        assert_eq!(c.pipeline.display.score_max, 70.0);
        assert_eq!(c.pipeline.congestion.focus_threshold, 30.0);
        assert!(!c.pipeline.skip_if_no_data);
        assert_eq!(c.settlement.bet_unit, 100);
        assert_eq!(c.settlement.box_n, 5);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let s = r#"
            [pipeline]
            min_secondary_points = 5

            [pipeline.display]
            score_max = 80.0

            [pipeline.congestion]
            somewhat_at = 40.0
        "#;
        let c = parse_config(s, "toml").unwrap();
        assert_eq!(c.pipeline.min_secondary_points, 5);
        assert_eq!(c.pipeline.min_primary_points, 8);
        assert_eq!(c.pipeline.display.score_max, 80.0);
        assert_eq!(c.pipeline.display.score_min, 1.0);
        assert_eq!(c.pipeline.congestion.somewhat_at, 40.0);
        assert_eq!(c.pipeline.congestion.gap12_mid, 0.8);
        assert_eq!(c.settlement, SettlementConfig::default());
    }

    #[test]
    fn json_sniffed_without_extension() {
        let c = parse_config(r#"{"settlement":{"box_n":6}}"#, "").unwrap();
        assert_eq!(c.settlement.box_n, 6);
        assert_eq!(c.settlement.bet_unit, 100);
    }

    #[test]
    fn env_overrides_apply() {
        let mut c = AppConfig::default();
        c.apply_overrides(env_of(&[
            ("PRIMARY_W", "0.7"),
            ("SKIP_FLAT_TOTAL", "0"),
            ("TIE_JITTER_ENABLE", "1"),
            ("FOCUS_TH", " 40 "),
            ("BOX_N", "4"),
        ]))
        .unwrap();
        assert_eq!(c.pipeline.weights.primary, 0.7);
        assert!(!c.pipeline.flatness.enabled);
        assert!(c.pipeline.jitter.enabled);
        assert_eq!(c.pipeline.congestion.focus_threshold, 40.0);
        assert_eq!(c.settlement.box_n, 4);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut c = AppConfig::default();
        let err = c
            .apply_overrides(env_of(&[("SCORE_MAX", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("SCORE_MAX"));
        let err = c
            .apply_overrides(env_of(&[("COMPRESS_ENABLE", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("COMPRESS_ENABLE"));
    }

    #[test]
    fn sanitize_repairs_ranges() {
        let mut c = AppConfig::default();
        c.pipeline.display.score_min = 90.0;
        c.pipeline.display.score_max = 10.0;
        c.pipeline.congestion.zero_fix_min = 9.0;
        c.pipeline.congestion.zero_fix_max = 2.0;
        c.pipeline.congestion.extreme_at = 20.0;
        c.pipeline.weights.primary = f64::NAN;
        c.settlement.bet_unit = 0;
        c.settlement.box_n = 1;
        c.sanitize();

        let p = &c.pipeline;
        assert_eq!((p.display.score_min, p.display.score_max), (10.0, 90.0));
        assert_eq!((p.congestion.zero_fix_min, p.congestion.zero_fix_max), (2.0, 9.0));
        assert_eq!(p.congestion.somewhat_at, 20.0);
        assert_eq!(p.congestion.congested_at, 30.0);
        assert_eq!(p.congestion.extreme_at, 60.0);
        assert_eq!(p.weights.primary, 0.8);
        assert_eq!(c.settlement.bet_unit, 100);
        assert_eq!(c.settlement.box_n, 3);
    }
}
