//! Per-venue prediction records and their HTML rendering.
//!
//! One `VenueReport` per racecourse and day; races sorted by race number.
//! The record echoes the scoring settings so a published file can be read
//! without the config that produced it.

use chrono::{FixedOffset, Utc};
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::engine::RacePrediction;
use crate::picks::MAX_PICKS;
use crate::venue::Venue;

const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub score_decimals: u8,
    pub congestion_decimals: u8,
}

/// Scoring settings echoed into every published record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub gap12_mid: f64,
    pub gap15_mid: f64,
    pub focus_threshold: f64,
    pub score_range: [f64; 2],
    pub compress: Toggle,
    pub tie_jitter: Toggle,
    pub zero_fix: Toggle,
    pub format: NumberFormat,
}

impl ReportSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            gap12_mid: cfg.congestion.gap12_mid,
            gap15_mid: cfg.congestion.gap15_mid,
            focus_threshold: cfg.congestion.focus_threshold,
            score_range: [cfg.display.score_min, cfg.display.score_max],
            compress: Toggle {
                enabled: cfg.display.compress_enabled,
                width: Some(cfg.display.compress_width),
                max: None,
                min: None,
            },
            tie_jitter: Toggle {
                enabled: cfg.jitter.enabled,
                width: None,
                max: Some(cfg.jitter.max),
                min: None,
            },
            zero_fix: Toggle {
                enabled: cfg.congestion.zero_fix_enabled,
                width: None,
                max: Some(cfg.congestion.zero_fix_max),
                min: Some(cfg.congestion.zero_fix_min),
            },
            format: NumberFormat {
                score_decimals: 2,
                congestion_decimals: 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueReport {
    /// `YYYYMMDD`
    pub date: String,
    pub venue: Venue,
    pub title: String,
    pub settings: ReportSettings,
    pub races: Vec<RacePrediction>,
    pub generated_at: String,
}

/// `YYYYMMDD` → `YYYY.MM.DD`; anything else is returned unchanged.
pub fn format_ymd(date: &str) -> String {
    if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}.{}.{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}

pub fn predict_title(date: &str, venue: Venue) -> String {
    format!("{} {}競馬 予想", format_ymd(date), venue.ja_name())
}

/// Local (JST) timestamp without offset, e.g. `2026-02-08T09:30:00`.
pub fn now_jst_iso() -> String {
    let now = Utc::now();
    match FixedOffset::east_opt(JST_OFFSET_SECS) {
        Some(tz) => now.with_timezone(&tz).format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

/// Group scored races by venue; venues come out in calendar-list order.
///
/// Every venue in `venues` gets a report, with an empty race list when none of
/// its races was scored.
pub fn build_venue_reports(
    date: &str,
    venues: &[Venue],
    predictions: &[RacePrediction],
    cfg: &PipelineConfig,
    generated_at: &str,
) -> Vec<VenueReport> {
    let mut by_venue: BTreeMap<Venue, Vec<RacePrediction>> =
        venues.iter().map(|&v| (v, Vec::new())).collect();
    for p in predictions {
        by_venue.entry(p.venue).or_default().push(p.clone());
    }

    let settings = ReportSettings::from_config(cfg);
    by_venue
        .into_iter()
        .map(|(venue, mut races)| {
            races.sort_by_key(|r| r.race_no);
            VenueReport {
                date: date.to_string(),
                venue,
                title: predict_title(date, venue),
                settings: settings.clone(),
                races,
                generated_at: generated_at.to_string(),
            }
        })
        .collect()
}

const BADGE_FOCUS: &str = r#"<span style="display:inline-block;padding:3px 10px;border-radius:999px;background:#111827;color:#fff;font-weight:800;font-size:12px;">注目</span>"#;
const TH: &str = r#"<thead><tr style="text-align:left;border-bottom:1px solid #e5e7eb;"><th style="padding:8px 6px;width:46px;">印</th><th style="padding:8px 6px;width:56px;">馬番</th><th style="padding:8px 6px;">馬名</th><th style="padding:8px 6px;width:90px;text-align:right;">指数</th></tr></thead><tbody>"#;

fn congestion_badge(r: &RacePrediction) -> String {
    match r.congestion.value {
        Some(v) => format!(
            r#"<span style="display:inline-block;padding:3px 10px;border-radius:999px;background:#eef2ff;color:#1f2937;font-weight:800;font-size:12px;">混戦度 {v:.1}（{}）</span>"#,
            r.congestion.label.ja()
        ),
        None => String::new(),
    }
}

/// Self-contained HTML block for one venue page.
pub fn render_venue_html(report: &VenueReport) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(r#"<div style="max-width: 980px; margin: 0 auto; line-height: 1.7;">"#.into());
    parts.push(format!(
        r#"<h2 style="margin: 12px 0 8px; font-size: 20px; font-weight: 900;">{}</h2>"#,
        encode_text(&report.title)
    ));
    parts.push(
        r#"<div style="font-size: 12px; opacity: .85; margin-bottom: 10px;">※ 混戦度は各レースの指数から算出</div>"#
            .into(),
    );

    for r in &report.races {
        let focus = if r.focus { BADGE_FOCUS } else { "" };
        parts.push(r#"<div style="margin: 16px 0 18px; padding: 12px 12px; border: 1px solid #e5e7eb; border-radius: 14px; background: #ffffff;">"#.into());
        parts.push(r#"<div style="display:flex;align-items:center;justify-content:space-between;gap:10px;flex-wrap:wrap;">"#.into());
        parts.push(format!(
            r#"<div style="font-size:18px;font-weight:900;color:#111827;">{}R {}</div>"#,
            r.race_no,
            encode_text(&r.race_name)
        ));
        parts.push(format!(
            r#"<div style="display:flex;gap:8px;align-items:center;justify-content:flex-end;flex-wrap:wrap;">{focus}{}</div>"#,
            congestion_badge(r)
        ));
        parts.push("</div>".into());

        parts.push(
            r#"<table style="width:100%;border-collapse:collapse;margin-top:10px;font-size:14px;">"#
                .into(),
        );
        parts.push(TH.into());
        for p in r.picks.iter().take(MAX_PICKS) {
            parts.push(format!(
                concat!(
                    r#"<tr style="border-bottom:1px solid #f1f5f9;">"#,
                    r#"<td style="padding:8px 6px;font-weight:900;">{}</td>"#,
                    r#"<td style="padding:8px 6px;">{}</td>"#,
                    r#"<td style="padding:8px 6px;">{}</td>"#,
                    r#"<td style="padding:8px 6px;text-align:right;font-weight:900;">{:.2}</td>"#,
                    "</tr>"
                ),
                encode_text(&p.mark),
                p.number,
                encode_text(&p.name),
                p.score
            ));
        }
        parts.push("</tbody></table>".into());
        parts.push("</div>".into());
    }

    parts.push("</div>".into());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::{Congestion, CongestionLabel};
    use crate::engine::Coverage;
    use crate::picks::Pick;

    fn pred(venue: Venue, race_no: u8, focus: bool) -> RacePrediction {
        RacePrediction {
            race_id: format!("{}-{race_no}", venue.slug()),
            venue,
            race_no,
            race_name: format!("{race_no}R <特別>"),
            picks: vec![Pick {
                mark: "◎".into(),
                number: 7,
                name: "A&B".into(),
                jockey: String::new(),
                score: 65.5,
                raw: Some(90.1),
            }],
            congestion: Congestion {
                value: Some(42.0),
                label: CongestionLabel::SomewhatCongested,
                gap12: Some(0.3),
                gap15: Some(1.2),
            },
            focus,
            focus_score: Some(42.0),
            coverage: Coverage::default(),
            jittered: false,
        }
    }

    #[test]
    fn groups_by_venue_and_sorts_races() {
        let preds = vec![
            pred(Venue::Kyoto, 11, true),
            pred(Venue::Tokyo, 3, false),
            pred(Venue::Kyoto, 2, false),
        ];
        let reports = build_venue_reports(
            "20260208",
            &[],
            &preds,
            &PipelineConfig::default(),
            "2026-02-08T09:00:00",
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].venue, Venue::Tokyo);
        assert_eq!(reports[1].venue, Venue::Kyoto);
        let nos: Vec<_> = reports[1].races.iter().map(|r| r.race_no).collect();
        assert_eq!(nos, vec![2, 11]);
        assert_eq!(reports[1].title, "2026.02.08 京都競馬 予想");
        assert_eq!(reports[0].settings.score_range, [1.0, 70.0]);
        assert_eq!(reports[0].settings.zero_fix.min, Some(1.2));
    }

    #[test]
    fn venue_without_scored_races_gets_empty_report() {
        let reports = build_venue_reports(
            "20260208",
            &[Venue::Kokura, Venue::Tokyo],
            &[pred(Venue::Tokyo, 1, false)],
            &PipelineConfig::default(),
            "t",
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].venue, Venue::Tokyo);
        assert_eq!(reports[1].venue, Venue::Kokura);
        assert!(reports[1].races.is_empty());
        assert_eq!(reports[1].title, "2026.02.08 小倉競馬 予想");
        assert!(render_venue_html(&reports[1]).contains("小倉競馬"));
    }

    #[test]
    fn html_escapes_and_shows_badges() {
        let reports = build_venue_reports(
            "20260208",
            &[Venue::Hanshin],
            &[pred(Venue::Hanshin, 11, true)],
            &PipelineConfig::default(),
            "t",
        );
        let html = render_venue_html(&reports[0]);
        assert!(html.contains("11R 11R &lt;特別&gt;"));
        assert!(html.contains("A&amp;B"));
        assert!(html.contains("注目"));
        assert!(html.contains("混戦度 42.0（やや混戦）"));
        assert!(html.contains(">65.50<"));
    }

    #[test]
    fn unknown_congestion_has_no_badge() {
        let mut p = pred(Venue::Tokyo, 1, false);
        p.congestion = Congestion::unknown();
        let reports = build_venue_reports("20260208", &[], &[p], &PipelineConfig::default(), "t");
        let html = render_venue_html(&reports[0]);
        assert!(!html.contains("混戦度 "));
        assert!(!html.contains("注目</span>"));
    }

    #[test]
    fn ymd_formatting() {
        assert_eq!(format_ymd("20260208"), "2026.02.08");
        assert_eq!(format_ymd("2026-02-08"), "2026-02-08");
    }
}
