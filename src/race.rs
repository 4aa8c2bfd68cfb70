//! race.rs: race card records handed to the pipeline by the scraping side.
//!
//! A card is created once from an entry list and never mutated by scoring;
//! the pipeline reads it together with the two raw indicator maps.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::indicator::{HorseNumber, ScoreMap};
use crate::venue::Venue;

/// One runner of the field. Name and jockey are opaque to the scoring math.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horse {
    pub number: HorseNumber,
    pub name: String,
    #[serde(default, deserialize_with = "de_jockey")]
    pub jockey: String,
}

impl Horse {
    pub fn new(number: HorseNumber, name: impl Into<String>, jockey: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            jockey: clean_jockey_name(&jockey.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceCard {
    pub race_id: String,
    /// `YYYYMMDD`
    #[serde(default)]
    pub date: String,
    pub venue: Venue,
    pub race_no: u8,
    #[serde(default, deserialize_with = "de_race_name")]
    pub race_name: String,
    pub horses: Vec<Horse>,
}

impl RaceCard {
    /// Build a card; horses end up ordered by number with duplicates removed.
    pub fn new(
        race_id: impl Into<String>,
        date: impl Into<String>,
        venue: Venue,
        race_no: u8,
        race_name: &str,
        horses: Vec<Horse>,
    ) -> Self {
        let mut card = Self {
            race_id: race_id.into(),
            date: date.into(),
            venue,
            race_no,
            race_name: normalize_race_name(race_name),
            horses,
        };
        card.horses = card.field();
        card
    }

    /// The field ordered by horse number, one entry per number.
    pub fn field(&self) -> Vec<Horse> {
        let mut horses = self.horses.clone();
        horses.sort_by_key(|h| h.number);
        horses.dedup_by_key(|h| h.number);
        horses
    }

    pub fn field_size(&self) -> usize {
        self.field().len()
    }

    pub fn has_horse(&self, number: HorseNumber) -> bool {
        self.horses.iter().any(|h| h.number == number)
    }
}

/// Everything the pipeline needs for one race: the card plus both raw
/// indicator maps (either may be empty or partial).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceInput {
    pub card: RaceCard,
    #[serde(default)]
    pub primary: ScoreMap,
    #[serde(default)]
    pub secondary: ScoreMap,
}

static RE_TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(出馬表|レース結果|レース情報|予想)\s*$").expect("title suffix regex")
});
static RE_MULTI_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace regex"));

/// Clean a race name scraped from a page title or heading.
///
/// Keeps the part before `|`, drops a trailing page-kind word
/// (出馬表 / レース結果 / レース情報 / 予想), turns full-width digits into
/// ASCII and collapses whitespace runs.
pub fn normalize_race_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some((head, _)) = s.split_once('|') {
        s = head.trim();
    }
    let s = RE_TITLE_SUFFIX.replace(s, "");
    let s: String = s
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect();
    RE_MULTI_WS.replace_all(&s, " ").trim().to_string()
}

fn de_jockey<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(clean_jockey_name(&String::deserialize(d)?))
}

fn de_race_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(normalize_race_name(&String::deserialize(d)?))
}

/// Strip prediction-mark glyphs that some pages print next to jockey names.
pub fn clean_jockey_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '◎' | '〇' | '▲' | '△' | '☆' | '★' | '◆' | '◇' | '■' | '□'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_name_drops_site_suffix_and_page_kind() {
        assert_eq!(
            normalize_race_name("東京新聞杯 出馬表 | 2026年2月8日 東京11R レース情報(JRA) - netkeiba"),
            "東京新聞杯"
        );
        assert_eq!(normalize_race_name("  ３歳未勝利   予想 "), "3歳未勝利");
        assert_eq!(normalize_race_name("きさらぎ賞  (G3)"), "きさらぎ賞 (G3)");
        assert_eq!(normalize_race_name(""), "");
    }

    #[test]
    fn jockey_marks_removed() {
        assert_eq!(clean_jockey_name("◎ルメール"), "ルメール");
        assert_eq!(clean_jockey_name(" ☆戸崎圭 "), "戸崎圭");
    }

    #[test]
    fn card_orders_and_dedups_field() {
        let card = RaceCard::new(
            "202605010211",
            "20260208",
            Venue::Tokyo,
            11,
            "東京新聞杯",
            vec![
                Horse::new(3, "C", "c"),
                Horse::new(1, "A", "a"),
                Horse::new(3, "C2", "c"),
                Horse::new(2, "B", "b"),
            ],
        );
        let nums: Vec<_> = card.horses.iter().map(|h| h.number).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(card.field_size(), 3);
        assert!(card.has_horse(2));
        assert!(!card.has_horse(9));
    }

    #[test]
    fn race_input_accepts_numeric_string_keys() {
        let js = r#"{
            "card": {"race_id":"x","venue":"東京","race_no":1,"horses":[{"number":1,"name":"A"}]},
            "primary": {"1": 80.5},
            "secondary": {}
        }"#;
        let input: RaceInput = serde_json::from_str(js).unwrap();
        assert_eq!(input.primary.get(&1), Some(&80.5));
        assert!(input.secondary.is_empty());
        assert_eq!(input.card.venue, Venue::Tokyo);
    }

    #[test]
    fn deserialized_names_are_cleaned() {
        let js = r#"{"race_id":"x","venue":"tokyo","race_no":1,
            "race_name":"東京新聞杯 出馬表 | netkeiba",
            "horses":[{"number":1,"name":"A","jockey":"▲横山武"}]}"#;
        let card: RaceCard = serde_json::from_str(js).unwrap();
        assert_eq!(card.race_name, "東京新聞杯");
        assert_eq!(card.horses[0].jockey, "横山武");
    }
}
