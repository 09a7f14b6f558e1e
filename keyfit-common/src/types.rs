//! Vehicle year-range and chip-field primitives
//!
//! **[KF-TYPE-010]** Shared value types used by both the web application and
//! the catalog-ingest service. External catalogs encode these inconsistently;
//! the parse rules here are the single place that inconsistency is absorbed.

use serde::{Deserialize, Serialize};

/// Inclusive vehicle model-year range.
///
/// `end == None` means the range is open-ended (the model is still in
/// production as far as the catalog knows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: Option<i32>,
}

/// Years outside this window are treated as catalog noise (OCR artifacts,
/// placeholder values) rather than real model years.
const MIN_MODEL_YEAR: i32 = 1900;
const MAX_MODEL_YEAR: i32 = 2100;

impl YearRange {
    pub fn bounded(start: i32, end: i32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn open(start: i32) -> Self {
        Self { start, end: None }
    }

    /// Inclusive overlap test: `[2010, 2012]` overlaps `[2009, 2015]` but
    /// not `[2016, 2020]`. An open end behaves as unbounded.
    pub fn overlaps(&self, other: &YearRange) -> bool {
        let self_end = self.end.unwrap_or(i32::MAX);
        let other_end = other.end.unwrap_or(i32::MAX);
        self.start <= other_end && other.start <= self_end
    }

    /// Gap in years between two ranges: 0 when they overlap. Used only for
    /// deterministic candidate ordering, not for match eligibility.
    pub fn distance(&self, other: &YearRange) -> i32 {
        if self.overlaps(other) {
            return 0;
        }
        let self_end = self.end.unwrap_or(i32::MAX);
        let other_end = other.end.unwrap_or(i32::MAX);
        if self.start > other_end {
            self.start - other_end
        } else {
            other.start - self_end
        }
    }

    /// Parse a catalog year-range string.
    ///
    /// Accepted forms: `"2018-2022"`, `"2018–2022"` (en dash), `"2018+"`,
    /// `"2018-present"`, `"2018-"`, `"2018"`. An inverted bounded range is
    /// repaired by swapping the endpoints. Returns `None` for anything that
    /// yields no usable year; the caller decides whether that degrades or
    /// rejects the record.
    pub fn parse(raw: &str) -> Option<YearRange> {
        let s = raw.trim().replace('\u{2013}', "-");
        if s.is_empty() {
            return None;
        }

        if let Some(rest) = s.strip_suffix('+') {
            return parse_year(rest).map(YearRange::open);
        }

        match s.split_once('-') {
            Some((lo, hi)) => {
                let start = parse_year(lo)?;
                let hi = hi.trim();
                if hi.is_empty() || hi.eq_ignore_ascii_case("present") || hi.eq_ignore_ascii_case("now") {
                    return Some(YearRange::open(start));
                }
                let end = parse_year(hi)?;
                if end < start {
                    Some(YearRange::bounded(end, start))
                } else {
                    Some(YearRange::bounded(start, end))
                }
            }
            None => parse_year(&s).map(|y| YearRange::bounded(y, y)),
        }
    }
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.trim().parse().ok()?;
    (MIN_MODEL_YEAR..=MAX_MODEL_YEAR).contains(&year).then_some(year)
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}+", self.start),
        }
    }
}

/// Chip/part list field as it arrives from external catalogs: sometimes a
/// delimited string (`"ID46, PCF7936"`), sometimes a JSON array.
///
/// **[KF-TYPE-020]** Resolved into tokens exactly once at this boundary;
/// downstream code only ever sees `Vec<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChipField {
    Flat(String),
    List(Vec<String>),
}

impl Default for ChipField {
    fn default() -> Self {
        ChipField::Flat(String::new())
    }
}

impl ChipField {
    /// Split into raw trimmed tokens. The second element reports whether a
    /// lossy fallback was used (a string that looks like a JSON array but
    /// fails to parse is kept whole as a single token rather than dropped).
    pub fn tokens(&self) -> (Vec<String>, bool) {
        match self {
            ChipField::List(items) => (clean_tokens(items.iter().map(String::as_str)), false),
            ChipField::Flat(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return (Vec::new(), false);
                }
                if s.starts_with('[') {
                    match serde_json::from_str::<Vec<String>>(s) {
                        Ok(items) => (clean_tokens(items.iter().map(String::as_str)), false),
                        Err(_) => (vec![s.to_string()], true),
                    }
                } else {
                    (
                        clean_tokens(s.split(|c| c == ',' || c == ';' || c == '/')),
                        false,
                    )
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChipField::Flat(s) => s.trim().is_empty(),
            ChipField::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }
}

fn clean_tokens<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_range_parses() {
        assert_eq!(YearRange::parse("2018-2022"), Some(YearRange::bounded(2018, 2022)));
        assert_eq!(YearRange::parse(" 2018 - 2022 "), Some(YearRange::bounded(2018, 2022)));
        assert_eq!(YearRange::parse("2018\u{2013}2022"), Some(YearRange::bounded(2018, 2022)));
    }

    #[test]
    fn open_range_parses() {
        assert_eq!(YearRange::parse("2018+"), Some(YearRange::open(2018)));
        assert_eq!(YearRange::parse("2018-present"), Some(YearRange::open(2018)));
        assert_eq!(YearRange::parse("2018-"), Some(YearRange::open(2018)));
    }

    #[test]
    fn single_year_is_one_year_range() {
        assert_eq!(YearRange::parse("2018"), Some(YearRange::bounded(2018, 2018)));
    }

    #[test]
    fn inverted_range_is_repaired() {
        assert_eq!(YearRange::parse("2022-2018"), Some(YearRange::bounded(2018, 2022)));
    }

    #[test]
    fn garbage_years_rejected() {
        assert_eq!(YearRange::parse(""), None);
        assert_eq!(YearRange::parse("unknown"), None);
        assert_eq!(YearRange::parse("18-22"), None);
        assert_eq!(YearRange::parse("9999"), None);
    }

    #[test]
    fn overlap_is_inclusive() {
        let scraped = YearRange::bounded(2010, 2012);
        assert!(scraped.overlaps(&YearRange::bounded(2009, 2015)));
        assert!(scraped.overlaps(&YearRange::bounded(2012, 2020)));
        assert!(!scraped.overlaps(&YearRange::bounded(2016, 2020)));
        assert!(!scraped.overlaps(&YearRange::bounded(2000, 2009)));
    }

    #[test]
    fn open_end_overlaps_forward() {
        let open = YearRange::open(2015);
        assert!(open.overlaps(&YearRange::bounded(2020, 2022)));
        assert!(!open.overlaps(&YearRange::bounded(2010, 2014)));
    }

    #[test]
    fn distance_is_zero_for_overlap_and_gap_otherwise() {
        let a = YearRange::bounded(2010, 2012);
        assert_eq!(a.distance(&YearRange::bounded(2011, 2015)), 0);
        assert_eq!(a.distance(&YearRange::bounded(2016, 2020)), 4);
        assert_eq!(a.distance(&YearRange::bounded(2000, 2005)), 5);
    }

    #[test]
    fn chip_field_delimited_string() {
        let (tokens, degraded) = ChipField::Flat("ID46, PCF7936".into()).tokens();
        assert_eq!(tokens, vec!["ID46", "PCF7936"]);
        assert!(!degraded);
    }

    #[test]
    fn chip_field_json_array_string() {
        let (tokens, degraded) = ChipField::Flat(r#"["ID46","PCF7936"]"#.into()).tokens();
        assert_eq!(tokens, vec!["ID46", "PCF7936"]);
        assert!(!degraded);
    }

    #[test]
    fn chip_field_malformed_json_degrades_to_single_token() {
        let (tokens, degraded) = ChipField::Flat(r#"["ID46", PCF7936"#.into()).tokens();
        assert_eq!(tokens.len(), 1);
        assert!(degraded);
    }

    #[test]
    fn chip_field_deserializes_from_string_or_array() {
        let flat: ChipField = serde_json::from_str(r#""ID46""#).unwrap();
        assert_eq!(flat, ChipField::Flat("ID46".into()));
        let list: ChipField = serde_json::from_str(r#"["ID46","4D63"]"#).unwrap();
        assert_eq!(list, ChipField::List(vec!["ID46".into(), "4D63".into()]));
    }
}
