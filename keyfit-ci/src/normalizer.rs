//! Text normalization for scraped catalog records
//!
//! **[CIN-NORM-010]** Total, pure, idempotent. Malformed input degrades to a
//! best-effort single-token result; nothing in here returns an error or
//! panics on catalog garbage.

use keyfit_common::types::{ChipField, YearRange};

use crate::types::{NormalizedRecord, RawScrapedRecord};

/// Known manufacturer aliases, keyed on the already-normalized form.
///
/// Data, not branching logic: extend the table, not the code. Every
/// right-hand side must normalize to itself so that `canonical_make` stays
/// idempotent.
const MAKE_SYNONYMS: &[(&str, &str)] = &[
    ("VW", "VOLKSWAGEN"),
    ("CHEVY", "CHEVROLET"),
    ("CHEV", "CHEVROLET"),
    ("MERCEDES", "MERCEDES-BENZ"),
    ("MERCEDES BENZ", "MERCEDES-BENZ"),
    ("MB", "MERCEDES-BENZ"),
    ("LANDROVER", "LAND ROVER"),
    ("ALFA", "ALFA ROMEO"),
    ("GM", "GENERAL MOTORS"),
];

/// Uppercase, collapse internal whitespace, strip trailing punctuation.
/// Idempotent: applying it twice changes nothing.
pub fn normalize_name(raw: &str) -> String {
    let mut s: String = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    while s
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '-') || c.is_whitespace())
    {
        s.pop();
    }
    s
}

/// Normalize a make and resolve known aliases to the canonical spelling.
pub fn canonical_make(raw: &str) -> String {
    let normalized = normalize_name(raw);
    for (alias, canonical) in MAKE_SYNONYMS {
        if normalized == *alias {
            return (*canonical).to_string();
        }
    }
    normalized
}

/// Resolve a chip/part field into sorted, deduplicated, normalized tokens.
/// The bool reports whether a lossy fallback parse was used.
pub fn normalize_list_field(field: &ChipField) -> (Vec<String>, bool) {
    let (raw_tokens, degraded) = field.tokens();
    let mut tokens: Vec<String> = raw_tokens
        .iter()
        .map(|t| normalize_name(t))
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort();
    tokens.dedup();
    (tokens, degraded)
}

/// Normalize one raw scraped record. Total: every raw record yields a
/// normalized one, with `degraded` set when a fallback parse was needed.
pub fn normalize(raw: &RawScrapedRecord) -> NormalizedRecord {
    let mut degraded = false;

    let (chip_types, chip_degraded) = normalize_list_field(&raw.chip);
    degraded |= chip_degraded;

    let compatible_parts = match &raw.parts {
        Some(field) => {
            let (parts, parts_degraded) = normalize_list_field(field);
            degraded |= parts_degraded;
            parts
        }
        None => Vec::new(),
    };

    let years = YearRange::parse(&raw.years);
    if years.is_none() && !raw.years.trim().is_empty() {
        degraded = true;
    }

    NormalizedRecord {
        make: canonical_make(&raw.make),
        model: normalize_name(&raw.model),
        years,
        chip_types,
        compatible_parts,
        transponder_type: clean_optional(&raw.transponder_type),
        frequency: clean_optional(&raw.frequency),
        notes: clean_optional(&raw.notes),
        source: raw.source.trim().to_lowercase(),
        degraded,
    }
}

fn clean_optional(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
