//! Field-wise conflict resolution between a canonical record and an
//! incoming scraped record
//!
//! **[CIN-FUSE-010]** Merge policy is per field, not per record: additive
//! list fields are unioned, descriptive fields are overwritten only by a
//! strictly higher-priority non-empty source, and year ranges widen but
//! never narrow. Given fixed priorities the merge is deterministic and
//! order-independent across any sequence of two-way merges.

use std::collections::HashMap;

use keyfit_common::db::records::CanonicalRecord;

use crate::types::NormalizedRecord;

/// Priority rank a canonical record falls back to when its provenance is
/// unknown (hand-entered rows, rows predating provenance tracking).
const UNKNOWN_PROVENANCE_RANK: u32 = 10;

/// Explicit, inspectable source-priority table. Higher rank wins. Replaces
/// any implicit ordering by which catalog happens to be scraped first.
#[derive(Debug, Clone)]
pub struct SourcePriority {
    ranks: HashMap<String, u32>,
}

impl SourcePriority {
    /// Default ranking: transpondery over uhs over unknown provenance.
    pub fn default_table() -> Self {
        let mut ranks = HashMap::new();
        ranks.insert("transpondery".to_string(), 30);
        ranks.insert("uhs".to_string(), 20);
        Self { ranks }
    }

    pub fn with_rank(mut self, source: &str, rank: u32) -> Self {
        self.ranks.insert(source.to_lowercase(), rank);
        self
    }

    pub fn rank_of(&self, source: Option<&str>) -> u32 {
        source
            .map(str::to_lowercase)
            .and_then(|s| self.ranks.get(&s).copied())
            .unwrap_or(UNKNOWN_PROVENANCE_RANK)
    }
}

/// Result of a merge: the merged record plus the names of the data fields
/// that actually changed. Provenance columns are deliberately excluded from
/// `changed_fields` so an unchanged merge classifies as NoChange.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record: CanonicalRecord,
    pub changed_fields: Vec<&'static str>,
}

/// Merge an incoming scraped record into a canonical one.
pub fn resolve(
    canonical: &CanonicalRecord,
    incoming: &NormalizedRecord,
    priority: &SourcePriority,
) -> MergeOutcome {
    let mut record = canonical.clone();
    let mut changed: Vec<&'static str> = Vec::new();

    let canonical_rank = priority.rank_of(canonical.source.as_deref());
    let incoming_rank = priority.rank_of(Some(&incoming.source));
    let outranks = incoming_rank > canonical_rank;

    // Additive list fields: union regardless of priority. Broadening the
    // set of known-compatible chips/parts is safe; narrowing it is not.
    if union_into(&mut record.chip_types, &incoming.chip_types) {
        changed.push("chip_types");
    }
    if union_into(&mut record.compatible_parts, &incoming.compatible_parts) {
        changed.push("compatible_parts");
    }

    // Descriptive fields: a higher-priority non-empty value overwrites; any
    // non-empty value fills an empty slot.
    if let Some(value) = &incoming.transponder_type {
        if record.transponder_type.is_empty() || (outranks && *value != record.transponder_type) {
            record.transponder_type = value.clone();
            changed.push("transponder_type");
        }
    }
    if overwrite_optional(&mut record.frequency, &incoming.frequency, outranks) {
        changed.push("frequency");
    }
    if overwrite_optional(&mut record.notes, &incoming.notes, outranks) {
        changed.push("notes");
    }

    // year_end widens (later year, or open-ended) but never narrows; the
    // natural-key year_start is never touched.
    if let Some(years) = incoming.years {
        let widened = match (record.year_end, years.end) {
            (Some(_), None) => Some(None),
            (Some(current), Some(new)) if new > current => Some(Some(new)),
            _ => None,
        };
        if let Some(new_end) = widened {
            record.year_end = new_end;
            changed.push("year_end");
        }
    }

    // Provenance moves to the incoming source only when it outranked the
    // previous contributor and actually changed something.
    if !changed.is_empty() && outranks {
        record.source = Some(incoming.source.clone());
    }

    MergeOutcome {
        record,
        changed_fields: changed,
    }
}

/// Union `incoming` into `existing`, keeping the result sorted and
/// deduplicated. Returns true when anything was added (or when sorting the
/// existing list changed its encoding, so legacy unsorted rows converge).
fn union_into(existing: &mut Vec<String>, incoming: &[String]) -> bool {
    let before = existing.clone();
    existing.extend(incoming.iter().cloned());
    existing.sort();
    existing.dedup();
    *existing != before
}

fn overwrite_optional(
    current: &mut Option<String>,
    incoming: &Option<String>,
    outranks: bool,
) -> bool {
    let Some(value) = incoming else {
        return false;
    };
    let take = match current.as_deref() {
        None => true,
        Some(existing) => outranks && existing != value,
    };
    if take {
        *current = Some(value.clone());
    }
    take
}
