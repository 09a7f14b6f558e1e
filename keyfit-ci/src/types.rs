//! Base types for the catalog-ingest pipeline
//!
//! **[CIN-OV-020]** A scrape run flows RawScrapedRecord → NormalizedRecord →
//! MatchCandidate → ReconciliationResult. Nothing upstream of
//! ReconciliationResult is ever persisted.

use keyfit_common::db::records::CanonicalRecord;
use keyfit_common::types::{ChipField, YearRange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scraped compatibility record exactly as a source adapter produced it:
/// uninterpreted fields plus a source tag. Ephemeral — consumed once by the
/// pipeline, never stored.
///
/// This is also the on-disk interchange format for cached batches
/// (a JSON array of these objects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScrapedRecord {
    pub make: String,
    pub model: String,
    /// Year-range string as it appeared in the catalog ("2018-2022", "2018+")
    #[serde(default)]
    pub years: String,
    /// Chip identifiers: delimited string or array
    #[serde(default)]
    pub chip: ChipField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transponder_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// OEM part numbers: delimited string or array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<ChipField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Tag of the catalog this record came from ("transpondery", "uhs", ...)
    pub source: String,
}

/// A scraped record after normalization: canonical casing, parsed year
/// range, chip/part fields resolved to sorted token lists.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub make: String,
    pub model: String,
    /// `None` when the catalog gave no usable year range; such a record can
    /// still match open-ended canonical entries but cannot create a new one.
    pub years: Option<YearRange>,
    pub chip_types: Vec<String>,
    pub compatible_parts: Vec<String>,
    pub transponder_type: Option<String>,
    pub frequency: Option<String>,
    pub notes: Option<String>,
    pub source: String,
    /// True when any field needed a lossy fallback parse
    pub degraded: bool,
}

/// A canonical record proposed as a match for an incoming scraped record,
/// with its similarity score. Lives for a single reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub record: &'a CanonicalRecord,
    /// 1.0 for an exact key match, normalized edit-distance similarity
    /// otherwise
    pub similarity: f64,
}

/// Terminal classification of one scraped record. Consumed by the caller to
/// either apply a store upsert or surface a manual-review item; never stored.
#[derive(Debug, Clone)]
pub enum ReconciliationResult {
    /// No candidate qualified; a new canonical record was built
    Created(CanonicalRecord),
    /// Exactly one winning candidate and the merge changed at least one field
    Updated {
        guid: Uuid,
        record: CanonicalRecord,
        changed_fields: Vec<&'static str>,
    },
    /// Exactly one winning candidate and the merge changed nothing
    NoChange(Uuid),
    /// Two or more candidates with comparable similarity; requires human
    /// resolution, never auto-applied
    Ambiguous {
        make: String,
        model: String,
        years: String,
        source: String,
        candidates: Vec<AmbiguousCandidate>,
    },
}

/// Candidate summary carried into the run report for manual review.
#[derive(Debug, Clone)]
pub struct AmbiguousCandidate {
    pub guid: Uuid,
    pub model: String,
    pub years: YearRange,
    pub similarity: f64,
}
