//! Per-record reconciliation state machine
//!
//! **[CIN-REC-010]** Every scraped record terminates in exactly one of
//! Created / Updated / NoChange / Ambiguous. Records are classified
//! independently; the only cross-record coupling is the working index fold,
//! which is safe because conflict resolution is order-independent.

use keyfit_common::db::records::CanonicalRecord;
use tracing::debug;

use crate::config::CiConfig;
use crate::error::{CiError, CiResult};
use crate::matcher::{CandidateMatcher, CanonicalIndex};
use crate::normalizer;
use crate::resolver::{self, SourcePriority};
use crate::types::{
    AmbiguousCandidate, MatchCandidate, NormalizedRecord, RawScrapedRecord, ReconciliationResult,
};

/// Classification of one record plus whether normalization degraded.
pub struct Reconciled {
    pub result: ReconciliationResult,
    pub degraded: bool,
}

pub struct ReconciliationEngine {
    matcher: CandidateMatcher,
    priority: SourcePriority,
    /// Two candidates whose similarity differs by no more than this are
    /// considered indistinguishable, which makes the record ambiguous.
    ambiguity_margin: f64,
}

impl ReconciliationEngine {
    pub fn new(config: &CiConfig) -> Self {
        Self {
            matcher: CandidateMatcher::new(config.similarity_threshold),
            priority: config.source_priority(),
            ambiguity_margin: config.ambiguity_margin,
        }
    }

    /// Classify one scraped record against the canonical snapshot.
    ///
    /// Errors only when the record carries no usable key (empty make/model,
    /// or a brand-new record without a parseable year range); such records
    /// count against the run's error tally, they never abort it.
    pub fn reconcile(
        &self,
        raw: &RawScrapedRecord,
        index: &CanonicalIndex,
    ) -> CiResult<Reconciled> {
        let record = normalizer::normalize(raw);

        if record.make.is_empty() || record.model.is_empty() {
            return Err(CiError::Parse(format!(
                "record from '{}' has no usable make/model (make: {:?}, model: {:?})",
                record.source, raw.make, raw.model
            )));
        }

        let candidates = self.matcher.find_candidates(&record, index);
        debug!(
            make = %record.make,
            model = %record.model,
            source = %record.source,
            candidates = candidates.len(),
            "Classifying scraped record"
        );

        let result = match candidates.len() {
            0 => ReconciliationResult::Created(self.build_record(&record)?),
            1 => self.merge(&record, &candidates[0]),
            _ => {
                let margin = candidates[0].similarity - candidates[1].similarity;
                if margin > self.ambiguity_margin {
                    self.merge(&record, &candidates[0])
                } else {
                    self.ambiguous(&record, raw, &candidates)
                }
            }
        };

        Ok(Reconciled {
            result,
            degraded: record.degraded,
        })
    }

    fn merge(
        &self,
        record: &NormalizedRecord,
        candidate: &MatchCandidate<'_>,
    ) -> ReconciliationResult {
        let outcome = resolver::resolve(candidate.record, record, &self.priority);
        if outcome.changed_fields.is_empty() {
            ReconciliationResult::NoChange(candidate.record.guid)
        } else {
            let mut merged = outcome.record;
            merged.confidence = candidate.similarity.max(candidate.record.confidence);
            ReconciliationResult::Updated {
                guid: candidate.record.guid,
                record: merged,
                changed_fields: outcome.changed_fields,
            }
        }
    }

    fn ambiguous(
        &self,
        record: &NormalizedRecord,
        raw: &RawScrapedRecord,
        candidates: &[MatchCandidate<'_>],
    ) -> ReconciliationResult {
        let top = candidates[0].similarity;
        ReconciliationResult::Ambiguous {
            make: record.make.clone(),
            model: record.model.clone(),
            years: raw.years.clone(),
            source: record.source.clone(),
            candidates: candidates
                .iter()
                .take_while(|c| top - c.similarity <= self.ambiguity_margin)
                .map(|c| AmbiguousCandidate {
                    guid: c.record.guid,
                    model: c.record.model.clone(),
                    years: c.record.years(),
                    similarity: c.similarity,
                })
                .collect(),
        }
    }

    /// Build a brand-new canonical record from a scraped one.
    fn build_record(&self, record: &NormalizedRecord) -> CiResult<CanonicalRecord> {
        let Some(years) = record.years else {
            return Err(CiError::Parse(format!(
                "cannot create a canonical record for {} {} without a usable year range",
                record.make, record.model
            )));
        };

        Ok(CanonicalRecord {
            year_end: years.end,
            transponder_type: record.transponder_type.clone().unwrap_or_default(),
            chip_types: record.chip_types.clone(),
            compatible_parts: record.compatible_parts.clone(),
            frequency: record.frequency.clone(),
            notes: record.notes.clone(),
            non_transponder: false,
            source: Some(record.source.clone()),
            confidence: 1.0,
            ..CanonicalRecord::new(record.make.clone(), record.model.clone(), years.start)
        })
    }
}
