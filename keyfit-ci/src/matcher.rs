//! Candidate matching against the canonical dataset
//!
//! **[CIN-MATCH-010]** Exact key lookup on (make, model) with year-range
//! overlap, falling back to normalized edit-distance similarity across
//! models of the same make. Candidate order is fully deterministic so
//! repeated runs classify identically.

use std::collections::HashMap;

use keyfit_common::db::records::CanonicalRecord;
use keyfit_common::types::YearRange;

use crate::types::{MatchCandidate, NormalizedRecord, ReconciliationResult};

/// In-memory snapshot of the canonical dataset for one reconciliation run,
/// keyed by (make, model).
#[derive(Debug, Default)]
pub struct CanonicalIndex {
    by_key: HashMap<(String, String), Vec<CanonicalRecord>>,
}

impl CanonicalIndex {
    pub fn from_records(records: Vec<CanonicalRecord>) -> Self {
        let mut by_key: HashMap<(String, String), Vec<CanonicalRecord>> = HashMap::new();
        for record in records {
            by_key
                .entry((record.make.clone(), record.model.clone()))
                .or_default()
                .push(record);
        }
        Self { by_key }
    }

    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn bucket(&self, make: &str, model: &str) -> Option<&[CanonicalRecord]> {
        self.by_key
            .get(&(make.to_string(), model.to_string()))
            .map(Vec::as_slice)
    }

    fn buckets_for_make<'a, 's>(
        &'a self,
        make: &'s str,
    ) -> impl Iterator<Item = (&'a str, &'a [CanonicalRecord])> + use<'a, 's> {
        self.by_key
            .iter()
            .filter(move |((m, _), _)| m == make)
            .map(|((_, model), records)| (model.as_str(), records.as_slice()))
    }

    /// Fold a classification back into the working snapshot so later records
    /// of the same run reconcile against it. Conflict resolution is
    /// order-independent, so this keeps multi-source runs deterministic.
    pub fn apply(&mut self, result: &ReconciliationResult) {
        match result {
            ReconciliationResult::Created(record) => {
                self.by_key
                    .entry((record.make.clone(), record.model.clone()))
                    .or_default()
                    .push(record.clone());
            }
            ReconciliationResult::Updated { guid, record, .. } => {
                if let Some(bucket) = self
                    .by_key
                    .get_mut(&(record.make.clone(), record.model.clone()))
                {
                    if let Some(existing) = bucket.iter_mut().find(|r| r.guid == *guid) {
                        *existing = record.clone();
                    }
                }
            }
            ReconciliationResult::NoChange(_) | ReconciliationResult::Ambiguous { .. } => {}
        }
    }
}

/// Finds canonical candidates for a normalized scraped record.
pub struct CandidateMatcher {
    /// Minimum similarity (0-1) for a fuzzy model-name candidate
    similarity_threshold: f64,
}

impl CandidateMatcher {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Find candidates ordered by descending similarity. Returns an empty
    /// list (not an error) when nothing qualifies — that signals "new
    /// record" to the engine.
    ///
    /// When the exact (make, model) key exists, only same-key entries are
    /// considered: a known model with non-overlapping years is a new
    /// generation, not a fuzzy match onto some other model.
    pub fn find_candidates<'a>(
        &self,
        record: &NormalizedRecord,
        index: &'a CanonicalIndex,
    ) -> Vec<MatchCandidate<'a>> {
        let mut candidates: Vec<MatchCandidate<'a>> =
            match index.bucket(&record.make, &record.model) {
                Some(bucket) => bucket
                    .iter()
                    .filter(|cand| year_qualifies(record.years, cand))
                    .map(|cand| MatchCandidate {
                        record: cand,
                        similarity: 1.0,
                    })
                    .collect(),
                None => index
                    .buckets_for_make(&record.make)
                    .flat_map(|(model, bucket)| {
                        let similarity = strsim::normalized_levenshtein(&record.model, model);
                        bucket.iter().map(move |cand| MatchCandidate {
                            record: cand,
                            similarity,
                        })
                    })
                    .filter(|c| c.similarity >= self.similarity_threshold)
                    .filter(|c| year_qualifies(record.years, c.record))
                    .collect(),
            };

        sort_candidates(record, &mut candidates);
        candidates
    }
}

/// Inclusive year-range overlap, with the open-ended guard: a scraped record
/// carrying no usable year range only matches canonical entries whose end is
/// itself open. This keeps a current catalog listing from silently matching
/// a long-discontinued model.
fn year_qualifies(scraped: Option<YearRange>, candidate: &CanonicalRecord) -> bool {
    match scraped {
        Some(range) => range.overlaps(&candidate.years()),
        None => candidate.year_end.is_none(),
    }
}

/// Deterministic candidate order: similarity desc, then year-range distance
/// asc, then model string, then year_start.
fn sort_candidates(record: &NormalizedRecord, candidates: &mut [MatchCandidate<'_>]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                year_distance(record.years, a.record).cmp(&year_distance(record.years, b.record))
            })
            .then_with(|| a.record.model.cmp(&b.record.model))
            .then_with(|| a.record.year_start.cmp(&b.record.year_start))
    });
}

fn year_distance(scraped: Option<YearRange>, candidate: &CanonicalRecord) -> i32 {
    match scraped {
        Some(range) => range.distance(&candidate.years()),
        None => 0,
    }
}
