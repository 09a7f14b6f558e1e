//! Run summary for a catalog sync

use crate::types::ReconciliationResult;

/// Ambiguous record carried into the run report for manual review.
#[derive(Debug, Clone)]
pub struct AmbiguousReport {
    pub make: String,
    pub model: String,
    pub years: String,
    pub source: String,
    /// `model year-range (similarity)` summaries of the tied candidates
    pub candidates: Vec<String>,
}

/// Counters for one sync run. A record lands in exactly one of
/// created/updated/unchanged/ambiguous/errors; `degraded` counts records
/// that needed a fallback parse on top of whichever bucket they landed in.
#[derive(Debug, Default)]
pub struct SyncStats {
    pub source: String,
    pub scraped: u32,
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub ambiguous: u32,
    pub errors: u32,
    pub degraded: u32,
    pub ambiguous_records: Vec<AmbiguousReport>,
}

impl SyncStats {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    /// Tally one classification.
    pub fn record(&mut self, result: &ReconciliationResult) {
        match result {
            ReconciliationResult::Created(_) => self.created += 1,
            ReconciliationResult::Updated { .. } => self.updated += 1,
            ReconciliationResult::NoChange(_) => self.unchanged += 1,
            ReconciliationResult::Ambiguous {
                make,
                model,
                years,
                source,
                candidates,
            } => {
                self.ambiguous += 1;
                self.ambiguous_records.push(AmbiguousReport {
                    make: make.clone(),
                    model: model.clone(),
                    years: years.clone(),
                    source: source.clone(),
                    candidates: candidates
                        .iter()
                        .map(|c| format!("{} {} ({:.2})", c.model, c.years, c.similarity))
                        .collect(),
                });
            }
        }
    }

    /// Fold another run's counters into this one (used by `sync --source all`).
    pub fn merge(&mut self, other: SyncStats) {
        self.scraped += other.scraped;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.ambiguous += other.ambiguous;
        self.errors += other.errors;
        self.degraded += other.degraded;
        self.ambiguous_records.extend(other.ambiguous_records);
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Catalog sync: {} ===", self.source)?;
        writeln!(f, "Records scraped: {}", self.scraped)?;
        writeln!(f, "Created:         {}", self.created)?;
        writeln!(f, "Updated:         {}", self.updated)?;
        writeln!(f, "Unchanged:       {}", self.unchanged)?;
        writeln!(f, "Ambiguous:       {}", self.ambiguous)?;
        writeln!(f, "Errors:          {}", self.errors)?;
        writeln!(f, "Degraded parses: {}", self.degraded)?;
        if !self.ambiguous_records.is_empty() {
            writeln!(f, "\nAmbiguous records requiring review:")?;
            for report in &self.ambiguous_records {
                writeln!(
                    f,
                    "  {} {} {} ({}) -> {}",
                    report.make,
                    report.model,
                    report.years,
                    report.source,
                    report.candidates.join(", ")
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfit_common::db::records::CanonicalRecord;

    #[test]
    fn each_result_lands_in_one_bucket() {
        let mut stats = SyncStats::new("transpondery");
        stats.record(&ReconciliationResult::Created(CanonicalRecord::new(
            "TOYOTA", "CAMRY", 2018,
        )));
        stats.record(&ReconciliationResult::NoChange(uuid::Uuid::new_v4()));

        assert_eq!(stats.created, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.updated + stats.ambiguous + stats.errors, 0);
    }

    #[test]
    fn summary_lists_ambiguous_records() {
        let mut stats = SyncStats::new("uhs");
        stats.record(&ReconciliationResult::Ambiguous {
            make: "TOYOTA".to_string(),
            model: "CAMRY".to_string(),
            years: "2012-2013".to_string(),
            source: "uhs".to_string(),
            candidates: Vec::new(),
        });

        let rendered = stats.to_string();
        assert!(rendered.contains("Ambiguous:       1"));
        assert!(rendered.contains("TOYOTA CAMRY 2012-2013 (uhs)"));
    }
}
