//! Run orchestration: adapter stream → engine → transactional apply
//!
//! **[CIN-REC-020]** A run never aborts on a bad record — item errors are
//! counted and the stream keeps draining. The store is only touched at the
//! end, inside one transaction: either the whole batch of Created/Updated
//! results commits or none of it does. Ambiguous results are never applied.

use futures::StreamExt;
use sqlx::SqlitePool;
use tracing::{info, warn};

use keyfit_common::db::records;

use crate::config::CiConfig;
use crate::engine::ReconciliationEngine;
use crate::error::CiResult;
use crate::matcher::CanonicalIndex;
use crate::sources::{json_file, SourceAdapter};
use crate::stats::SyncStats;
use crate::types::{RawScrapedRecord, ReconciliationResult};
use crate::validator::{self, ValidationIssue};

#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Classify and summarize without writing to the store
    pub dry_run: bool,
    /// Write the scraped batch to this path in the interchange format
    pub dump_path: Option<std::path::PathBuf>,
}

/// Run one reconciliation pass for one source and apply the results.
pub async fn run_source_sync(
    pool: &SqlitePool,
    adapter: &dyn SourceAdapter,
    config: &CiConfig,
    options: &SyncOptions,
) -> CiResult<SyncStats> {
    info!(source = adapter.name(), "Starting catalog sync");

    let canonical = records::list_all(pool).await?;
    let mut index = CanonicalIndex::from_records(canonical);
    info!(records = index.len(), "Loaded canonical snapshot");

    let engine = ReconciliationEngine::new(config);
    let mut stats = SyncStats::new(adapter.name());
    let mut to_apply: Vec<ReconciliationResult> = Vec::new();
    let mut dump: Vec<RawScrapedRecord> = Vec::new();

    let mut stream = adapter.stream();
    while let Some(item) = stream.next().await {
        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = adapter.name(), error = %e, "Adapter item failed");
                stats.errors += 1;
                continue;
            }
        };

        stats.scraped += 1;
        if options.dump_path.is_some() {
            dump.push(raw.clone());
        }

        match engine.reconcile(&raw, &index) {
            Ok(reconciled) => {
                if reconciled.degraded {
                    stats.degraded += 1;
                    warn!(
                        make = %raw.make,
                        model = %raw.model,
                        source = %raw.source,
                        "Record parsed with a lossy fallback"
                    );
                }
                // Fold into the working snapshot so later records of this
                // run reconcile against the already-classified state
                index.apply(&reconciled.result);
                stats.record(&reconciled.result);
                to_apply.push(reconciled.result);
            }
            Err(e) => {
                warn!(source = adapter.name(), error = %e, "Record rejected");
                stats.errors += 1;
            }
        }
    }
    drop(stream);

    if let Some(path) = &options.dump_path {
        json_file::write_batch(path, &dump).await?;
        info!(path = %path.display(), records = dump.len(), "Wrote batch dump");
    }

    if options.dry_run {
        info!(source = adapter.name(), "Dry run: store untouched");
    } else {
        let applied = apply_batch(pool, &to_apply).await?;
        info!(source = adapter.name(), applied, "Applied reconciliation batch");
    }

    Ok(stats)
}

/// Apply Created/Updated results inside a single transaction. NoChange and
/// Ambiguous results are skipped; the latter go to manual review instead.
pub async fn apply_batch(pool: &SqlitePool, results: &[ReconciliationResult]) -> CiResult<u32> {
    let mut tx = pool.begin().await?;
    let mut applied = 0u32;

    for result in results {
        let record = match result {
            ReconciliationResult::Created(record) => record,
            ReconciliationResult::Updated { record, .. } => record,
            ReconciliationResult::NoChange(_) | ReconciliationResult::Ambiguous { .. } => continue,
        };
        records::save_record(&mut *tx, record).await?;
        applied += 1;
    }

    tx.commit().await?;
    Ok(applied)
}

/// Independent structural scan of the whole canonical dataset.
pub async fn validate_store(pool: &SqlitePool) -> CiResult<Vec<ValidationIssue>> {
    let rows = records::list_all_rows(pool).await?;
    info!(records = rows.len(), "Validating canonical dataset");
    Ok(validator::validate_rows(&rows))
}
