//! Canonical transponder-compatibility record persistence
//!
//! **[KF-DB-020]** CRUD for the authoritative compatibility table. The
//! reconciliation engine in keyfit-ci is the only writer of the `source` and
//! `confidence` provenance columns; the web application only reads them.
//!
//! Chip and part lists are stored as JSON array TEXT columns. Reads are
//! lenient (a legacy flat-string column value degrades to a single token);
//! the validator reports such rows, it does not repair them.

use crate::types::{ChipField, YearRange};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// The authoritative compatibility entry for a make/model/year range.
///
/// Natural key: `(make, model, year_start)`. `year_end == None` means the
/// model is still in production.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub guid: Uuid,
    pub make: String,
    pub model: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
    pub transponder_type: String,
    pub chip_types: Vec<String>,
    pub compatible_parts: Vec<String>,
    pub frequency: Option<String>,
    pub notes: Option<String>,
    /// Explicit marker for mechanical-key vehicles; only then may
    /// `chip_types` be empty.
    pub non_transponder: bool,
    /// Name of the catalog that last won a merge for this record.
    pub source: Option<String>,
    /// Similarity of the match that last touched this record.
    pub confidence: f64,
}

impl CanonicalRecord {
    pub fn new(make: impl Into<String>, model: impl Into<String>, year_start: i32) -> Self {
        Self {
            guid: Uuid::new_v4(),
            make: make.into(),
            model: model.into(),
            year_start,
            year_end: None,
            transponder_type: String::new(),
            chip_types: Vec::new(),
            compatible_parts: Vec::new(),
            frequency: None,
            notes: None,
            non_transponder: false,
            source: None,
            confidence: 0.0,
        }
    }

    pub fn years(&self) -> YearRange {
        YearRange {
            start: self.year_start,
            end: self.year_end,
        }
    }
}

/// Raw row form of a canonical record, with the JSON list columns left
/// undecoded. Used by the validator so malformed column values stay visible.
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub guid: String,
    pub make: String,
    pub model: String,
    pub year_start: i64,
    pub year_end: Option<i64>,
    pub chip_types: String,
    pub compatible_parts: String,
    pub non_transponder: bool,
}

/// Save a record, updating in place when the natural key already exists.
/// Idempotent: re-running the same save is a no-op apart from `updated_at`.
pub async fn save_record<'e, E>(executor: E, record: &CanonicalRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO transponder_records (
            guid, make, model, year_start, year_end, transponder_type,
            chip_types, compatible_parts, frequency, notes, non_transponder,
            source, confidence, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(make, model, year_start) DO UPDATE SET
            year_end = excluded.year_end,
            transponder_type = excluded.transponder_type,
            chip_types = excluded.chip_types,
            compatible_parts = excluded.compatible_parts,
            frequency = excluded.frequency,
            notes = excluded.notes,
            non_transponder = excluded.non_transponder,
            source = excluded.source,
            confidence = excluded.confidence,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(record.guid.to_string())
    .bind(&record.make)
    .bind(&record.model)
    .bind(record.year_start)
    .bind(record.year_end)
    .bind(&record.transponder_type)
    .bind(encode_list(&record.chip_types))
    .bind(encode_list(&record.compatible_parts))
    .bind(&record.frequency)
    .bind(&record.notes)
    .bind(record.non_transponder)
    .bind(&record.source)
    .bind(record.confidence)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a record by its natural key.
pub async fn find_by_key(
    pool: &SqlitePool,
    make: &str,
    model: &str,
    year_start: i32,
) -> Result<Option<CanonicalRecord>> {
    let row = sqlx::query(
        r#"
        SELECT guid, make, model, year_start, year_end, transponder_type,
               chip_types, compatible_parts, frequency, notes, non_transponder,
               source, confidence
        FROM transponder_records
        WHERE make = ? AND model = ? AND year_start = ?
        "#,
    )
    .bind(make)
    .bind(model)
    .bind(year_start)
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

/// Load all records, ordered by natural key for deterministic iteration.
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<CanonicalRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, make, model, year_start, year_end, transponder_type,
               chip_types, compatible_parts, frequency, notes, non_transponder,
               source, confidence
        FROM transponder_records
        ORDER BY make, model, year_start
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}

/// Load all records in raw row form (JSON columns undecoded), for the
/// validator.
pub async fn list_all_rows(pool: &SqlitePool) -> Result<Vec<RecordRow>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, make, model, year_start, year_end, chip_types,
               compatible_parts, non_transponder
        FROM transponder_records
        ORDER BY make, model, year_start
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RecordRow {
            guid: row.get("guid"),
            make: row.get("make"),
            model: row.get("model"),
            year_start: row.get("year_start"),
            year_end: row.get("year_end"),
            chip_types: row.get("chip_types"),
            compatible_parts: row.get("compatible_parts"),
            non_transponder: row.get("non_transponder"),
        })
        .collect())
}

fn record_from_row(row: SqliteRow) -> Result<CanonicalRecord> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("Malformed record guid '{guid_str}': {e}")))?;

    let year_start: i64 = row.get("year_start");
    let year_end: Option<i64> = row.get("year_end");

    Ok(CanonicalRecord {
        guid,
        make: row.get("make"),
        model: row.get("model"),
        year_start: year_start as i32,
        year_end: year_end.map(|y| y as i32),
        transponder_type: row.get("transponder_type"),
        chip_types: decode_list(row.get("chip_types")),
        compatible_parts: decode_list(row.get("compatible_parts")),
        frequency: row.get("frequency"),
        notes: row.get("notes"),
        non_transponder: row.get("non_transponder"),
        source: row.get("source"),
        confidence: row.get("confidence"),
    })
}

fn encode_list(list: &[String]) -> String {
    // Serializing a Vec<String> cannot fail
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

/// Lenient decode of a JSON list column: malformed values degrade to
/// best-effort tokens instead of failing the read. The validator is the
/// place that reports them.
fn decode_list(raw: String) -> Vec<String> {
    let (tokens, _) = ChipField::Flat(raw).tokens();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        // Single connection: each sqlite::memory: connection is its own db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::create_tables(&pool).await.unwrap();
        pool
    }

    fn sample_record() -> CanonicalRecord {
        CanonicalRecord {
            year_end: Some(2022),
            transponder_type: "Texas Crypto DST80".to_string(),
            chip_types: vec!["H".to_string()],
            compatible_parts: vec!["89785-0D140".to_string()],
            frequency: Some("315 MHz".to_string()),
            source: Some("transpondery".to_string()),
            confidence: 1.0,
            ..CanonicalRecord::new("TOYOTA", "CAMRY", 2018)
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = setup_pool().await;
        let record = sample_record();
        save_record(&pool, &record).await.unwrap();

        let loaded = find_by_key(&pool, "TOYOTA", "CAMRY", 2018)
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn upsert_on_natural_key_is_idempotent() {
        let pool = setup_pool().await;
        let record = sample_record();
        save_record(&pool, &record).await.unwrap();

        // Same natural key from a later run: updates in place, keeps the guid
        let mut newer = sample_record();
        newer.chip_types = vec!["G".to_string(), "H".to_string()];
        save_record(&pool, &newer).await.unwrap();

        let all = list_all(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].guid, record.guid);
        assert_eq!(all[0].chip_types, vec!["G", "H"]);
    }

    #[tokio::test]
    async fn list_all_orders_by_natural_key() {
        let pool = setup_pool().await;
        save_record(&pool, &CanonicalRecord::new("TOYOTA", "COROLLA", 2014))
            .await
            .unwrap();
        save_record(&pool, &CanonicalRecord::new("HONDA", "CIVIC", 2016))
            .await
            .unwrap();
        save_record(&pool, &CanonicalRecord::new("TOYOTA", "CAMRY", 2018))
            .await
            .unwrap();

        let keys: Vec<(String, String)> = list_all(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.make, r.model))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("HONDA".to_string(), "CIVIC".to_string()),
                ("TOYOTA".to_string(), "CAMRY".to_string()),
                ("TOYOTA".to_string(), "COROLLA".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_list_column_degrades_on_read() {
        let pool = setup_pool().await;
        sqlx::query(
            r#"
            INSERT INTO transponder_records (guid, make, model, year_start, chip_types)
            VALUES (?, 'FORD', 'F-150', 2015, 'ID63')
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .execute(&pool)
        .await
        .unwrap();

        let loaded = find_by_key(&pool, "FORD", "F-150", 2015)
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(loaded.chip_types, vec!["ID63"]);
    }
}
