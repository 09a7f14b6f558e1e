//! Cached-batch adapter: replays a scraped batch from disk
//!
//! The interchange format is a JSON array of raw scraped records. `sync
//! --dump` writes it, this adapter reads it back — for debugging a run
//! without hammering the catalogs, and for one-off imports.

use std::path::{Path, PathBuf};

use async_stream::stream;

use crate::error::CiError;
use crate::sources::{RecordStream, SourceAdapter};
use crate::types::RawScrapedRecord;

pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceAdapter for JsonFileAdapter {
    fn name(&self) -> &str {
        "file"
    }

    fn stream(&self) -> RecordStream<'_> {
        Box::pin(stream! {
            let content = match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => content,
                Err(e) => {
                    yield Err(CiError::Adapter(format!(
                        "Failed to read batch file {}: {e}",
                        self.path.display()
                    )));
                    return;
                }
            };

            let records: Vec<RawScrapedRecord> = match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    yield Err(CiError::Adapter(format!(
                        "Batch file {} is not a JSON record array: {e}",
                        self.path.display()
                    )));
                    return;
                }
            };

            for record in records {
                yield Ok(record);
            }
        })
    }
}

/// Write a scraped batch in the interchange format (pretty-printed; the
/// files are for humans debugging a run as much as for replay).
pub async fn write_batch(path: &Path, records: &[RawScrapedRecord]) -> Result<(), CiError> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| CiError::Adapter(format!("Failed to encode batch: {e}")))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use keyfit_common::types::ChipField;

    fn sample() -> Vec<RawScrapedRecord> {
        vec![RawScrapedRecord {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            years: "2018-2022".to_string(),
            chip: ChipField::Flat("H".to_string()),
            transponder_type: None,
            frequency: None,
            parts: None,
            notes: None,
            source: "transpondery".to_string(),
        }]
    }

    #[tokio::test]
    async fn batch_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");

        write_batch(&path, &sample()).await.unwrap();

        let adapter = JsonFileAdapter::new(&path);
        let records: Vec<_> = adapter.stream().collect().await;
        assert_eq!(records.len(), 1);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.make, "Toyota");
        assert_eq!(record.chip, ChipField::Flat("H".to_string()));
    }

    #[tokio::test]
    async fn missing_file_yields_one_adapter_error() {
        let adapter = JsonFileAdapter::new("/nonexistent/batch.json");
        let items: Vec<_> = adapter.stream().collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CiError::Adapter(_))));
    }

    #[tokio::test]
    async fn string_and_array_chip_fields_both_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        tokio::fs::write(
            &path,
            r#"[
                {"make": "Honda", "model": "Civic", "years": "2016-2021", "chip": "G", "source": "uhs"},
                {"make": "Audi", "model": "A4", "years": "2009-2015", "chip": ["ID48"], "source": "uhs"}
            ]"#,
        )
        .await
        .unwrap();

        let adapter = JsonFileAdapter::new(&path);
        let records: Vec<_> = adapter.stream().collect().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(Result::is_ok));
    }
}
