//! Transpondery catalog adapter
//!
//! Transpondery publishes a per-make transponder catalog behind a paginated
//! JSON endpoint. A page failure skips the rest of that make and is
//! surfaced as a counted item error; the stream moves on to the next make.

use async_stream::stream;
use serde::Deserialize;

use keyfit_common::types::ChipField;

use crate::config::CiConfig;
use crate::error::CiError;
use crate::sources::ratelimit::CatalogClient;
use crate::sources::{RecordStream, SourceAdapter};
use crate::types::RawScrapedRecord;

pub const SOURCE_TAG: &str = "transpondery";

pub struct TransponderyAdapter {
    client: CatalogClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MakesResponse {
    makes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    entries: Vec<CatalogEntry>,
    #[serde(default)]
    next_page: Option<u32>,
}

/// One catalog row as Transpondery serves it. `chip` arrives as either a
/// delimited string or an array depending on the page generation.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    make: String,
    model: String,
    #[serde(default)]
    years: String,
    #[serde(default)]
    chip: ChipField,
    #[serde(default)]
    transponder: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    oem_keys: Option<Vec<String>>,
    #[serde(default)]
    remarks: Option<String>,
}

impl CatalogEntry {
    fn into_raw(self) -> RawScrapedRecord {
        RawScrapedRecord {
            make: self.make,
            model: self.model,
            years: self.years,
            chip: self.chip,
            transponder_type: self.transponder,
            frequency: self.frequency,
            parts: self.oem_keys.map(ChipField::List),
            notes: self.remarks,
            source: SOURCE_TAG.to_string(),
        }
    }
}

impl TransponderyAdapter {
    pub fn new(config: &CiConfig) -> Result<Self, CiError> {
        Ok(Self {
            client: CatalogClient::new(config)?,
            base_url: config.transpondery_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_makes(&self) -> Result<Vec<String>, CiError> {
        let url = format!("{}/makes", self.base_url);
        let response: MakesResponse = self.client.get_json(&url).await?;
        Ok(response.makes)
    }

    async fn fetch_page(&self, make: &str, page: u32) -> Result<CatalogPage, CiError> {
        let url = format!("{}/{}?page={}", self.base_url, make, page);
        self.client.get_json(&url).await
    }
}

impl SourceAdapter for TransponderyAdapter {
    fn name(&self) -> &str {
        SOURCE_TAG
    }

    fn stream(&self) -> RecordStream<'_> {
        Box::pin(stream! {
            let makes = match self.fetch_makes().await {
                Ok(makes) => makes,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for make in makes {
                let mut page = 1;
                loop {
                    match self.fetch_page(&make, page).await {
                        Ok(catalog_page) => {
                            for entry in catalog_page.entries {
                                yield Ok(entry.into_raw());
                            }
                            match catalog_page.next_page {
                                Some(next) => page = next,
                                None => break,
                            }
                        }
                        Err(e) => {
                            // Remaining pages of this make are unreachable;
                            // move on to the next make
                            yield Err(e);
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entry_maps_onto_raw_record() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{
                "make": "Toyota",
                "model": "Camry",
                "years": "2018-2022",
                "chip": "H",
                "transponder": "Texas Crypto DST80",
                "oem_keys": ["89785-0D140"]
            }"#,
        )
        .unwrap();

        let raw = entry.into_raw();
        assert_eq!(raw.make, "Toyota");
        assert_eq!(raw.chip, ChipField::Flat("H".to_string()));
        assert_eq!(raw.parts, Some(ChipField::List(vec!["89785-0D140".to_string()])));
        assert_eq!(raw.source, "transpondery");
    }

    #[test]
    fn chip_array_page_generation_also_decodes() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{"make": "Audi", "model": "A4", "years": "2009-2015", "chip": ["ID48", "Megamos"]}"#,
        )
        .unwrap();
        assert_eq!(
            entry.chip,
            ChipField::List(vec!["ID48".to_string(), "Megamos".to_string()])
        );
    }
}
