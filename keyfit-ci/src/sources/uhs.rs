//! UHS Hardware catalog adapter
//!
//! UHS is a parts vendor, not a transponder reference: its listings are
//! keyed by product (key shell / remote / chip) with a vehicle-fitment list
//! attached. One product therefore fans out into one raw record per fitment
//! entry, all sharing the product's chip and frequency data.

use async_stream::stream;
use serde::Deserialize;

use keyfit_common::types::ChipField;

use crate::config::CiConfig;
use crate::error::CiError;
use crate::sources::ratelimit::CatalogClient;
use crate::sources::{RecordStream, SourceAdapter};
use crate::types::RawScrapedRecord;

pub const SOURCE_TAG: &str = "uhs";

pub struct UhsAdapter {
    client: CatalogClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    products: Vec<UhsProduct>,
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct UhsProduct {
    title: String,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    chip_type: Option<ChipField>,
    #[serde(default)]
    transponder_system: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    fitments: Vec<UhsFitment>,
}

#[derive(Debug, Deserialize)]
struct UhsFitment {
    make: String,
    model: String,
    #[serde(default)]
    years: String,
}

impl UhsProduct {
    fn into_raw_records(self) -> Vec<RawScrapedRecord> {
        let parts = self.sku.map(|sku| ChipField::List(vec![sku]));
        self.fitments
            .into_iter()
            .map(|fitment| RawScrapedRecord {
                make: fitment.make,
                model: fitment.model,
                years: fitment.years,
                chip: self.chip_type.clone().unwrap_or_default(),
                transponder_type: self.transponder_system.clone(),
                frequency: self.frequency.clone(),
                parts: parts.clone(),
                notes: Some(self.title.clone()),
                source: SOURCE_TAG.to_string(),
            })
            .collect()
    }
}

impl UhsAdapter {
    pub fn new(config: &CiConfig) -> Result<Self, CiError> {
        Ok(Self {
            client: CatalogClient::new(config)?,
            base_url: config.uhs_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<ProductsPage, CiError> {
        let url = format!(
            "{}?category=transponder-keys&page={}",
            self.base_url, page
        );
        self.client.get_json(&url).await
    }
}

impl SourceAdapter for UhsAdapter {
    fn name(&self) -> &str {
        SOURCE_TAG
    }

    fn stream(&self) -> RecordStream<'_> {
        Box::pin(stream! {
            let mut page = 1;
            loop {
                let products_page = match self.fetch_page(page).await {
                    Ok(p) => p,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let last_page = products_page.page >= products_page.total_pages;
                for product in products_page.products {
                    for record in product.into_raw_records() {
                        yield Ok(record);
                    }
                }

                if last_page {
                    return;
                }
                page += 1;
            }
        })
    }
}
