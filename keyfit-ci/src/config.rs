//! Configuration for keyfit-ci
//!
//! **[CIN-CFG-010]** Every tunable of the reconciliation pipeline lives
//! here, resolved defaults → TOML (`[catalog_ingest]` section of the shared
//! KeyFit config) → environment. The similarity threshold and ambiguity
//! margin are deliberately configuration, not constants: the external
//! catalogs drift, and retuning must not require a rebuild.

use serde::Deserialize;
use tracing::warn;

use crate::resolver::SourcePriority;

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.05;
const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TRANSPONDERY_BASE_URL: &str = "https://transpondery.com/api/catalog";
const DEFAULT_UHS_BASE_URL: &str = "https://www.uhs-hardware.com/api/products";

#[derive(Debug, Clone)]
pub struct CiConfig {
    /// Minimum model-name similarity (0-1) for a fuzzy candidate
    pub similarity_threshold: f64,
    /// Candidates within this similarity spread of the best are ambiguous
    pub ambiguity_margin: f64,
    /// Politeness delay between requests to one external catalog
    pub request_delay_ms: u64,
    /// Base backoff delay; doubles on every retry attempt
    pub retry_base_delay_ms: u64,
    /// Attempts per request before the failure is surfaced
    pub max_attempts: u32,
    pub transpondery_base_url: String,
    pub uhs_base_url: String,
    /// Priority-rank overrides, highest wins a merge conflict
    pub priority_overrides: Vec<(String, u32)>,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            transpondery_base_url: DEFAULT_TRANSPONDERY_BASE_URL.to_string(),
            uhs_base_url: DEFAULT_UHS_BASE_URL.to_string(),
            priority_overrides: Vec::new(),
        }
    }
}

/// `[catalog_ingest]` section of the shared config file.
#[derive(Debug, Default, Deserialize)]
struct TomlSection {
    similarity_threshold: Option<f64>,
    ambiguity_margin: Option<f64>,
    request_delay_ms: Option<u64>,
    retry_base_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    transpondery_base_url: Option<String>,
    uhs_base_url: Option<String>,
    #[serde(default)]
    source_priority: std::collections::HashMap<String, u32>,
}

impl CiConfig {
    /// Resolve configuration: compiled defaults, then the TOML config file,
    /// then environment variables (highest priority).
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(section) = load_toml_section() {
            if let Some(v) = section.similarity_threshold {
                config.similarity_threshold = v;
            }
            if let Some(v) = section.ambiguity_margin {
                config.ambiguity_margin = v;
            }
            if let Some(v) = section.request_delay_ms {
                config.request_delay_ms = v;
            }
            if let Some(v) = section.retry_base_delay_ms {
                config.retry_base_delay_ms = v;
            }
            if let Some(v) = section.max_attempts {
                config.max_attempts = v;
            }
            if let Some(v) = section.transpondery_base_url {
                config.transpondery_base_url = v;
            }
            if let Some(v) = section.uhs_base_url {
                config.uhs_base_url = v;
            }
            let mut overrides: Vec<(String, u32)> = section.source_priority.into_iter().collect();
            overrides.sort();
            config.priority_overrides = overrides;
        }

        if let Some(v) = env_f64("KEYFIT_SIMILARITY_THRESHOLD") {
            config.similarity_threshold = v;
        }
        if let Some(v) = env_f64("KEYFIT_AMBIGUITY_MARGIN") {
            config.ambiguity_margin = v;
        }
        if let Ok(v) = std::env::var("KEYFIT_REQUEST_DELAY_MS") {
            if let Ok(parsed) = v.parse() {
                config.request_delay_ms = parsed;
            }
        }

        config.clamp_thresholds();
        config
    }

    /// Build the conflict-resolution priority table, default ranking plus
    /// any configured overrides.
    pub fn source_priority(&self) -> SourcePriority {
        let mut table = SourcePriority::default_table();
        for (source, rank) in &self.priority_overrides {
            table = table.with_rank(source, *rank);
        }
        table
    }

    fn clamp_thresholds(&mut self) {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            warn!(
                value = self.similarity_threshold,
                "similarity_threshold outside [0, 1], clamping"
            );
            self.similarity_threshold = self.similarity_threshold.clamp(0.0, 1.0);
        }
        if !(0.0..=1.0).contains(&self.ambiguity_margin) {
            warn!(
                value = self.ambiguity_margin,
                "ambiguity_margin outside [0, 1], clamping"
            );
            self.ambiguity_margin = self.ambiguity_margin.clamp(0.0, 1.0);
        }
    }
}

fn load_toml_section() -> Option<TomlSection> {
    let value = keyfit_common::config::load_config_toml()?;
    let section = value.get("catalog_ingest")?.clone();
    match section.try_into() {
        Ok(section) => Some(section),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed [catalog_ingest] config section");
            None
        }
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}
