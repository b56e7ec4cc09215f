use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::CategoryTarget;

/// CSS selectors describing the target site's listing page structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selector scoping one listing entry (e.g. "div.product-productMetaInfo")
    pub entry: String,
    /// Selector for the product title within an entry (e.g. "h4.product-product")
    pub title: String,
    /// Selector for the brand within an entry (e.g. "h3.product-brand");
    /// omit when the site has no brand element
    #[serde(default)]
    pub brand: Option<String>,
    /// Selector for the next-page link (e.g. "li.pagination-next a")
    #[serde(default)]
    pub next_page: Option<String>,
    /// Selector for pagination meta text like "Page 1 of 14"
    /// (e.g. "li.pagination-paginationMeta")
    #[serde(default)]
    pub pagination_meta: Option<String>,
}

/// Whether the exporter should drop rows already written this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupePolicy {
    /// Write every row in discovery order, duplicates included
    #[default]
    AppendAll,
    /// Skip rows whose (title, source_url) pair was already written
    DedupeByTitleUrl,
}

/// Full scraper configuration, loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub selectors: SelectorConfig,

    /// Hard cap on pages fetched per category
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Total fetch attempts per page (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between fetch retries; grows linearly per attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between pages of one category, to be polite to the server
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Delay between categories
    #[serde(default = "default_category_delay_ms")]
    pub category_delay_ms: u64,

    #[serde(default)]
    pub dedupe: DedupePolicy,

    /// Optional labels keyed by category URL, shown in logs and the summary
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_max_pages() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_delay_ms() -> u64 {
    200
}

fn default_category_delay_ms() -> u64 {
    500
}

impl ScrapeConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: ScrapeConfig = serde_json::from_str(contents)?;
        Ok(config)
    }

    /// Read category targets from a file with one URL per line.
    /// Blank lines and lines starting with '#' are skipped.
    /// Labels come from the config's `labels` map.
    pub fn load_targets(&self, path: impl AsRef<Path>) -> Result<Vec<CategoryTarget>, ConfigError> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);

        let mut targets = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let url = line.trim();
            if url.is_empty() || url.starts_with('#') {
                continue;
            }

            let mut target = CategoryTarget::new(url);
            if let Some(label) = self.labels.get(url) {
                target = target.with_label(label.clone());
            }
            targets.push(target);
        }

        Ok(targets)
    }
}
