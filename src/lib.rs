pub mod config;
pub mod error;
pub mod exporter;
pub mod fetcher;
pub mod models;
pub mod orchestrator;
pub mod paginator;
pub mod parser;

// Re-export main types
pub use config::{DedupePolicy, ScrapeConfig, SelectorConfig};
pub use error::{ConfigError, ExportError, FetchError, ParseError};
pub use exporter::{CsvExporter, Exporter, SheetsExporter};
pub use fetcher::{Fetch, HttpFetcher};
pub use models::{
    CategoryFailure, CategoryTarget, ExportBatch, PageResult, ProductRecord, RunSummary,
};
pub use paginator::{CategoryOutcome, Paginator};
pub use parser::{parse, SelectorSet};
