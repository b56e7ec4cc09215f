use serde::{Deserialize, Serialize};

/// One category page URL supplied by the user, with an optional
/// human-readable label used in logs and batch reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTarget {
    pub url: String,
    pub label: Option<String>,
}

impl CategoryTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label if set, otherwise the URL itself.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }
}

/// A single extracted product row. The title is always non-empty;
/// the brand may be empty when the listing does not carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub brand: String,
    /// URL of the listing page this record was extracted from.
    pub source_url: String,
    /// 1-based page number within the category.
    pub page_number: u32,
}

/// Everything extracted from one fetched listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub records: Vec<ProductRecord>,
    /// Absolute URL of the next listing page, if the page links to one.
    pub next_page_url: Option<String>,
    /// Total page count advertised by the page's pagination meta text
    /// ("Page 1 of 14"), if configured and present.
    pub total_pages_hint: Option<u32>,
}

/// The rows handed to the exporter in one write operation.
#[derive(Debug, Clone)]
pub struct ExportBatch {
    pub label: Option<String>,
    pub records: Vec<ProductRecord>,
}

impl ExportBatch {
    pub fn new(label: Option<String>, records: Vec<ProductRecord>) -> Self {
        Self { label, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A category that could not be fully scraped, with enough context
/// to tell the user which page broke and why.
#[derive(Debug, Clone)]
pub struct CategoryFailure {
    pub url: String,
    pub page_number: u32,
    pub reason: String,
}

/// Final tally reported at the end of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub targets_processed: usize,
    pub records_exported: usize,
    pub targets_failed: usize,
    pub failures: Vec<CategoryFailure>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.targets_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_label() {
        let target = CategoryTarget::new("https://example.com/shoes").with_label("Shoes");
        assert_eq!(target.display_name(), "Shoes");

        let unlabeled = CategoryTarget::new("https://example.com/shoes");
        assert_eq!(unlabeled.display_name(), "https://example.com/shoes");
    }
}
