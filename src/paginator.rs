use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::fetcher::Fetch;
use crate::models::{CategoryFailure, CategoryTarget, ProductRecord};
use crate::parser::{self, SelectorSet};

/// Outcome of walking one category's pages. Records collected before a
/// failure are kept so the caller can still export them.
#[derive(Debug)]
pub struct CategoryOutcome {
    pub records: Vec<ProductRecord>,
    pub pages_fetched: u32,
    pub failure: Option<CategoryFailure>,
}

impl CategoryOutcome {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Drives fetch → parse across one category's pages until the site stops
/// offering a next page, a page repeats, or the page cap is hit.
pub struct Paginator<'a, F: Fetch> {
    fetcher: &'a F,
    selectors: &'a SelectorSet,
    max_pages: u32,
    page_delay: Duration,
}

impl<'a, F: Fetch> Paginator<'a, F> {
    pub fn new(
        fetcher: &'a F,
        selectors: &'a SelectorSet,
        max_pages: u32,
        page_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            max_pages: max_pages.max(1),
            page_delay,
        }
    }

    pub fn run(&self, target: &CategoryTarget) -> CategoryOutcome {
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut current_url = target.url.clone();
        let mut page_number = 1u32;
        let mut page_cap = self.max_pages;

        loop {
            seen.insert(current_url.clone());

            let html = match self.fetcher.fetch(&current_url) {
                Ok(html) => html,
                Err(e) => {
                    return CategoryOutcome {
                        records,
                        pages_fetched: page_number - 1,
                        failure: Some(CategoryFailure {
                            url: current_url,
                            page_number,
                            reason: e.to_string(),
                        }),
                    };
                }
            };

            let page = match parser::parse(&html, &current_url, self.selectors, page_number) {
                Ok(page) => page,
                Err(e) => {
                    return CategoryOutcome {
                        records,
                        pages_fetched: page_number,
                        failure: Some(CategoryFailure {
                            url: current_url,
                            page_number,
                            reason: e.to_string(),
                        }),
                    };
                }
            };

            if page.records.is_empty() {
                warn!(
                    "no listing entries matched on {} (page {}): empty category or changed page structure",
                    current_url, page_number
                );
            }
            records.extend(page.records);

            // The page itself may advertise fewer pages than our cap.
            if let Some(hint) = page.total_pages_hint {
                if hint < page_cap {
                    page_cap = hint;
                }
            }

            match page.next_page_url {
                None => {
                    info!(
                        "{}: done after {} page(s), {} record(s)",
                        target.display_name(),
                        page_number,
                        records.len()
                    );
                    break;
                }
                Some(_) if page_number >= page_cap => {
                    info!(
                        "{}: stopping at page cap ({} pages)",
                        target.display_name(),
                        page_cap
                    );
                    break;
                }
                Some(next) if seen.contains(&next) => {
                    warn!(
                        "{}: next page {} already visited, stopping",
                        target.display_name(),
                        next
                    );
                    break;
                }
                Some(next) => {
                    current_url = next;
                    page_number += 1;
                    if !self.page_delay.is_zero() {
                        thread::sleep(self.page_delay);
                    }
                }
            }
        }

        CategoryOutcome {
            records,
            pages_fetched: page_number,
            failure: None,
        }
    }
}
