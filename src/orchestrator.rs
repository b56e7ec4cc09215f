use std::thread;
use std::time::Duration;

use log::{error, info};

use crate::error::ExportError;
use crate::exporter::Exporter;
use crate::fetcher::Fetch;
use crate::models::{CategoryFailure, CategoryTarget, ExportBatch, RunSummary};
use crate::paginator::Paginator;

/// Runs the whole scrape: paginate each target in list order, hand each
/// category's records to the exporter as one batch, and keep going past
/// per-category failures. Only an authentication failure at the
/// destination aborts the run.
pub fn run<F: Fetch, E: Exporter + ?Sized>(
    targets: &[CategoryTarget],
    paginator: &Paginator<F>,
    exporter: &mut E,
    category_delay: Duration,
) -> Result<RunSummary, ExportError> {
    let mut summary = RunSummary::default();

    for (index, target) in targets.iter().enumerate() {
        info!(
            "[{}/{}] processing {}",
            index + 1,
            targets.len(),
            target.display_name()
        );

        let outcome = paginator.run(target);
        summary.targets_processed += 1;

        if let Some(failure) = &outcome.failure {
            error!(
                "{} failed at page {} ({}): {}",
                target.display_name(),
                failure.page_number,
                failure.url,
                failure.reason
            );
            summary.targets_failed += 1;
            summary.failures.push(failure.clone());
        }

        // Records gathered before a failure are still worth exporting.
        let batch = ExportBatch::new(target.label.clone(), outcome.records);
        if !batch.is_empty() {
            match exporter.append(&batch) {
                Ok(written) => summary.records_exported += written,
                Err(ExportError::Auth(reason)) => {
                    // No destination to write to; nothing further can succeed.
                    return Err(ExportError::Auth(reason));
                }
                Err(e) => {
                    error!("export failed for {}: {}", target.display_name(), e);
                    if outcome.failure.is_none() {
                        summary.targets_failed += 1;
                        summary.failures.push(CategoryFailure {
                            url: target.url.clone(),
                            page_number: outcome.pages_fetched,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if index + 1 < targets.len() && !category_delay.is_zero() {
            thread::sleep(category_delay);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::error::FetchError;
    use crate::parser::SelectorSet;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeFetcher {
        pages: HashMap<String, String>,
        timeout_urls: Vec<String>,
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if self.timeout_urls.iter().any(|u| u == url) {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                });
            }
            self.pages.get(url).cloned().ok_or(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    /// Collects batches in memory instead of writing anywhere
    #[derive(Default)]
    struct CollectingExporter {
        batches: RefCell<Vec<ExportBatch>>,
        fail_with: Option<fn() -> ExportError>,
    }

    impl Exporter for CollectingExporter {
        fn append(&mut self, batch: &ExportBatch) -> Result<usize, ExportError> {
            if let Some(make_error) = self.fail_with {
                return Err(make_error());
            }
            let written = batch.records.len();
            self.batches.borrow_mut().push(batch.clone());
            Ok(written)
        }
    }

    fn selectors() -> SelectorSet {
        SelectorSet::compile(&SelectorConfig {
            entry: "div.product".to_string(),
            title: "h4.title".to_string(),
            brand: Some("h3.brand".to_string()),
            next_page: Some("a.next".to_string()),
            pagination_meta: None,
        })
        .unwrap()
    }

    fn page(products: u32, next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for i in 0..products {
            html.push_str(&format!(
                "<div class=\"product\"><h3 class=\"brand\">Acme</h3>\
                 <h4 class=\"title\">Product {}</h4></div>",
                i
            ));
        }
        if let Some(next_url) = next {
            html.push_str(&format!("<a class=\"next\" href=\"{}\">Next</a>", next_url));
        }
        html.push_str("</body></html>");
        html
    }

    fn three_page_category() -> FakeFetcher {
        let mut pages = HashMap::new();
        pages.insert(
            "https://shop.test/cat".to_string(),
            page(5, Some("https://shop.test/cat?p=2")),
        );
        pages.insert(
            "https://shop.test/cat?p=2".to_string(),
            page(5, Some("https://shop.test/cat?p=3")),
        );
        pages.insert("https://shop.test/cat?p=3".to_string(), page(5, None));
        FakeFetcher {
            pages,
            timeout_urls: Vec::new(),
        }
    }

    #[test]
    fn three_pages_of_five_export_fifteen_records() {
        let fetcher = three_page_category();
        let sels = selectors();
        let paginator = Paginator::new(&fetcher, &sels, 50, Duration::ZERO);
        let mut exporter = CollectingExporter::default();

        let targets = vec![CategoryTarget::new("https://shop.test/cat")];
        let summary = run(&targets, &paginator, &mut exporter, Duration::ZERO).unwrap();

        assert_eq!(summary.targets_processed, 1);
        assert_eq!(summary.records_exported, 15);
        assert_eq!(summary.targets_failed, 0);
        assert!(summary.all_succeeded());

        let batches = exporter.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records.len(), 15);
    }

    #[test]
    fn timeout_mid_category_still_exports_collected_pages() {
        let mut fetcher = three_page_category();
        fetcher.timeout_urls.push("https://shop.test/cat?p=2".to_string());

        let sels = selectors();
        let paginator = Paginator::new(&fetcher, &sels, 50, Duration::ZERO);
        let mut exporter = CollectingExporter::default();

        let targets = vec![CategoryTarget::new("https://shop.test/cat")];
        let summary = run(&targets, &paginator, &mut exporter, Duration::ZERO).unwrap();

        assert_eq!(summary.targets_processed, 1);
        assert_eq!(summary.targets_failed, 1);
        assert_eq!(summary.records_exported, 5);
        assert_eq!(summary.failures[0].page_number, 2);

        let batches = exporter.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records.len(), 5);
    }

    #[test]
    fn one_failed_target_does_not_stop_the_others() {
        let mut fetcher = three_page_category();
        fetcher
            .pages
            .insert("https://shop.test/other".to_string(), page(2, None));
        fetcher.timeout_urls.push("https://shop.test/cat".to_string());

        let sels = selectors();
        let paginator = Paginator::new(&fetcher, &sels, 50, Duration::ZERO);
        let mut exporter = CollectingExporter::default();

        let targets = vec![
            CategoryTarget::new("https://shop.test/cat"),
            CategoryTarget::new("https://shop.test/other").with_label("Other"),
        ];
        let summary = run(&targets, &paginator, &mut exporter, Duration::ZERO).unwrap();

        assert_eq!(summary.targets_processed, 2);
        assert_eq!(summary.targets_failed, 1);
        assert_eq!(summary.records_exported, 2);

        let batches = exporter.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].label.as_deref(), Some("Other"));
    }

    #[test]
    fn auth_failure_aborts_the_whole_run() {
        let fetcher = three_page_category();
        let sels = selectors();
        let paginator = Paginator::new(&fetcher, &sels, 50, Duration::ZERO);
        let mut exporter = CollectingExporter {
            fail_with: Some(|| ExportError::Auth("token expired".to_string())),
            ..Default::default()
        };

        let targets = vec![
            CategoryTarget::new("https://shop.test/cat"),
            CategoryTarget::new("https://shop.test/other"),
        ];
        let result = run(&targets, &paginator, &mut exporter, Duration::ZERO);
        assert!(matches!(result, Err(ExportError::Auth(_))));
    }

    #[test]
    fn non_auth_export_error_marks_target_failed_and_continues() {
        let mut fetcher = three_page_category();
        fetcher
            .pages
            .insert("https://shop.test/other".to_string(), page(2, None));

        let sels = selectors();
        let paginator = Paginator::new(&fetcher, &sels, 50, Duration::ZERO);

        struct FlakyExporter {
            calls: u32,
        }
        impl Exporter for FlakyExporter {
            fn append(&mut self, batch: &ExportBatch) -> Result<usize, ExportError> {
                self.calls += 1;
                if self.calls == 1 {
                    Err(ExportError::HttpStatus(500))
                } else {
                    Ok(batch.records.len())
                }
            }
        }

        let mut exporter = FlakyExporter { calls: 0 };
        let targets = vec![
            CategoryTarget::new("https://shop.test/cat"),
            CategoryTarget::new("https://shop.test/other"),
        ];
        let summary = run(&targets, &paginator, &mut exporter, Duration::ZERO).unwrap();

        assert_eq!(summary.targets_processed, 2);
        assert_eq!(summary.targets_failed, 1);
        assert_eq!(summary.records_exported, 2);
    }
}
