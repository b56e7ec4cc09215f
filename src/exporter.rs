use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::DedupePolicy;
use crate::error::ExportError;
use crate::models::{ExportBatch, ProductRecord};

/// Column order of every destination sheet
pub const HEADER: [&str; 4] = ["title", "brand", "source_url", "page_number"];

/// The "append rows" capability the orchestrator depends on.
/// Delivery is at-least-once: a retried partial failure may leave
/// duplicate rows in the destination.
pub trait Exporter {
    /// Append the batch's rows, returning how many were written
    fn append(&mut self, batch: &ExportBatch) -> Result<usize, ExportError>;
}

/// Drops rows that must not be exported: rows without a title always,
/// and previously-seen (title, source_url) pairs when deduplication is on.
/// The seen-set lives for the whole run, so duplicates across categories
/// are caught too.
struct RowFilter {
    policy: DedupePolicy,
    seen: HashSet<(String, String)>,
}

impl RowFilter {
    fn new(policy: DedupePolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
        }
    }

    /// Pick the batch's writable rows. Deduped pairs are returned as a
    /// pending set and only remembered once `commit` is called after a
    /// successful write; a failed write must leave the seen-set
    /// untouched so the rows can still be written by a later batch.
    fn select<'a>(
        &self,
        batch: &'a ExportBatch,
    ) -> (Vec<&'a ProductRecord>, HashSet<(String, String)>) {
        let mut rows = Vec::new();
        let mut pending = HashSet::new();

        for record in &batch.records {
            if record.title.trim().is_empty() {
                warn!(
                    "skipping malformed row without title (from {}, page {})",
                    record.source_url, record.page_number
                );
                continue;
            }
            if self.policy == DedupePolicy::DedupeByTitleUrl {
                let key = (record.title.clone(), record.source_url.clone());
                if self.seen.contains(&key) || !pending.insert(key) {
                    continue;
                }
            }
            rows.push(record);
        }

        (rows, pending)
    }

    fn commit(&mut self, pending: HashSet<(String, String)>) {
        self.seen.extend(pending);
    }
}

/// Writes rows to a local CSV file. The header row is written when the
/// file is created.
pub struct CsvExporter {
    writer: BufWriter<File>,
    path: PathBuf,
    filter: RowFilter,
}

impl CsvExporter {
    pub fn create(path: impl AsRef<Path>, policy: DedupePolicy) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", HEADER.join(","))?;

        Ok(Self {
            writer,
            path,
            filter: RowFilter::new(policy),
        })
    }
}

impl Exporter for CsvExporter {
    fn append(&mut self, batch: &ExportBatch) -> Result<usize, ExportError> {
        let (rows, pending) = self.filter.select(batch);
        for record in &rows {
            writeln!(
                self.writer,
                "{},{},{},{}",
                csv_escape(&record.title),
                csv_escape(&record.brand),
                csv_escape(&record.source_url),
                record.page_number
            )?;
        }
        self.writer.flush()?;
        self.filter.commit(pending);
        info!("wrote {} row(s) to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Appends rows to a Google Sheets worksheet through the REST API.
/// Auth is a bearer token from the SHEETS_API_TOKEN environment variable.
pub struct SheetsExporter {
    client: reqwest::blocking::Client,
    token: String,
    spreadsheet_id: String,
    worksheet: String,
    max_retries: u32,
    retry_delay: Duration,
    filter: RowFilter,
}

impl SheetsExporter {
    /// Create an exporter taking the API token from the environment
    pub fn from_env(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        policy: DedupePolicy,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, ExportError> {
        let token = std::env::var("SHEETS_API_TOKEN")
            .map_err(|_| ExportError::Auth("SHEETS_API_TOKEN not set".to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            max_retries: max_retries.max(1),
            retry_delay,
            filter: RowFilter::new(policy),
        })
    }

    fn append_url(&self) -> String {
        // The range is a path segment, so the worksheet name (and its '!')
        // must be percent-encoded.
        let range = format!("'{}'!A:D", self.worksheet);
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}:append\
             ?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.spreadsheet_id,
            urlencoding::encode(&range)
        )
    }

    fn post_rows(&self, rows: &[serde_json::Value]) -> Result<(), ExportError> {
        let body = serde_json::json!({ "values": rows });

        let mut attempt = 1;
        loop {
            let response = self
                .client
                .post(self.append_url())
                .bearer_auth(&self.token)
                .json(&body)
                .send()?;

            let status = response.status().as_u16();
            match status {
                200..=299 => return Ok(()),
                401 | 403 => {
                    return Err(ExportError::Auth(format!(
                        "spreadsheet service returned HTTP {}",
                        status
                    )));
                }
                429 if attempt < self.max_retries => {
                    warn!(
                        "rate limited by spreadsheet service, retry {}/{}",
                        attempt, self.max_retries
                    );
                    thread::sleep(self.retry_delay * attempt);
                    attempt += 1;
                }
                429 => return Err(ExportError::RateLimit),
                _ => return Err(ExportError::HttpStatus(status)),
            }
        }
    }
}

impl Exporter for SheetsExporter {
    fn append(&mut self, batch: &ExportBatch) -> Result<usize, ExportError> {
        let (rows, pending) = self.filter.select(batch);
        if rows.is_empty() {
            return Ok(0);
        }

        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|record| {
                serde_json::json!([
                    record.title,
                    record.brand,
                    record.source_url,
                    record.page_number
                ])
            })
            .collect();

        self.post_rows(&values)?;
        self.filter.commit(pending);
        info!(
            "appended {} row(s) to spreadsheet {}",
            rows.len(),
            self.spreadsheet_id
        );
        Ok(rows.len())
    }
}
