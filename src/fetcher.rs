use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::error::FetchError;

/// Browser user agent sent with every request; some listing sites
/// return stripped-down markup to unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// The "fetch text by URL" capability the paginator depends on.
/// Implemented over HTTP in production and by in-memory fakes in tests.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher with bounded retries for transient failures
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                source: e,
            })?;

        Ok(Self {
            client,
            max_retries: max_retries.max(1),
            retry_delay,
        })
    }

    /// One request, classified into the fetch error taxonomy
    fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(|e| classify_request_error(url, e))
    }

    /// Linear backoff with a little jitter so retries don't line up
    /// with whatever cadence upset the server in the first place.
    fn backoff(&self, attempt: u32) {
        let jitter = rand::thread_rng().gen_range(0..250);
        let delay = self.retry_delay * attempt + Duration::from_millis(jitter);
        debug!("backing off {:?} before retry", delay);
        thread::sleep(delay);
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            match self.attempt(url) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        "attempt {}/{} failed for {}: {}",
                        attempt, self.max_retries, url, e
                    );
                    self.backoff(attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify_request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}
