use thiserror::Error;

/// Errors from fetching a page over HTTP
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },
}

impl FetchError {
    /// Transient failures are worth retrying: timeouts and 5xx responses.
    /// 4xx means the request itself is wrong and will not get better.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => (500..600).contains(status),
            FetchError::Network { .. } => false,
        }
    }
}

/// Errors from extracting records out of page HTML
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("document is empty or not HTML")]
    Malformed,

    #[error("invalid CSS selector: {0}")]
    Selector(String),
}

/// Errors from appending rows to the spreadsheet destination
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("spreadsheet authentication rejected: {0}")]
    Auth(String),

    #[error("spreadsheet service rate limit exceeded")]
    RateLimit,

    #[error("malformed batch: {0}")]
    Malformed(String),

    #[error("spreadsheet service returned HTTP {0}")]
    HttpStatus(u16),

    #[error("spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading the scraper configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Selector(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_server_errors_are_transient() {
        let timeout = FetchError::Timeout {
            url: "https://example.com".to_string(),
        };
        assert!(timeout.is_transient());

        let server_error = FetchError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(server_error.is_transient());
    }

    #[test]
    fn client_errors_are_not_retried() {
        let not_found = FetchError::HttpStatus {
            url: "https://example.com/missing".to_string(),
            status: 404,
        };
        assert!(!not_found.is_transient());
    }
}
