//! Custom error types for scholar-querier.
//!
//! Validation failures (`Format`, `QueryArgument`) are raised to whoever builds
//! the request URL. Retrieval failures are logged by the querier and turned
//! into an empty page instead of being propagated.

use thiserror::Error;

/// Main error type for scholar-querier operations.
#[derive(Debug, Error)]
pub enum ScholarError {
    /// A numeric-looking argument failed to parse as an integer
    #[error("Format error: {0}")]
    Format(String),

    /// A query is underspecified or structurally invalid
    #[error("Query argument error: {0}")]
    QueryArgument(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Rate limited by the service
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Service answered with a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Status description
        message: String,
    },

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// A challenge page was still present after the last allowed re-read
    #[error("Challenge page still present at {url} after {attempts} attempts")]
    RetryExhausted {
        /// URL that kept returning a challenge
        url: String,
        /// Number of page loads performed
        attempts: u32,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV rendering error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `ScholarError`
pub type Result<T> = std::result::Result<T, ScholarError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ScholarError::Parse(msg.to_string()))
    }
}
