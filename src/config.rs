//! Service constants and runtime configuration for the querier.

use crate::error::{Result, ScholarError};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Crate version reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Google Scholar site
pub const SCHOLAR_SITE: &str = "http://scholar.google.com";

/// Current maximum number of results per page
pub const MAX_PAGE_RESULTS: u32 = 10;

/// Result offset of the first page
pub const STARTING_RESULT: u32 = 0;

/// User agent string for requests
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Parse `value` as an integer, failing with [`ScholarError::Format`].
///
/// Accepts anything displayable, so both typed integers and raw CLI strings
/// go through the same check.
pub fn ensure_int<T, V>(value: V, msg: &str) -> Result<T>
where
    T: FromStr,
    V: Display,
{
    value
        .to_string()
        .trim()
        .parse::<T>()
        .map_err(|_| ScholarError::Format(msg.to_string()))
}

/// How page loads recover from anti-automation challenge pages.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-reads allowed after the first load shows a challenge
    pub challenge_retries: u32,
    /// Wait before the first re-read; doubles on each further attempt
    pub backoff: Duration,
    /// Pause after each load before the page is inspected
    pub render_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            challenge_retries: 1,
            backoff: Duration::from_secs(5),
            render_wait: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting at all, for tests and replayed sessions
    pub fn immediate(challenge_retries: u32) -> Self {
        Self {
            challenge_retries,
            backoff: Duration::ZERO,
            render_wait: Duration::ZERO,
        }
    }
}

/// Runtime options for a querier session
#[derive(Debug, Clone)]
pub struct QuerierConfig {
    /// Base URL of the Scholar site (no trailing slash)
    pub site: String,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Cookie file; `None` uses `~/.scholar_querier_cookies.json`
    pub cookie_file: Option<PathBuf>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Challenge page recovery
    pub retry: RetryPolicy,
    /// Pause between successive pages of one paginated query
    pub page_pause: Duration,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            site: SCHOLAR_SITE.to_string(),
            proxy: None,
            cookie_file: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            page_pause: Duration::from_secs(1),
        }
    }
}

impl QuerierConfig {
    /// Site base with any trailing slash removed
    pub fn site_base(&self) -> &str {
        self.site.trim_end_matches('/')
    }
}
