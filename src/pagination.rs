//! Multi-page retrieval built from repeated queries at increasing offsets.
//!
//! Each page is a fresh `send_query` with the offset advanced by the page
//! cap. Pages are handed to the sink as soon as they arrive, so at most one
//! page of articles is held at a time.

use crate::article::Article;
use crate::config::{QuerierConfig, MAX_PAGE_RESULTS};
use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::parser::ResultParser;
use crate::querier::ScholarQuerier;
use crate::query::Query;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

/// Requests issued and articles delivered by one pagination run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub requests: usize,
    pub articles: usize,
}

/// Sequential page loop over a querier
#[derive(Debug, Clone)]
pub struct Paginator {
    page_cap: u32,
    pause: Duration,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_cap: MAX_PAGE_RESULTS,
            pause: Duration::from_secs(1),
        }
    }
}

impl Paginator {
    pub fn new(page_cap: u32, pause: Duration) -> Self {
        Self {
            page_cap: page_cap.max(1),
            pause,
        }
    }

    pub fn from_config(config: &QuerierConfig) -> Self {
        Self::new(MAX_PAGE_RESULTS, config.page_pause)
    }

    /// Pause between requests, plus up to half again as random jitter
    async fn wait(&self) {
        if self.pause.is_zero() {
            return;
        }
        let max_jitter = u64::try_from(self.pause.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        let delay = self.pause + Duration::from_millis(jitter);
        debug!(delay_ms = delay.as_millis() as u64, "Pausing between pages");
        tokio::time::sleep(delay).await;
    }

    /// Retrieve up to `count` results starting at offset `start`.
    ///
    /// With `count = None` a single query is sent using the query's own page
    /// size. The loop stops early at the first empty page. URL validation
    /// errors and sink errors end the run and are returned.
    pub async fn run<F, P, S>(
        &self,
        querier: &mut ScholarQuerier<F, P>,
        query: impl Into<Query>,
        start: u32,
        count: Option<u32>,
        mut sink: S,
    ) -> Result<PageReport>
    where
        F: PageFetcher,
        P: ResultParser,
        S: FnMut(&Query, Vec<Article>) -> Result<()>,
    {
        let mut query = query.into();
        query.set_starting_number(start)?;
        let mut report = PageReport::default();

        let Some(total) = count else {
            querier.send_query(query.clone()).await?;
            report.requests = 1;
            let articles = querier.take_articles();
            report.articles = articles.len();
            sink(querier.query().unwrap_or(&query), articles)?;
            return Ok(report);
        };

        let mut offset = start;
        let mut done = 0;
        while done < total {
            let size = (total - done).min(self.page_cap);
            query.set_starting_number(offset)?;
            query.set_page_size(size)?;

            if report.requests > 0 {
                self.wait().await;
            }
            querier.send_query(query.clone()).await?;
            report.requests += 1;

            let articles = querier.take_articles();
            if articles.is_empty() {
                info!(offset, "No more results");
                break;
            }
            debug!(offset, size, received = articles.len(), "Page retrieved");
            report.articles += articles.len();
            sink(querier.query().unwrap_or(&query), articles)?;

            done += size;
            let Some(next) = offset.checked_add(self.page_cap) else {
                info!(offset, "Result offset limit reached");
                break;
            };
            offset = next;
        }

        info!(
            requests = report.requests,
            articles = report.articles,
            "Pagination complete"
        );
        Ok(report)
    }
}
