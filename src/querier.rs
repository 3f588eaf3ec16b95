//! Query orchestration against a single browsing session.
//!
//! A [`ScholarQuerier`] applies session settings, sends one query at a time,
//! recovers from challenge pages with a bounded number of re-reads, hands the
//! page to a [`ResultParser`] and collects the resulting articles, fetching
//! citation exports along the way.
//!
//! Retrieval failures never escape: they are logged and the page simply
//! yields no articles. Only URL validation errors reach the caller.

use crate::article::Article;
use crate::config::{QuerierConfig, RetryPolicy};
use crate::error::{OptionExt, Result, ScholarError};
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::parser::{HtmlResultParser, ResultParser};
use crate::query::Query;
use crate::settings::{CitationFormat, ScholarSettings};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Human-verification prompts Scholar shows instead of results
const CHALLENGE_MARKERS: &[&str] = &[
    "Please show you're not a robot",
    "Per continuare, digita i caratteri nell'immagine sottostante:",
    "Solving the above CAPTCHA",
    "unusual traffic from your computer",
];

/// Returns the first challenge marker found in `html`
pub fn challenge_marker(html: &str) -> Option<&'static str> {
    CHALLENGE_MARKERS.iter().copied().find(|m| html.contains(m))
}

/// Outcome of [`ScholarQuerier::get_citation_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationFetch {
    /// Article has no citation export link; nothing to do
    NoLink,
    /// Payload was already present; nothing fetched
    Cached,
    /// Payload fetched and stored on the article
    Fetched,
    /// Fetch failed; a later call will try again
    Failed,
}

/// Drives queries through a [`PageFetcher`] session
pub struct ScholarQuerier<F: PageFetcher, P: ResultParser = HtmlResultParser> {
    fetcher: F,
    parser: P,
    site: String,
    retry: RetryPolicy,
    query: Option<Query>,
    articles: Vec<Article>,
    settings: Option<ScholarSettings>,
}

impl ScholarQuerier<HttpFetcher, HtmlResultParser> {
    /// Querier over a live HTTP session, cookies restored from disk
    pub fn connect(config: &QuerierConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        let parser = HtmlResultParser::with_site(config.site_base())?;
        Ok(Self::new(fetcher, parser, config))
    }
}

impl<F: PageFetcher, P: ResultParser> ScholarQuerier<F, P> {
    pub fn new(fetcher: F, parser: P, config: &QuerierConfig) -> Self {
        Self {
            fetcher,
            parser,
            site: config.site_base().to_string(),
            retry: config.retry.clone(),
            query: None,
            articles: Vec::new(),
            settings: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Query of the latest `send_query` call
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Articles collected by the latest `send_query` call
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Move the collected articles out, leaving the list empty
    pub fn take_articles(&mut self) -> Vec<Article> {
        std::mem::take(&mut self.articles)
    }

    pub fn clear_articles(&mut self) {
        self.articles.clear();
    }

    /// Last applied settings, if any
    pub fn settings(&self) -> Option<&ScholarSettings> {
        self.settings.as_ref()
    }

    fn settings_page_url(&self) -> String {
        format!("{}/scholar_settings?sciifh=1&hl=en&as_sdt=0,5", self.site)
    }

    fn set_settings_url(&self, scisig: &str, settings: &ScholarSettings) -> String {
        let (scis, scisf) = match settings.citation_format() {
            CitationFormat::None => ("no", String::new()),
            format => ("yes", format!("&scisf={}", format.code())),
        };
        format!(
            "{}/scholar_setprefs?q=&scisig={}&inststart=0&as_sdt=1,5&as_sdtp=&num={}&scis={}{}\
             &hl=en&lang=all&instq=&inst=569367360547434339&save=",
            self.site,
            urlencoding::encode(scisig),
            settings.per_page_results(),
            scis,
            scisf,
        )
    }

    /// Apply session settings.
    ///
    /// `None` or an unconfigured profile is a no-op that reports success.
    /// Failure only means the session keeps its current preferences.
    pub async fn apply_settings(&mut self, settings: Option<&ScholarSettings>) -> bool {
        let Some(settings) = settings.filter(|s| s.is_configured()) else {
            return true;
        };
        self.settings = Some(settings.clone());

        let settings_url = self.settings_page_url();
        let Some(html) = self.fetch(&settings_url).await else {
            warn!("Settings page retrieval failed");
            return false;
        };

        let scisig = match extract_scisig(&html) {
            Ok(token) => token,
            Err(e) => {
                info!(error = %e, "Parsing settings failed");
                return false;
            }
        };

        let url = self.set_settings_url(&scisig, settings);
        if self.fetch(&url).await.is_none() {
            warn!("Settings update failed");
            return false;
        }

        info!(
            citation_format = %settings.citation_format(),
            per_page = settings.per_page_results(),
            "Settings applied"
        );
        true
    }

    /// Send a query and collect its articles.
    ///
    /// The article list is cleared first. URL validation errors are returned;
    /// a failed retrieval just leaves the list empty.
    pub async fn send_query(&mut self, query: impl Into<Query>) -> Result<()> {
        self.clear_articles();
        let query = self.query.insert(query.into());
        let url = query.url()?;

        let Some(html) = self.fetch(&url).await else {
            return Ok(());
        };
        self.parse(&html).await;
        Ok(())
    }

    /// Parse a results page into the current article list
    pub async fn parse(&mut self, html: &str) {
        let page = match self.parser.parse(html) {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Results page could not be parsed");
                return;
            }
        };

        if let (Some(n), Some(query)) = (page.num_results, self.query.as_mut()) {
            query.attrs_mut().set_if_declared("num_results", n);
        }

        for mut article in page.articles {
            self.get_citation_data(&mut article).await;
            self.articles.push(article);
        }
        info!(count = self.articles.len(), "Collected articles");
    }

    /// Fetch the citation export for `article`, at most once per article.
    ///
    /// Requires citation export to be enabled in the session settings
    /// before the article was retrieved.
    pub async fn get_citation_data(&mut self, article: &mut Article) -> CitationFetch {
        let Some(url) = article.get_str("url_citation").map(str::to_owned) else {
            return CitationFetch::NoLink;
        };
        if article.citation_data().is_some() {
            return CitationFetch::Cached;
        }

        info!("Retrieving citation export data");
        match self.fetch(&url).await {
            Some(data) => {
                article.set_citation_data(data);
                CitationFetch::Fetched
            }
            None => CitationFetch::Failed,
        }
    }

    /// Load `url` through the session, recovering from challenge pages.
    ///
    /// Every failure is logged and reported as `None`.
    pub async fn fetch(&mut self, url: &str) -> Option<String> {
        let shown = urlencoding::decode(url).map(|u| u.into_owned()).unwrap_or_else(|_| url.to_string());
        info!(url = %shown, "Requesting");

        match self.fetch_with_recovery(url).await {
            Ok(html) => {
                debug!(bytes = html.len(), "Response received");
                trace!(html = %html, "Response body");
                Some(html)
            }
            Err(e) => {
                warn!(url = %shown, error = %e, "Request failed");
                None
            }
        }
    }

    async fn fetch_with_recovery(&mut self, url: &str) -> Result<String> {
        let attempts = self.retry.challenge_retries.saturating_add(1);
        let mut backoff = self.retry.backoff;

        for attempt in 1..=attempts {
            let html = self.fetcher.fetch_page(url).await?;
            pause(self.retry.render_wait).await;

            let Some(marker) = challenge_marker(&html) else {
                return Ok(html);
            };
            info!(attempt, marker, "Challenge page detected");
            if attempt < attempts {
                pause(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }

        Err(ScholarError::RetryExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    /// Persist the session state and end the session
    pub async fn quit(mut self) {
        if let Err(e) = self.fetcher.save_state().await {
            warn!(error = %e, "Could not save session state");
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Anti-forgery token from the settings form
fn extract_scisig(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form#gs_settings_form")
        .map_err(|e| ScholarError::Parse(e.to_string()))?;
    let token_sel = Selector::parse(r#"input[type="hidden"][name="scisig"]"#)
        .map_err(|e| ScholarError::Parse(e.to_string()))?;

    let form = document.select(&form_sel).next().ok_or_parse("no settings form")?;
    form.select(&token_sel)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_parse("no scisig token")
}
