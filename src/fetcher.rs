//! The browsing session behind a querier.
//!
//! [`PageFetcher`] is the one stateful resource a querier drives: it loads a
//! URL and hands back the page text, and it can persist its durable state
//! (cookies) between runs. [`HttpFetcher`] implements it on top of reqwest
//! with a persistent cookie jar.

use crate::config::{QuerierConfig, USER_AGENT};
use crate::cookies::{Cookie, CookieManager};
use crate::error::{Result, ScholarError};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::SET_COOKIE;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use url::Url;

/// A session that loads pages one at a time.
///
/// Requests are issued strictly in sequence through `&mut self`; a fetcher is
/// never shared between concurrent callers.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Load `url` and return the page body
    async fn fetch_page(&mut self, url: &str) -> Result<String>;

    /// Persist durable session state. Default does nothing.
    async fn save_state(&mut self) -> Result<()> {
        Ok(())
    }
}

/// reqwest-backed session with cookies persisted through [`CookieManager`]
pub struct HttpFetcher {
    client: reqwest::Client,
    jar: Arc<Jar>,
    secure_site: Url,
    plain_site: Url,
    /// Last known attributes per cookie name; the jar only reports values
    known: HashMap<String, Cookie>,
    cookies: CookieManager,
}

fn site_with_scheme(site: &Url, scheme: &str) -> Result<Url> {
    let mut url = site.clone();
    url.set_scheme(scheme)
        .map_err(|_| ScholarError::Config(format!("Cannot use {} for site '{}'", scheme, site)))?;
    Ok(url)
}

impl HttpFetcher {
    pub fn new(config: &QuerierConfig) -> Result<Self> {
        let site = Url::parse(config.site_base())
            .map_err(|e| ScholarError::Config(format!("Invalid site URL '{}': {}", config.site, e)))?;
        let secure_site = site_with_scheme(&site, "https")?;
        let plain_site = site_with_scheme(&site, "http")?;

        let cookies = match &config.cookie_file {
            Some(path) => CookieManager::with_path(path.clone()),
            None => CookieManager::default(),
        };

        // Seeded through the https origin so Secure cookies are accepted
        let jar = Arc::new(Jar::default());
        let mut known = HashMap::new();
        for cookie in cookies.load().into_iter().filter(|c| !c.is_expired()) {
            jar.add_cookie_str(&cookie.to_set_cookie(), &secure_site);
            known.insert(cookie.name.clone(), cookie);
        }
        if known.is_empty() {
            debug!(path = ?cookies.path(), "Starting with a fresh session");
        }

        let client = build_http_client(config, Arc::clone(&jar))?;
        Ok(Self {
            client,
            jar,
            secure_site,
            plain_site,
            known,
            cookies,
        })
    }

    pub fn cookie_path(&self) -> &std::path::Path {
        self.cookies.path()
    }

    /// Keep the attributes of `Set-Cookie` headers from a response of `host`
    fn remember_set_cookies<'a>(&mut self, headers: impl Iterator<Item = &'a str>, host: &str) {
        for header in headers {
            if let Some(cookie) = Cookie::from_set_cookie(header, host) {
                trace!(name = %cookie.name, secure = cookie.secure, "Cookie set");
                self.known.insert(cookie.name.clone(), cookie);
            }
        }
    }

    fn jar_cookies(&self, url: &Url) -> Result<Vec<Cookie>> {
        let host = url.host_str().unwrap_or_default();
        match self.jar.cookies(url) {
            Some(header) => {
                let header = header
                    .to_str()
                    .map_err(|e| ScholarError::Parse(format!("Unreadable cookie header: {}", e)))?;
                Ok(Cookie::from_header(header, host))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Current cookies with their attributes.
    ///
    /// The https view holds every cookie; one missing from the http view is
    /// Secure.
    fn session_cookies(&self) -> Result<Vec<Cookie>> {
        let plain: HashSet<String> = self
            .jar_cookies(&self.plain_site)?
            .into_iter()
            .map(|c| c.name)
            .collect();

        Ok(self
            .jar_cookies(&self.secure_site)?
            .into_iter()
            .map(|fresh| {
                let mut cookie = match self.known.get(&fresh.name) {
                    Some(known) => Cookie {
                        value: fresh.value,
                        ..known.clone()
                    },
                    None => fresh,
                };
                cookie.secure |= !plain.contains(&cookie.name);
                cookie
            })
            .collect())
    }
}

/// Build HTTP client with cookie jar and optional proxy
fn build_http_client(config: &QuerierConfig, jar: Arc<Jar>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .cookie_provider(jar);

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            ScholarError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a response status to the session's error kinds
fn check_status(status: StatusCode) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ScholarError::RateLimited(60));
    }
    if !status.is_success() {
        return Err(ScholarError::Api {
            code: status.as_u16(),
            message: format!("HTTP error: {}", status),
        });
    }
    Ok(())
}

impl PageFetcher for HttpFetcher {
    async fn fetch_page(&mut self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let host = response.url().host_str().unwrap_or_default().to_string();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        self.remember_set_cookies(set_cookies.iter().map(String::as_str), &host);

        check_status(response.status())?;
        Ok(response.text().await?)
    }

    async fn save_state(&mut self) -> Result<()> {
        let cookies = self.session_cookies()?;
        if cookies.is_empty() {
            warn!("Session holds no cookies, keeping previous cookie file");
            return Ok(());
        }
        self.cookies.save(&cookies)?;
        info!(count = cookies.len(), "Session state saved");
        Ok(())
    }
}
