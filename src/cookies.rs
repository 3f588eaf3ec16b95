//! Cookie persistence for the Scholar browsing session.
//!
//! Cookies survive between runs in a JSON file. Saving moves the previous
//! file aside to `<file>.bak` before the fresh state is written.

use crate::error::{Result, ScholarError};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default cookie file path: `~/.scholar_querier_cookies.json`
fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".scholar_querier_cookies.json"))
        .ok_or_else(|| ScholarError::Config("Cannot determine home directory".to_string()))
}

/// Persisted cookie entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix seconds; `None` for a session cookie
    #[serde(default)]
    pub expires: Option<f64>,
}

/// Date layouts seen in `Expires` attributes
const EXPIRES_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S GMT",
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
];

fn parse_expires(value: &str) -> Option<f64> {
    EXPIRES_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.and_utc().timestamp() as f64)
}

impl Cookie {
    /// Plain cookie scoped to `/` on `domain`
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires
            .is_some_and(|at| at <= Utc::now().timestamp() as f64)
    }

    /// `Set-Cookie` style line for seeding a cookie jar
    pub fn to_set_cookie(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        let mut line = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, path
        );
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        if let Some(at) = self.expires {
            let remaining = (at - Utc::now().timestamp() as f64).max(0.0) as i64;
            line.push_str(&format!("; Max-Age={}", remaining));
        }
        line
    }

    /// Parse a `Set-Cookie` response header. `domain` applies when the
    /// header names none.
    pub fn from_set_cookie(header: &str, domain: &str) -> Option<Cookie> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim(), domain);
        let mut max_age = None;
        for attr in parts {
            let attr = attr.trim();
            let (key, val) = attr
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .unwrap_or((attr, ""));
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => cookie.domain = val.to_string(),
                "path" if !val.is_empty() => cookie.path = val.to_string(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "max-age" => max_age = val.parse::<i64>().ok(),
                "expires" => cookie.expires = parse_expires(val),
                _ => {}
            }
        }
        // Max-Age wins over Expires
        if let Some(secs) = max_age {
            cookie.expires = Some((Utc::now().timestamp() + secs) as f64);
        }
        Some(cookie)
    }

    /// Split a `Cookie:` request header into entries for `domain`
    pub fn from_header(header: &str, domain: &str) -> Vec<Cookie> {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.is_empty() {
                    return None;
                }
                Some(Cookie::new(name, value, domain))
            })
            .collect()
    }
}

/// Loads and saves the session cookie file
#[derive(Debug, Clone)]
pub struct CookieManager {
    path: PathBuf,
}

impl CookieManager {
    /// Create a new CookieManager with default path
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_cookie_path()?,
        })
    }

    /// Create a new CookieManager with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Load cookies from file
    ///
    /// Returns empty vec if file doesn't exist or is invalid
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!("Cookie file not found: {:?}", self.path);
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
                Ok(cookies) => {
                    info!("Loaded {} cookies from {:?}", cookies.len(), self.path);
                    cookies
                }
                Err(e) => {
                    warn!("Failed to parse cookies: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file: {}", e);
                Vec::new()
            }
        }
    }

    /// Save cookies, moving any previous file aside first
    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        if self.path.exists() {
            std::fs::rename(&self.path, self.backup_path())?;
        }
        let content = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {} cookies to {:?}", cookies.len(), self.path);
        Ok(())
    }
}

impl Default for CookieManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            path: PathBuf::from(".scholar_querier_cookies.json"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cookie(name: &str, value: &str) -> Cookie {
        Cookie::new(name, value, "scholar.google.com")
    }

    #[test]
    fn test_load_missing() {
        let manager = CookieManager::with_path(PathBuf::from("/nonexistent/path"));
        assert!(manager.load().is_empty());
    }

    #[test]
    fn test_save_moves_previous_aside() -> Result<()> {
        let dir = TempDir::new()?;
        let manager = CookieManager::with_path(dir.path().join("cookies.json"));

        manager.save(&[cookie("NID", "old")])?;
        manager.save(&[cookie("NID", "new"), cookie("GSP", "LM=1")])?;

        let loaded = manager.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].value, "new");

        let backup = CookieManager::with_path(dir.path().join("cookies.json.bak")).load();
        assert_eq!(backup, vec![cookie("NID", "old")]);
        Ok(())
    }

    #[test]
    fn test_invalid_file_loads_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "not json")?;
        assert!(CookieManager::with_path(path).load().is_empty());
        Ok(())
    }

    #[test]
    fn test_header_round_trip() {
        let cookies = Cookie::from_header("NID=abc; GSP=LM=1:CF=4", "scholar.google.com");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1].name, "GSP");
        assert_eq!(cookies[1].value, "LM=1:CF=4");
        assert_eq!(
            cookies[0].to_set_cookie(),
            "NID=abc; Domain=scholar.google.com; Path=/"
        );
    }

    #[test]
    fn test_set_cookie_attributes() {
        let cookie = Cookie::from_set_cookie(
            "GSP=LM=1:S=x; expires=Fri, 16-Apr-2027 12:00:00 GMT; path=/; domain=.scholar.google.com; Secure; HttpOnly",
            "scholar.google.com",
        )
        .expect("cookie");
        assert_eq!(cookie.name, "GSP");
        assert_eq!(cookie.value, "LM=1:S=x");
        assert_eq!(cookie.domain, ".scholar.google.com");
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.expires, Some(1_807_876_800.0));
    }

    #[test]
    fn test_set_cookie_defaults_and_max_age() {
        let cookie = Cookie::from_set_cookie("NID=abc; Max-Age=3600", "scholar.google.com")
            .expect("cookie");
        assert_eq!(cookie.domain, "scholar.google.com");
        assert_eq!(cookie.path, "/");
        assert!(!cookie.secure);
        assert!(!cookie.is_expired());
        assert!(cookie.expires.is_some());
        assert!(Cookie::from_set_cookie("=nameless", "scholar.google.com").is_none());
    }

    #[test]
    fn test_to_set_cookie_keeps_flags() {
        let mut cookie = cookie("GSP", "x");
        cookie.secure = true;
        cookie.http_only = true;
        assert_eq!(
            cookie.to_set_cookie(),
            "GSP=x; Domain=scholar.google.com; Path=/; Secure; HttpOnly"
        );

        cookie.expires = Some(Utc::now().timestamp() as f64 + 600.0);
        assert!(cookie.to_set_cookie().contains("; Max-Age="));
        cookie.expires = Some(0.0);
        assert!(cookie.is_expired());
    }

    #[test]
    fn test_old_file_format_loads() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, r#"[{"name":"NID","value":"a","domain":"scholar.google.com"}]"#)?;
        let loaded = CookieManager::with_path(path).load();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].secure);
        assert_eq!(loaded[0].expires, None);
        Ok(())
    }
}
