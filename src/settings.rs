//! Session preferences mirrored from the Scholar settings pane.

use crate::config::{ensure_int, MAX_PAGE_RESULTS};
use crate::error::{Result, ScholarError};
use std::fmt;

/// Citation export format offered on each result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationFormat {
    #[default]
    None,
    RefWorks,
    RefMan,
    EndNote,
    BibTeX,
}

impl CitationFormat {
    /// Numeric code used by the settings form
    pub fn code(self) -> u8 {
        match self {
            CitationFormat::None => 0,
            CitationFormat::RefWorks => 1,
            CitationFormat::RefMan => 2,
            CitationFormat::EndNote => 3,
            CitationFormat::BibTeX => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CitationFormat::None),
            1 => Some(CitationFormat::RefWorks),
            2 => Some(CitationFormat::RefMan),
            3 => Some(CitationFormat::EndNote),
            4 => Some(CitationFormat::BibTeX),
            _ => None,
        }
    }

    /// CLI short names: `bt`, `en`, `rm`, `rw`
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "bt" => Some(CitationFormat::BibTeX),
            "en" => Some(CitationFormat::EndNote),
            "rm" => Some(CitationFormat::RefMan),
            "rw" => Some(CitationFormat::RefWorks),
            _ => None,
        }
    }
}

impl fmt::Display for CitationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CitationFormat::None => "none",
            CitationFormat::RefWorks => "RefWorks",
            CitationFormat::RefMan => "RefMan",
            CitationFormat::EndNote => "EndNote",
            CitationFormat::BibTeX => "BibTeX",
        };
        f.write_str(name)
    }
}

/// User-tunable session settings. Applying an unconfigured profile is a no-op.
#[derive(Debug, Clone)]
pub struct ScholarSettings {
    citation_format: CitationFormat,
    per_page_results: u32,
    configured: bool,
}

impl Default for ScholarSettings {
    fn default() -> Self {
        Self {
            citation_format: CitationFormat::None,
            per_page_results: MAX_PAGE_RESULTS,
            configured: false,
        }
    }
}

impl ScholarSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn citation_format(&self) -> CitationFormat {
        self.citation_format
    }

    pub fn per_page_results(&self) -> u32 {
        self.per_page_results
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Set the export format from its numeric code (0..=4)
    pub fn set_citation_format(&mut self, code: impl fmt::Display) -> Result<()> {
        let raw: i64 = ensure_int(&code, "citation format must be numeric")?;
        let format = u8::try_from(raw)
            .ok()
            .and_then(CitationFormat::from_code)
            .ok_or_else(|| ScholarError::Format(format!("citation format invalid, is \"{}\"", raw)))?;
        self.citation_format = format;
        self.configured = true;
        Ok(())
    }

    pub fn with_citation_format(mut self, format: CitationFormat) -> Self {
        self.citation_format = format;
        self.configured = true;
        self
    }

    /// Page size preference, capped at the service maximum
    pub fn set_per_page_results(&mut self, n: impl fmt::Display) -> Result<()> {
        let n: u32 = ensure_int(n, "page results must be integer")?;
        self.per_page_results = n.min(MAX_PAGE_RESULTS);
        self.configured = true;
        Ok(())
    }
}
