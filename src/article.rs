//! A single result record as listed on Google Scholar.

use crate::attrs::{AttrValue, Attribute, AttributeBag};
use crate::error::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Declared article fields: key, label, default
const ARTICLE_FIELDS: &[(&str, &str, Option<u64>)] = &[
    ("title", "Title", None),
    ("url", "URL", None),
    ("year", "Year", None),
    ("num_citations", "Citations", Some(0)),
    ("num_versions", "Versions", Some(0)),
    ("cluster_id", "Cluster ID", None),
    ("url_pdf", "PDF link", None),
    ("url_citations", "Citations list", None),
    ("url_versions", "Versions list", None),
    ("url_citation", "Citation link", None),
    ("excerpt", "Excerpt", None),
];

/// One retrieved result: ordered fields plus an optional citation export
#[derive(Debug, Clone)]
pub struct Article {
    attrs: AttributeBag,
    citation_data: Option<String>,
}

impl Default for Article {
    fn default() -> Self {
        Self::new()
    }
}

impl Article {
    pub fn new() -> Self {
        let mut attrs = AttributeBag::new();
        for (key, label, default) in ARTICLE_FIELDS {
            attrs.declare(key, label, default.map(AttrValue::Int));
        }
        Self {
            attrs,
            citation_data: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrs.get_str(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attrs.set(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    /// Fields in display order
    pub fn fields(&self) -> impl Iterator<Item = Attribute<'_>> {
        self.attrs.iter()
    }

    pub fn attrs(&self) -> &AttributeBag {
        &self.attrs
    }

    pub fn citation_data(&self) -> Option<&str> {
        self.citation_data.as_deref()
    }

    pub fn set_citation_data(&mut self, data: String) {
        self.citation_data = Some(data);
    }

    /// Label-aligned text block; unset fields are skipped
    pub fn as_txt(&self) -> String {
        let width = self.attrs.max_label_len();
        self.fields()
            .filter_map(|a| {
                a.value
                    .map(|v| format!("{:>width$} {}", a.label, v, width = width))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Delimited row of all fields in order, optionally preceded by a key header
    pub fn as_csv(&self, header: bool, sep: u8) -> Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(sep)
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());

        if header {
            wtr.write_record(self.fields().map(|a| a.key))?;
        }
        wtr.write_record(
            self.fields()
                .map(|a| a.value.map(|v| v.to_string()).unwrap_or_default()),
        )?;

        let bytes = wtr
            .into_inner()
            .map_err(|e| crate::error::ScholarError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }

    /// Citation export payload, empty when none was fetched
    pub fn as_citation(&self) -> &str {
        self.citation_data.as_deref().unwrap_or("")
    }
}

/// Serializes as a JSON object keyed by the declared fields, in display order,
/// `null` when unset. Ad hoc keys are not written.
impl Serialize for Article {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ARTICLE_FIELDS.len()))?;
        for (key, _, _) in ARTICLE_FIELDS {
            map.serialize_entry(key, &self.attrs.get(key))?;
        }
        map.end()
    }
}
