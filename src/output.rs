//! Text, CSV, citation and JSON renderings of query results.

use crate::article::Article;
use crate::error::Result;
use crate::query::Query;
use std::path::Path;
use tracing::info;

/// Articles as label-aligned text blocks, optionally preceded by the query's
/// global attributes marked `[G]`
pub fn render_txt(query: Option<&Query>, articles: &[Article], with_globals: bool) -> String {
    let mut out = String::new();

    if let (true, Some(query)) = (with_globals, query) {
        let article_width = articles.first().map(|a| a.attrs().max_label_len()).unwrap_or(0);
        let width = query.attrs().max_label_len().max(article_width).saturating_sub(4);
        let mut any = false;
        for attr in query.attrs().iter() {
            if let Some(value) = attr.value {
                out.push_str(&format!("[G] {:>width$} {}\n", attr.label, value, width = width));
                any = true;
            }
        }
        if any {
            out.push('\n');
        }
    }

    for art in articles {
        out.push_str(&art.as_txt());
        out.push_str("\n\n");
    }
    out
}

/// Pipe-separated rows; the header row is written once, before the first article
pub fn render_csv(articles: &[Article], header: bool) -> Result<String> {
    let mut lines = Vec::with_capacity(articles.len());
    for (i, art) in articles.iter().enumerate() {
        lines.push(art.as_csv(header && i == 0, b'|')?);
    }
    Ok(lines.join("\n"))
}

/// Citation export payloads, one block per article
pub fn render_citations(articles: &[Article]) -> String {
    articles
        .iter()
        .map(|art| format!("{}\n", art.as_citation()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Results collected across the pages of one batch and written as a JSON array
#[derive(Debug, Default)]
pub struct JsonAccumulator {
    results: Vec<Article>,
}

impl JsonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, articles: impl IntoIterator<Item = Article>) {
        let before = self.results.len();
        self.results.extend(articles);
        info!(
            added = self.results.len() - before,
            total = self.results.len(),
            "Added articles to JSON list"
        );
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Forget everything collected so far
    pub fn reset(&mut self) {
        self.results.clear();
    }

    /// Write the whole accumulated list, replacing `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.results)?;
        std::fs::write(path, content)?;
        info!(path = ?path, count = self.results.len(), "Saved JSON results");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchQuery;
    use tempfile::TempDir;

    fn article(title: &str) -> Article {
        let mut art = Article::new();
        art.set("title", title);
        art
    }

    #[test]
    fn test_render_txt_with_globals() {
        let mut search = SearchQuery::new();
        search.attrs_mut().set("num_results", 1230u64);
        let query = Query::from(search);
        let out = render_txt(Some(&query), &[article("Relativity")], true);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("[G]      Start 0"));
        assert_eq!(lines.next(), Some("[G]    Results 1230"));
        assert_eq!(lines.next(), Some(""));
        assert!(out.contains("Title Relativity"));
    }

    #[test]
    fn test_render_txt_plain() {
        let out = render_txt(None, &[article("A"), article("B")], true);
        assert!(!out.contains("[G]"));
        assert_eq!(out.matches("Title").count(), 2);
    }

    #[test]
    fn test_render_csv_header_once() -> Result<()> {
        let out = render_csv(&[article("A"), article("B")], true)?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("title|url|"));
        assert!(lines[1].starts_with("A|"));
        assert!(lines[2].starts_with("B|"));
        Ok(())
    }

    #[test]
    fn test_render_citations() {
        let mut art = article("A");
        art.set_citation_data("@article{a}".to_string());
        assert_eq!(render_citations(&[art, article("B")]), "@article{a}\n\n\n");
    }

    #[test]
    fn test_json_accumulator_reset_between_batches() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("results").join("4412725301034017472.json");

        let mut acc = JsonAccumulator::new();
        acc.extend(vec![article("A"), article("B")]);
        acc.extend(vec![article("C")]);
        acc.write_to(&path)?;

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(written.len(), 3);
        assert_eq!(written[2]["title"], "C");
        assert!(written[0]["url"].is_null());

        acc.reset();
        assert!(acc.is_empty());
        Ok(())
    }
}
