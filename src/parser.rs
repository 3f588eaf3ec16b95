//! Turns a Scholar results page into [`Article`]s.
//!
//! The querier only depends on [`ResultParser`]; [`HtmlResultParser`] is the
//! scraper-based implementation used against the live site.

use crate::article::Article;
use crate::config::SCHOLAR_SITE;
use crate::error::{Result, ScholarError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Everything extracted from one results page
#[derive(Debug, Default)]
pub struct ParsedPage {
    /// Total number of results the site reports for the query
    pub num_results: Option<u64>,
    /// Results in document order
    pub articles: Vec<Article>,
}

/// Extracts articles and the global result count from page HTML
pub trait ResultParser {
    fn parse(&self, html: &str) -> Result<ParsedPage>;
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScholarError::Parse(e.to_string()))
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ScholarError::Parse(e.to_string()))
}

fn text_of(elem: ElementRef<'_>) -> String {
    elem.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parser for the result markup used by scholar.google.com
pub struct HtmlResultParser {
    site: Url,
    item: Selector,
    title: Selector,
    title_link: Selector,
    meta: Selector,
    snippet: Selector,
    pdf: Selector,
    footer_links: Selector,
    count: Selector,
    year_re: Regex,
    cited_re: Regex,
    versions_re: Regex,
    count_re: Regex,
}

impl HtmlResultParser {
    pub fn new() -> Result<Self> {
        Self::with_site(SCHOLAR_SITE)
    }

    pub fn with_site(site: &str) -> Result<Self> {
        let site = Url::parse(site)
            .map_err(|e| ScholarError::Config(format!("Invalid site URL '{}': {}", site, e)))?;
        Ok(Self {
            site,
            item: selector("div.gs_r.gs_or.gs_scl")?,
            title: selector("h3.gs_rt")?,
            title_link: selector("h3.gs_rt a")?,
            meta: selector("div.gs_a")?,
            snippet: selector("div.gs_rs")?,
            pdf: selector("div.gs_ggs a, div.gs_or_ggsm a")?,
            footer_links: selector("div.gs_fl a")?,
            count: selector("#gs_ab_md")?,
            year_re: regex(r"\b(19|20)\d{2}\b")?,
            cited_re: regex(r"Cited by\s*(\d+)")?,
            versions_re: regex(r"All\s+(\d+)\s+versions?")?,
            count_re: regex(r"(\d[\d,.]*)\s+results?")?,
        })
    }

    fn absolute(&self, href: &str) -> String {
        self.site
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }

    fn parse_num_results(&self, document: &Html) -> Option<u64> {
        let text = document.select(&self.count).next().map(text_of)?;
        let caps = self.count_re.captures(&text)?;
        let digits: String = caps.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Article {
        let mut art = Article::new();

        if let Some(link) = item.select(&self.title_link).next() {
            art.set("title", text_of(link));
            if let Some(href) = link.value().attr("href") {
                art.set("url", self.absolute(href));
            }
        } else if let Some(title) = item.select(&self.title).next() {
            art.set("title", text_of(title));
        }

        if let Some(meta) = item.select(&self.meta).next() {
            let meta_text = text_of(meta);
            if let Some(year) = self.year_re.find(&meta_text) {
                art.set("year", year.as_str());
            }
        }

        if let Some(snippet) = item.select(&self.snippet).next() {
            art.set("excerpt", text_of(snippet));
        }

        if let Some(href) = item
            .select(&self.pdf)
            .find_map(|a| a.value().attr("href"))
        {
            art.set("url_pdf", self.absolute(href));
        }

        for link in item.select(&self.footer_links) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let text = text_of(link);

            if let Some(caps) = self.cited_re.captures(&text) {
                if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                    art.set("num_citations", n);
                    art.set("url_citations", self.absolute(href));
                }
            } else if let Some(caps) = self.versions_re.captures(&text) {
                if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                    art.set("num_versions", n);
                    let url = self.absolute(href);
                    if let Some(cluster) = cluster_id(&url) {
                        art.set("cluster_id", cluster);
                    }
                    art.set("url_versions", url);
                }
            } else if is_citation_export(href, &text) {
                art.set("url_citation", self.absolute(href));
            }
        }

        art
    }
}

/// The `cluster=` parameter of a versions link
fn cluster_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "cluster")
        .map(|(_, v)| v.into_owned())
}

fn is_citation_export(href: &str, text: &str) -> bool {
    const EXPORT_PATHS: [&str; 4] = ["scholar.bib", "scholar.enw", "scholar.ris", "scholar.rfw"];
    EXPORT_PATHS.iter().any(|p| href.contains(p)) || text.starts_with("Import into")
}

impl ResultParser for HtmlResultParser {
    fn parse(&self, html: &str) -> Result<ParsedPage> {
        let document = Html::parse_document(html);
        let num_results = self.parse_num_results(&document);

        let articles: Vec<Article> = document
            .select(&self.item)
            .map(|item| self.parse_item(item))
            .filter(|art| art.get("title").is_some())
            .collect();

        debug!(count = articles.len(), num_results = ?num_results, "Parsed results page");
        Ok(ParsedPage {
            num_results,
            articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrValue;

    const PAGE: &str = r#"
<html><body>
<div id="gs_ab_md"><div class="gs_ab_mdw">About 1,230 results (0.05 sec)</div></div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ggs gs_fl"><a href="http://arxiv.org/pdf/quant.pdf">[PDF] arxiv.org</a></div>
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="http://example.org/paper">Can quantum-mechanical description
      of physical reality be considered complete?</a></h3>
    <div class="gs_a">A Einstein, B Podolsky, N Rosen - Physical review, 1935 - APS</div>
    <div class="gs_rs">In a complete theory there is an element corresponding to each element of reality.</div>
    <div class="gs_fl">
      <a href="/scholar?cites=8174092782678430881&amp;as_sdt=2005&amp;sciodt=0,5&amp;hl=en">Cited by 24560</a>
      <a href="/scholar?q=related:oXhJ&amp;hl=en">Related articles</a>
      <a href="/scholar?cluster=8174092782678430881&amp;hl=en&amp;as_sdt=0,5">All 36 versions</a>
      <a href="/scholar.bib?q=info:oXhJ:scholar.google.com/&amp;output=citation">Import into BibTeX</a>
    </div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><span class="gs_ctu">[CITATION]</span> Relativity</h3>
    <div class="gs_a">A Einstein - 1920</div>
  </div>
</div>
<div class="gs_r gs_or gs_scl"><div class="gs_ri"></div></div>
</body></html>
"#;

    #[test]
    fn test_parse_results_page() -> Result<()> {
        let parser = HtmlResultParser::new()?;
        let page = parser.parse(PAGE)?;
        assert_eq!(page.num_results, Some(1230));
        assert_eq!(page.articles.len(), 2);

        let art = &page.articles[0];
        assert_eq!(
            art.get_str("title"),
            Some("Can quantum-mechanical description of physical reality be considered complete?")
        );
        assert_eq!(art.get_str("url"), Some("http://example.org/paper"));
        assert_eq!(art.get_str("year"), Some("1935"));
        assert_eq!(art.get("num_citations"), Some(&AttrValue::Int(24560)));
        assert_eq!(art.get("num_versions"), Some(&AttrValue::Int(36)));
        assert_eq!(art.get_str("cluster_id"), Some("8174092782678430881"));
        assert_eq!(art.get_str("url_pdf"), Some("http://arxiv.org/pdf/quant.pdf"));
        assert_eq!(
            art.get_str("url_citations"),
            Some("http://scholar.google.com/scholar?cites=8174092782678430881&as_sdt=2005&sciodt=0,5&hl=en")
        );
        assert!(art
            .get_str("url_citation")
            .is_some_and(|u| u.starts_with("http://scholar.google.com/scholar.bib?")));
        assert!(art.get_str("excerpt").is_some());

        let second = &page.articles[1];
        assert_eq!(second.get_str("title"), Some("[CITATION] Relativity"));
        assert_eq!(second.get_str("year"), Some("1920"));
        assert!(second.get("url").is_none());
        Ok(())
    }

    #[test]
    fn test_parse_empty_html() -> Result<()> {
        let page = HtmlResultParser::new()?.parse("<html><body></body></html>")?;
        assert!(page.articles.is_empty());
        assert!(page.num_results.is_none());
        Ok(())
    }
}
