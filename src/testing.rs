//! Fakes for exercising the querier without a network.

use crate::article::Article;
use crate::error::{Result, ScholarError};
use crate::fetcher::PageFetcher;
use crate::parser::{ParsedPage, ResultParser};
use std::cell::Cell;
use std::rc::Rc;

type Responder = Box<dyn FnMut(&str) -> Result<String>>;

/// Session that answers from a closure and records every requested URL
pub(crate) struct FakeFetcher {
    respond: Responder,
    pub requests: Vec<String>,
    pub saves: Rc<Cell<usize>>,
}

impl FakeFetcher {
    pub fn new(respond: impl FnMut(&str) -> Result<String> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Vec::new(),
            saves: Rc::new(Cell::new(0)),
        }
    }
}

impl PageFetcher for FakeFetcher {
    async fn fetch_page(&mut self, url: &str) -> Result<String> {
        self.requests.push(url.to_string());
        (self.respond)(url)
    }

    async fn save_state(&mut self) -> Result<()> {
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Parser for a line format: `total: N` and `article: TITLE[ | CITATION_URL]`
pub(crate) struct LineParser;

impl ResultParser for LineParser {
    fn parse(&self, html: &str) -> Result<ParsedPage> {
        let mut page = ParsedPage::default();
        for line in html.lines() {
            if let Some(total) = line.strip_prefix("total: ") {
                page.num_results = Some(
                    total
                        .parse()
                        .map_err(|_| ScholarError::Parse(format!("bad total: {}", total)))?,
                );
            } else if let Some(rest) = line.strip_prefix("article: ") {
                let mut art = Article::new();
                match rest.split_once(" | ") {
                    Some((title, cite)) => {
                        art.set("title", title);
                        art.set("url_citation", cite);
                    }
                    None => art.set("title", rest),
                }
                page.articles.push(art);
            }
        }
        Ok(page)
    }
}

/// Page with `n` plain articles titled `result 0..n`
pub(crate) fn counted_page(n: usize, total: Option<u64>) -> String {
    let mut out = String::new();
    if let Some(total) = total {
        out.push_str(&format!("total: {}\n", total));
    }
    for i in 0..n {
        out.push_str(&format!("article: result {}\n", i));
    }
    out
}

/// Page with `n` articles that each carry a citation export link
pub(crate) fn cited_page(n: usize) -> String {
    (0..n)
        .map(|i| {
            format!(
                "article: result {} | http://scholar.google.com/scholar.bib?q=info:{}:scholar.google.com/\n",
                i, i
            )
        })
        .collect()
}
