//! Query descriptions and their Scholar URL grammar.
//!
//! Two variants exist: [`ClusterQuery`] pulls up a result cluster whose ID is
//! already known, [`SearchQuery`] mirrors the advanced search form. Both turn
//! their state into a request URL with every substituted value percent-encoded.

use crate::attrs::{AttrValue, AttributeBag};
use crate::config::{ensure_int, MAX_PAGE_RESULTS, SCHOLAR_SITE, STARTING_RESULT};
use crate::error::{Result, ScholarError};
use tracing::debug;
use url::Url;

/// Encode a value for substitution into a query string
fn enc(value: impl ToString) -> String {
    urlencoding::encode(&value.to_string()).into_owned()
}

/// Turn comma-separated phrases into space-separated tokens, quoting any
/// token with inner whitespace: `some words, foo, bar` becomes
/// `"some words" foo bar`. Input without a comma is returned as is.
pub fn parenthesize_phrases(query: &str) -> String {
    if !query.contains(',') {
        return query.to_string();
    }
    query
        .split(',')
        .map(str::trim)
        .map(|phrase| {
            if phrase.contains(char::is_whitespace) {
                format!("\"{}\"", phrase)
            } else {
                phrase.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// State every query carries
#[derive(Debug, Clone)]
pub struct QueryCommon {
    site: String,
    page_size: u32,
    starting_number: u32,
    endpoint: Option<String>,
    attrs: AttributeBag,
}

impl QueryCommon {
    fn new(site: &str) -> Self {
        Self {
            site: site.trim_end_matches('/').to_string(),
            page_size: MAX_PAGE_RESULTS,
            starting_number: STARTING_RESULT,
            endpoint: None,
            attrs: AttributeBag::new(),
        }
    }

    fn page_size_or_default(&self) -> u32 {
        if self.page_size == 0 {
            MAX_PAGE_RESULTS
        } else {
            self.page_size
        }
    }

    /// Base of the request: the override endpoint followed by `&`, or the
    /// canonical `/scholar?` path on the site.
    fn base(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}&", endpoint),
            None => format!("{}/scholar?", self.site),
        }
    }

    fn set_endpoint(&mut self, url: &str) -> Result<()> {
        let site = Url::parse(&self.site)
            .map_err(|e| ScholarError::Config(format!("Invalid site URL: {}", e)))?;
        let given = Url::parse(url)
            .map_err(|_| ScholarError::QueryArgument(format!("The provided url is not valid: {}", url)))?;

        let same_origin = matches!(given.scheme(), "http" | "https")
            && given.host_str().is_some()
            && given.host_str() == site.host_str();
        if !same_origin {
            return Err(ScholarError::QueryArgument(format!(
                "The provided url is not valid: {}",
                url
            )));
        }
        self.endpoint = Some(url.to_string());
        Ok(())
    }
}

/// Methods shared by both query variants
macro_rules! common_accessors {
    () => {
        /// Result offset of the requested page
        pub fn starting_number(&self) -> u32 {
            self.common.starting_number
        }

        /// Number of results requested per page
        pub fn page_size(&self) -> u32 {
            self.common.page_size
        }

        pub fn set_starting_number(&mut self, n: impl std::fmt::Display) -> Result<()> {
            let n: u32 = ensure_int(n, "starting number of results on page must be numeric")?;
            self.common.starting_number = n;
            self.common.attrs.set_if_declared("starting_number", n);
            Ok(())
        }

        pub fn set_page_size(&mut self, n: impl std::fmt::Display) -> Result<()> {
            self.common.page_size =
                ensure_int(n, "maximum number of results on page must be numeric")?;
            Ok(())
        }

        /// Rebase the request on an explicit Scholar URL, e.g. a citations list.
        /// Fails when the URL is not on the configured site.
        pub fn set_url(&mut self, url: &str) -> Result<()> {
            self.common.set_endpoint(url)
        }

        pub fn endpoint(&self) -> Option<&str> {
            self.common.endpoint.as_deref()
        }

        /// Global attributes reported for this query
        pub fn attrs(&self) -> &AttributeBag {
            &self.common.attrs
        }

        pub fn attrs_mut(&mut self) -> &mut AttributeBag {
            &mut self.common.attrs
        }
    };
}

/// Lookup of a known result cluster
#[derive(Debug, Clone)]
pub struct ClusterQuery {
    common: QueryCommon,
    cluster: Option<u64>,
}

impl ClusterQuery {
    pub fn new(cluster: Option<&str>) -> Result<Self> {
        Self::with_site(SCHOLAR_SITE, cluster)
    }

    pub fn with_site(site: &str, cluster: Option<&str>) -> Result<Self> {
        let mut common = QueryCommon::new(site);
        common.attrs.declare("num_results", "Results", Some(AttrValue::Int(0)));
        let mut query = Self {
            common,
            cluster: None,
        };
        if let Some(cluster) = cluster {
            query.set_cluster(cluster)?;
        }
        Ok(query)
    }

    common_accessors!();

    pub fn cluster(&self) -> Option<u64> {
        self.cluster
    }

    pub fn set_cluster(&mut self, cluster: impl std::fmt::Display) -> Result<()> {
        self.cluster = Some(ensure_int(cluster, "cluster ID must be numeric")?);
        Ok(())
    }

    pub fn url(&self) -> Result<String> {
        let cluster = self
            .cluster
            .ok_or_else(|| ScholarError::QueryArgument("cluster query needs cluster ID".to_string()))?;

        let url = format!(
            "{}start={}&cluster={}&num={}",
            self.common.base(),
            enc(self.common.starting_number),
            enc(cluster),
            enc(self.common.page_size_or_default()),
        );
        debug!(url = %url, "Built cluster query URL");
        Ok(url)
    }
}

/// Advanced search: word filters, phrase, author, publication, years
#[derive(Debug, Clone)]
pub struct SearchQuery {
    common: QueryCommon,
    words: Option<String>,
    words_some: Option<String>,
    words_none: Option<String>,
    phrase: Option<String>,
    scope_title: bool,
    author: Option<String>,
    publication: Option<String>,
    year_start: Option<i32>,
    year_end: Option<i32>,
    include_patents: bool,
    include_citations: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::with_site(SCHOLAR_SITE)
    }

    pub fn with_site(site: &str) -> Self {
        let mut common = QueryCommon::new(site);
        common.attrs.declare("starting_number", "Start", Some(AttrValue::Int(0)));
        common.attrs.declare("num_results", "Results", Some(AttrValue::Int(0)));
        Self {
            common,
            words: None,
            words_some: None,
            words_none: None,
            phrase: None,
            scope_title: false,
            author: None,
            publication: None,
            year_start: None,
            year_end: None,
            include_patents: true,
            include_citations: true,
        }
    }

    common_accessors!();

    /// Words that *all* must be found in the result
    pub fn set_words(&mut self, words: &str) {
        self.words = Some(words.to_string());
    }

    /// Words of which *at least one* must be found
    pub fn set_words_some(&mut self, words: &str) {
        self.words_some = Some(words.to_string());
    }

    /// Words of which *none* may be found
    pub fn set_words_none(&mut self, words: &str) {
        self.words_none = Some(words.to_string());
    }

    pub fn set_phrase(&mut self, phrase: &str) {
        self.phrase = Some(phrase.to_string());
    }

    /// Search in titles only when `true`
    pub fn set_scope(&mut self, title_only: bool) {
        self.scope_title = title_only;
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = Some(author.to_string());
    }

    pub fn set_pub(&mut self, publication: &str) {
        self.publication = Some(publication.to_string());
    }

    /// Year range of publication; either bound may be omitted
    pub fn set_timeframe(&mut self, start: Option<&str>, end: Option<&str>) -> Result<()> {
        let parse = |v: Option<&str>| -> Result<Option<i32>> {
            match v {
                Some(year) if !year.trim().is_empty() => {
                    Ok(Some(ensure_int(year, "year must be numeric")?))
                }
                _ => Ok(None),
            }
        };
        self.year_start = parse(start)?;
        self.year_end = parse(end)?;
        Ok(())
    }

    pub fn set_include_citations(&mut self, yes: bool) {
        self.include_citations = yes;
    }

    pub fn set_include_patents(&mut self, yes: bool) {
        self.include_patents = yes;
    }

    fn has_criteria(&self) -> bool {
        self.words.is_some()
            || self.words_some.is_some()
            || self.words_none.is_some()
            || self.phrase.is_some()
            || self.author.is_some()
            || self.publication.is_some()
            || self.year_start.is_some()
            || self.year_end.is_some()
            || self.common.endpoint.is_some()
    }

    pub fn url(&self) -> Result<String> {
        if !self.has_criteria() {
            return Err(ScholarError::QueryArgument(
                "search query needs more parameters".to_string(),
            ));
        }

        let words_some = self.words_some.as_deref().map(parenthesize_phrases);
        let words_none = self.words_none.as_deref().map(parenthesize_phrases);
        let opt = |v: Option<&str>| enc(v.unwrap_or(""));
        let year = |y: Option<i32>| y.map(enc).unwrap_or_default();
        let flag = |include: bool| if include { "0" } else { "1" };

        let url = format!(
            "{base}start={start}&as_q={words}&as_epq={phrase}&as_oq={some}&as_eq={none}\
             &as_occt={scope}&as_sauthors={authors}&as_publication={publication}\
             &as_ylo={ylo}&as_yhi={yhi}&as_sdt={patents}%2C5&as_vis={citations}\
             &btnG=&hl=en&num={num}",
            base = self.common.base(),
            start = enc(self.common.starting_number),
            words = opt(self.words.as_deref()),
            phrase = opt(self.phrase.as_deref()),
            some = opt(words_some.as_deref()),
            none = opt(words_none.as_deref()),
            scope = if self.scope_title { "title" } else { "any" },
            authors = opt(self.author.as_deref()),
            publication = opt(self.publication.as_deref()),
            ylo = year(self.year_start),
            yhi = year(self.year_end),
            patents = flag(self.include_patents),
            citations = flag(self.include_citations),
            num = enc(self.common.page_size_or_default()),
        );
        debug!(url = %url, "Built search query URL");
        Ok(url)
    }
}

/// The query currently owned by a querier
#[derive(Debug, Clone)]
pub enum Query {
    Cluster(ClusterQuery),
    Search(SearchQuery),
}

impl From<ClusterQuery> for Query {
    fn from(q: ClusterQuery) -> Self {
        Query::Cluster(q)
    }
}

impl From<SearchQuery> for Query {
    fn from(q: SearchQuery) -> Self {
        Query::Search(q)
    }
}

impl Query {
    fn common(&self) -> &QueryCommon {
        match self {
            Query::Cluster(q) => &q.common,
            Query::Search(q) => &q.common,
        }
    }

    fn common_mut(&mut self) -> &mut QueryCommon {
        match self {
            Query::Cluster(q) => &mut q.common,
            Query::Search(q) => &mut q.common,
        }
    }

    pub fn url(&self) -> Result<String> {
        match self {
            Query::Cluster(q) => q.url(),
            Query::Search(q) => q.url(),
        }
    }

    pub fn starting_number(&self) -> u32 {
        self.common().starting_number
    }

    pub fn page_size(&self) -> u32 {
        self.common().page_size
    }

    pub fn set_starting_number(&mut self, n: impl std::fmt::Display) -> Result<()> {
        match self {
            Query::Cluster(q) => q.set_starting_number(n),
            Query::Search(q) => q.set_starting_number(n),
        }
    }

    pub fn set_page_size(&mut self, n: impl std::fmt::Display) -> Result<()> {
        match self {
            Query::Cluster(q) => q.set_page_size(n),
            Query::Search(q) => q.set_page_size(n),
        }
    }

    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.common_mut().set_endpoint(url)
    }

    pub fn attrs(&self) -> &AttributeBag {
        &self.common().attrs
    }

    pub fn attrs_mut(&mut self) -> &mut AttributeBag {
        &mut self.common_mut().attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parenthesize_phrases() {
        assert_eq!(parenthesize_phrases("some words, foo, bar"), "\"some words\" foo bar");
        assert_eq!(parenthesize_phrases("simple"), "simple");
        assert_eq!(parenthesize_phrases("foo bar baz"), "foo bar baz");
    }

    #[test]
    fn test_cluster_query_requires_id() {
        let query = ClusterQuery::new(None).expect("empty cluster query");
        let err = query.url().expect_err("no cluster id set");
        assert!(matches!(err, ScholarError::QueryArgument(_)));
    }

    #[test]
    fn test_cluster_query_url() -> Result<()> {
        let query = ClusterQuery::new(Some("12345"))?;
        let url = query.url()?;
        assert_eq!(
            url,
            "http://scholar.google.com/scholar?start=0&cluster=12345&num=10"
        );
        Ok(())
    }

    #[test]
    fn test_cluster_id_must_be_numeric() {
        let err = ClusterQuery::new(Some("abc")).expect_err("non-numeric cluster");
        assert!(matches!(err, ScholarError::Format(_)));
    }

    #[test]
    fn test_search_query_requires_criteria() {
        let query = SearchQuery::new();
        let err = query.url().expect_err("no criteria");
        assert!(matches!(err, ScholarError::QueryArgument(_)));
    }

    #[test]
    fn test_search_query_author_only() -> Result<()> {
        let mut query = SearchQuery::new();
        query.set_author("einstein");
        let url = query.url()?;
        assert!(url.starts_with("http://scholar.google.com/scholar?start=0&as_q=&"));
        assert!(url.contains("&as_sauthors=einstein&"));
        assert!(url.contains("&as_occt=any&"));
        assert!(url.contains("&as_sdt=0%2C5&as_vis=0&"));
        assert!(url.ends_with("&btnG=&hl=en&num=10"));
        Ok(())
    }

    #[test]
    fn test_search_query_full_encoding() -> Result<()> {
        let mut query = SearchQuery::new();
        query.set_author("albert einstein");
        query.set_phrase("quantum theory");
        query.set_words_none("quantum, general relativity");
        query.set_scope(true);
        query.set_timeframe(Some("1970"), None)?;
        query.set_include_patents(false);
        query.set_include_citations(false);
        query.set_starting_number(20)?;
        query.set_page_size("5")?;
        let url = query.url()?;
        assert!(url.contains("start=20&"));
        assert!(url.contains("as_epq=quantum%20theory"));
        assert!(url.contains("as_eq=quantum%20%22general%20relativity%22"));
        assert!(url.contains("as_occt=title"));
        assert!(url.contains("as_ylo=1970&as_yhi=&"));
        assert!(url.contains("as_sdt=1%2C5&as_vis=1"));
        assert!(url.ends_with("num=5"));
        assert_eq!(
            query.attrs().get("starting_number"),
            Some(&AttrValue::Int(20))
        );
        Ok(())
    }

    #[test]
    fn test_offsets_must_be_numeric() {
        let mut query = SearchQuery::new();
        assert!(matches!(
            query.set_starting_number("ten"),
            Err(ScholarError::Format(_))
        ));
        assert!(matches!(query.set_page_size("x"), Err(ScholarError::Format(_))));
        assert!(matches!(
            query.set_timeframe(Some("nineteen"), None),
            Err(ScholarError::Format(_))
        ));
    }

    #[test]
    fn test_set_url_rejects_foreign_origin() {
        let mut query = SearchQuery::new();
        let err = query
            .set_url("https://example.com/scholar?cites=1")
            .expect_err("foreign origin");
        assert!(matches!(err, ScholarError::QueryArgument(_)));
        assert!(matches!(
            query.set_url("not a url"),
            Err(ScholarError::QueryArgument(_))
        ));
    }

    #[test]
    fn test_set_url_rebases_template() -> Result<()> {
        let mut query = SearchQuery::new();
        query.set_url("http://scholar.google.com/scholar?cites=4412725301034017472&as_sdt=2005")?;
        let url = query.url()?;
        assert!(url.starts_with(
            "http://scholar.google.com/scholar?cites=4412725301034017472&as_sdt=2005&start=0&as_q=&"
        ));
        Ok(())
    }

    #[test]
    fn test_query_enum_delegates() -> Result<()> {
        let mut query: Query = ClusterQuery::new(Some("99"))?.into();
        query.set_starting_number(10)?;
        query.set_page_size(3)?;
        assert_eq!(query.starting_number(), 10);
        assert_eq!(query.page_size(), 3);
        assert!(query.url()?.contains("start=10&cluster=99&num=3"));
        Ok(())
    }
}
