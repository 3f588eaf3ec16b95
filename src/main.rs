//! scholar-querier - command-line interface to Google Scholar
//!
//! ## Usage
//!
//! ```bash
//! # One article by Einstein on quantum theory
//! scholar-querier -c 1 --author "albert einstein" --phrase "quantum theory"
//!
//! # BibTeX entry for a known cluster
//! scholar-querier -c 1 -C 17749203648027613321 --citation bt
//!
//! # Five articles by Einstein after 1970 without "quantum" and "theory" in the title
//! scholar-querier -c 5 -a "albert einstein" -t --none "quantum theory" --after 1970
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use regex::Regex;
use scholar_querier::fetcher::HttpFetcher;
use scholar_querier::output::{render_citations, render_csv, render_txt, JsonAccumulator};
use scholar_querier::{
    Article, CitationFormat, ClusterQuery, Paginator, QuerierConfig, Query, ScholarQuerier,
    ScholarSettings, SearchQuery,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// A command-line interface to Google Scholar
#[derive(Parser)]
#[command(name = "scholar-querier")]
#[command(version, about, long_about = None)]
struct Cli {
    // === Query arguments ===
    /// Author name(s)
    #[arg(short, long, value_name = "AUTHORS")]
    author: Option<String>,

    /// Results must contain all of these words
    #[arg(short = 'A', long = "all", value_name = "WORDS")]
    all_words: Option<String>,

    /// Results must contain at least one of these words ("foo bar baz", or
    /// "a phrase, another phrase" for phrases)
    #[arg(short, long, value_name = "WORDS")]
    some: Option<String>,

    /// Results must contain none of these words (formatted as for --some)
    #[arg(short, long, value_name = "WORDS")]
    none: Option<String>,

    /// Results must contain exact phrase
    #[arg(short, long)]
    phrase: Option<String>,

    /// Search title only
    #[arg(short, long)]
    title_only: bool,

    /// Results must have appeared in this publication
    #[arg(short = 'P', long = "pub", value_name = "PUBLICATIONS")]
    publication: Option<String>,

    /// Results must have appeared in or after given year
    #[arg(long, value_name = "YEAR")]
    after: Option<String>,

    /// Results must have appeared in or before given year
    #[arg(long, value_name = "YEAR")]
    before: Option<String>,

    /// Do not include patents in results
    #[arg(long)]
    no_patents: bool,

    /// Do not include citations in results
    #[arg(long)]
    no_citations: bool,

    /// Do not search, just use articles in given cluster ID
    #[arg(short = 'C', long)]
    cluster_id: Option<String>,

    /// Maximum number of results
    #[arg(short, long)]
    count: Option<u32>,

    /// Starting result offset
    #[arg(short = 'S', long, default_value_t = 0)]
    start: u32,

    /// Scholar URL to query from, e.g. a citations list
    #[arg(short, long)]
    url: Option<String>,

    /// JSON file with citations list URLs (strings, or result objects with `url_citations`)
    #[arg(short = 'U', long = "urls-file", value_name = "FILE")]
    urls_file: Option<PathBuf>,

    // === Output format ===
    /// Print article data in text format (default)
    #[arg(long)]
    txt: bool,

    /// Like --txt, but first print global results too
    #[arg(long)]
    txt_globals: bool,

    /// Print article data in CSV form (separator is "|")
    #[arg(long)]
    csv: bool,

    /// Like --csv, but print header with column names
    #[arg(long)]
    csv_header: bool,

    /// Save article data in JSON form
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "res.json")]
    json: Option<PathBuf>,

    /// Print article details in standard citation format: bt, en, rm or rw
    #[arg(long, value_name = "FORMAT", value_parser = ["bt", "en", "rm", "rw"])]
    citation: Option<String>,

    // === Miscellaneous ===
    /// File used for cookie storage across sessions
    #[arg(long, value_name = "FILE")]
    cookie_file: Option<PathBuf>,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Enable verbose logging to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

impl Cli {
    fn has_search_args(&self) -> bool {
        self.author.is_some()
            || self.all_words.is_some()
            || self.some.is_some()
            || self.none.is_some()
            || self.phrase.is_some()
            || self.title_only
            || self.publication.is_some()
            || self.after.is_some()
            || self.before.is_some()
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.debug {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.cluster_id.is_some() && cli.has_search_args() {
        bail!("Cluster ID queries do not allow additional search arguments.");
    }

    let mut settings = ScholarSettings::new();
    if let Some(name) = cli.citation.as_deref() {
        let format = CitationFormat::from_short_name(name).ok_or_else(|| {
            anyhow!("Invalid citation link format, must be one of \"bt\", \"en\", \"rm\", or \"rw\".")
        })?;
        settings = settings.with_citation_format(format);
    }

    let config = QuerierConfig {
        proxy: cli.proxy.clone(),
        cookie_file: cli.cookie_file.clone(),
        ..Default::default()
    };

    let mut querier = ScholarQuerier::connect(&config).context("Failed to start session")?;
    querier.apply_settings(Some(&settings)).await;

    let mut query = build_query(&cli)?;
    if let Some(url) = cli.url.as_deref() {
        query.set_url(url)?;
    }

    let paginator = Paginator::from_config(&config);
    let outcome = match cli.urls_file.as_deref() {
        Some(path) => run_url_batch(&cli, &mut querier, &paginator, query, path).await,
        None => {
            let json_path = cli.json.clone().unwrap_or_else(|| PathBuf::from("res.json"));
            let mut acc = JsonAccumulator::new();
            run_query(&cli, &mut querier, &paginator, query, &mut acc, &json_path).await
        }
    };

    querier.quit().await;
    outcome
}

fn build_query(cli: &Cli) -> Result<Query> {
    if let Some(cluster) = cli.cluster_id.as_deref() {
        return Ok(ClusterQuery::new(Some(cluster))?.into());
    }

    let mut query = SearchQuery::new();
    if let Some(author) = cli.author.as_deref() {
        query.set_author(author);
    }
    if let Some(words) = cli.all_words.as_deref() {
        query.set_words(words);
    }
    if let Some(words) = cli.some.as_deref() {
        query.set_words_some(words);
    }
    if let Some(words) = cli.none.as_deref() {
        query.set_words_none(words);
    }
    if let Some(phrase) = cli.phrase.as_deref() {
        query.set_phrase(phrase);
    }
    if cli.title_only {
        query.set_scope(true);
    }
    if let Some(publication) = cli.publication.as_deref() {
        query.set_pub(publication);
    }
    if cli.after.is_some() || cli.before.is_some() {
        query.set_timeframe(cli.after.as_deref(), cli.before.as_deref())?;
    }
    if cli.no_patents {
        query.set_include_patents(false);
    }
    if cli.no_citations {
        query.set_include_citations(false);
    }
    Ok(query.into())
}

// ============================================================================
// Query Runs
// ============================================================================

async fn run_query(
    cli: &Cli,
    querier: &mut ScholarQuerier<HttpFetcher>,
    paginator: &Paginator,
    query: Query,
    acc: &mut JsonAccumulator,
    json_path: &Path,
) -> Result<()> {
    let mut first_page = true;
    let report = paginator
        .run(querier, query, cli.start, cli.count, |query, articles| {
            let header = cli.csv_header && first_page;
            first_page = false;
            emit(cli, query, articles, header, acc, json_path)
        })
        .await?;

    info!(
        requests = report.requests,
        articles = report.articles,
        "Query finished"
    );
    Ok(())
}

/// Write one page of results in the selected format
fn emit(
    cli: &Cli,
    query: &Query,
    articles: Vec<Article>,
    csv_header: bool,
    acc: &mut JsonAccumulator,
    json_path: &Path,
) -> scholar_querier::Result<()> {
    if cli.json.is_some() || cli.urls_file.is_some() {
        acc.extend(articles);
        acc.write_to(json_path)?;
    } else if cli.csv || cli.csv_header {
        println!("{}", render_csv(&articles, csv_header)?);
    } else if cli.citation.is_some() {
        print!("{}", render_citations(&articles));
    } else {
        print!("{}", render_txt(Some(query), &articles, cli.txt_globals));
    }
    Ok(())
}

/// Run the query once per URL listed in `path`, each into its own JSON file
async fn run_url_batch(
    cli: &Cli,
    querier: &mut ScholarQuerier<HttpFetcher>,
    paginator: &Paginator,
    mut query: Query,
    path: &Path,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URLs file {:?}", path))?;
    let urls = parse_url_list(&content)?;
    info!(count = urls.len(), "Loaded citation list URLs");

    let id_re = Regex::new(r"[0-9]+").context("Invalid URL id pattern")?;
    let mut acc = JsonAccumulator::new();

    for url in urls {
        let Some(id) = id_re.find(&url).map(|m| m.as_str().to_string()) else {
            error!(url = %url, "URL carries no numeric id, skipping");
            continue;
        };
        if let Err(e) = query.set_url(&url) {
            error!(url = %url, error = %e, "Skipping URL");
            continue;
        }

        acc.reset();
        let json_path = PathBuf::from("results").join(format!("{}.json", id));
        if let Err(e) = run_query(cli, querier, paginator, query.clone(), &mut acc, &json_path).await {
            error!(url = %url, error = %e, "Query failed");
        }
    }
    Ok(())
}

/// URLs from a JSON array of strings or of result objects with `url_citations`
fn parse_url_list(content: &str) -> Result<Vec<String>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(content).context("URLs file must be a JSON array")?;

    Ok(values
        .iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(obj) => obj
                .get("url_citations")
                .and_then(|u| u.as_str())
                .map(str::to_string),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list_strings() -> Result<()> {
        let urls = parse_url_list(r#"["http://scholar.google.com/scholar?cites=1", "http://scholar.google.com/scholar?cites=2"]"#)?;
        assert_eq!(urls.len(), 2);
        Ok(())
    }

    #[test]
    fn test_parse_url_list_objects() -> Result<()> {
        let urls = parse_url_list(
            r#"[{"title": "A", "url_citations": "http://scholar.google.com/scholar?cites=7"}, {"title": "B", "url_citations": null}]"#,
        )?;
        assert_eq!(urls, vec!["http://scholar.google.com/scholar?cites=7".to_string()]);
        Ok(())
    }

    #[test]
    fn test_cluster_rejects_search_args() {
        let cli = Cli::parse_from(["scholar-querier", "-C", "123", "--author", "einstein"]);
        assert!(cli.has_search_args());
        let cli = Cli::parse_from(["scholar-querier", "-C", "123", "-c", "1"]);
        assert!(!cli.has_search_args());
    }

    #[test]
    fn test_build_search_query() -> Result<()> {
        let cli = Cli::parse_from([
            "scholar-querier",
            "-a",
            "albert einstein",
            "-t",
            "--none",
            "quantum theory",
            "--after",
            "1970",
        ]);
        let url = build_query(&cli)?.url()?;
        assert!(url.contains("as_sauthors=albert%20einstein"));
        assert!(url.contains("as_occt=title"));
        assert!(url.contains("as_ylo=1970"));
        Ok(())
    }

    #[test]
    fn test_json_flag_default_file() {
        let cli = Cli::parse_from(["scholar-querier", "-a", "x", "--json"]);
        assert_eq!(cli.json, Some(PathBuf::from("res.json")));
    }
}
