//! # scholar-querier
//!
//! Query Google Scholar through a single stateful session: build validated
//! query URLs, retrieve pages while recovering from challenge pages, collect
//! results page by page and fetch citation exports.
//!
//! ## Modules
//!
//! - [`query`] - Cluster and search queries and their URL grammar
//! - [`querier`] - Settings, retrieval, parsing and citation fetch
//! - [`pagination`] - Multi-page loops at increasing offsets
//! - [`fetcher`] - The browsing session abstraction and its HTTP implementation
//! - [`parser`] - Results page extraction
//! - [`article`] / [`attrs`] - Result records and their ordered fields
//! - [`settings`] - Session preferences (citation format, page size)
//! - [`output`] - Text, CSV, citation and JSON renderings
//! - [`cookies`] - Session cookie persistence
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholar_querier::{Paginator, QuerierConfig, ScholarQuerier, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = QuerierConfig::default();
//!     let mut querier = ScholarQuerier::connect(&config)?;
//!
//!     let mut query = SearchQuery::new();
//!     query.set_author("albert einstein");
//!     query.set_phrase("quantum theory");
//!
//!     Paginator::from_config(&config)
//!         .run(&mut querier, query, 0, Some(25), |_, articles| {
//!             println!("Got {} results", articles.len());
//!             Ok(())
//!         })
//!         .await?;
//!     querier.quit().await;
//!     Ok(())
//! }
//! ```

pub mod article;
pub mod attrs;
pub mod config;
pub mod cookies;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod pagination;
pub mod parser;
pub mod querier;
pub mod query;
pub mod settings;

#[cfg(test)]
mod testing;

pub use article::Article;
pub use config::{QuerierConfig, RetryPolicy};
pub use error::{Result, ScholarError};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use pagination::{PageReport, Paginator};
pub use querier::ScholarQuerier;
pub use query::{ClusterQuery, Query, SearchQuery};
pub use settings::{CitationFormat, ScholarSettings};
