//! Manga Saver - manga chapter scraper with a cached source index.
//!
//! This library provides functionality for:
//! - Describing source websites and building series index URLs
//! - Caching index pages per series with a time-to-live
//! - Extracting chapter lists from loosely structured index HTML
//! - Streaming chapter page images from multipage and single page sources

pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod logging;
pub mod scrapers;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use cache::{ChapterMap, SeriesCache};
pub use config::Config;
pub use console::Console;
pub use error::{ConfigError, FetchError, ScraperError};
pub use http::{Fetcher, HttpFetcher};
pub use scrapers::{Page, PageStream, Scraper};
pub use source::{AttrFilter, SourceConfig, SourceDescriptor, SourceKey, SourceRegistry};
