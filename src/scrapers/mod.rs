//! Chapter list and page scraping for configured sources.
//!
//! [`Scraper`] ties a [`Fetcher`] to the series cache: chapter lists are
//! derived from cached index pages and chapter pages are streamed lazily.

mod chapter_number;
mod index;
mod pages;

pub use chapter_number::parse_chapter_number;
pub use index::extract_chapter_list;
pub use pages::{Page, PageStream, multipage_chapter, singlepage_chapter};

use crate::cache::{ChapterMap, SeriesCache};
use crate::config::ScrapingConfig;
use crate::error::ScraperError;
use crate::http::{Fetcher, HttpFetcher};
use crate::source::SourceDescriptor;
use std::sync::Arc;

/// Scraper that pulls chapter lists and page images from sources.
pub struct Scraper {
    fetcher: Arc<dyn Fetcher>,
}

impl Scraper {
    /// Creates a scraper backed by an HTTP client built from the config.
    pub fn new(config: &ScrapingConfig) -> Result<Self, ScraperError> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::with_fetcher(Arc::new(fetcher)))
    }

    /// Creates a scraper over any transport.
    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Checks whether a source website is online.
    pub async fn ping(&self, source: &SourceDescriptor) -> bool {
        source.ping(self.fetcher.as_ref()).await
    }

    /// Returns the chapter map for a series at a source.
    ///
    /// A fresh cached map is returned without any request. Otherwise the
    /// index page is read through the cache (fetching it if outdated or if
    /// `index_url` is a new custom URL) and parsed, and the result is stored
    /// back in the cache. Chapter links resolve against the generated index
    /// URL even when the page came from a custom URL. Fails with [`ScraperError::NotFound`] when the
    /// page has no chapter index element.
    pub async fn chapter_list(
        &self,
        cache: &mut SeriesCache,
        source: &SourceDescriptor,
        index_url: Option<&str>,
    ) -> Result<ChapterMap, ScraperError> {
        if !cache.is_new_index_url(source, index_url)
            && let Some(chapters) = cache.get_chapter_list(source)
        {
            tracing::debug!(series = %cache, source = %source, "chapter list cache hit");
            return Ok(chapters.clone());
        }

        let html = cache
            .get_index(self.fetcher.as_ref(), source, index_url)
            .await?
            .to_string();
        let base_url = source.index_url(cache.title())?;

        match extract_chapter_list(&html, source, cache.title(), &base_url) {
            Some(chapters) => {
                tracing::info!(
                    series = %cache,
                    source = %source,
                    chapters = chapters.len(),
                    "derived chapter list"
                );
                cache.set_chapter_list(source, Some(chapters.clone()))?;
                Ok(chapters)
            }
            None => {
                cache.set_chapter_list(source, None)?;
                Err(ScraperError::NotFound(format!(
                    "no chapter list found for {} at {}",
                    cache, source
                )))
            }
        }
    }

    /// Streams the page images of one chapter.
    ///
    /// The chapter URL is looked up in the (possibly refreshed) chapter map;
    /// pages are then fetched one by one as the stream is polled.
    pub async fn chapter_pages<'a>(
        &'a self,
        chapter: &str,
        cache: &mut SeriesCache,
        source: &'a SourceDescriptor,
    ) -> Result<PageStream<'a>, ScraperError> {
        let chapter = chapter.trim();
        if chapter.is_empty() {
            return Err(ScraperError::InvalidArgument(
                "chapter cannot be empty".to_string(),
            ));
        }

        let chapters = self.chapter_list(cache, source, None).await?;
        let url = chapters
            .get(chapter)
            .ok_or_else(|| {
                ScraperError::NotFound(format!("chapter {} is not available at {}", chapter, source))
            })?
            .to_string();

        let fetcher = self.fetcher.as_ref();
        Ok(if source.is_multipage() {
            multipage_chapter(fetcher, source, url)
        } else {
            singlepage_chapter(fetcher, source, url)
        })
    }
}
