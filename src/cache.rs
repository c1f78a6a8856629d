//! Per-series cache of source index pages and derived chapter lists.
//!
//! Index HTML is kept for `update_interval` before a re-fetch is forced, so a
//! stale read costs at most one request. Nothing is persisted.

use crate::error::ScraperError;
use crate::http::Fetcher;
use crate::source::{SourceDescriptor, SourceKey};
use crate::utils::is_absolute_url;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

/// Default time-to-live for cached index pages: 6 hours.
pub const DEFAULT_UPDATE_INTERVAL_SEC: u64 = 21600;

/// Shape of a chapter number key: an integer with at most one fraction.
static CHAPTER_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());

/// Chapter number to chapter URL, in index document order.
///
/// Inserting an existing chapter replaces its URL but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterMap {
    entries: Vec<(String, String)>,
}

impl ChapterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a chapter, returning the previous URL.
    pub fn insert(&mut self, chapter: impl Into<String>, url: impl Into<String>) -> Option<String> {
        let chapter = chapter.into();
        let url = url.into();
        match self.entries.iter_mut().find(|(c, _)| *c == chapter) {
            Some((_, existing)) => Some(std::mem::replace(existing, url)),
            None => {
                self.entries.push((chapter, url));
                None
            }
        }
    }

    /// URL of the first (or only) page of a chapter.
    pub fn get(&self, chapter: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == chapter)
            .map(|(_, url)| url.as_str())
    }

    pub fn contains(&self, chapter: &str) -> bool {
        self.get(chapter).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(chapter, url)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, u)| (c.as_str(), u.as_str()))
    }

    /// Chapter numbers in document order.
    pub fn chapters(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }
}

impl<C: Into<String>, U: Into<String>> FromIterator<(C, U)> for ChapterMap {
    fn from_iter<I: IntoIterator<Item = (C, U)>>(iter: I) -> Self {
        let mut map = ChapterMap::new();
        for (chapter, url) in iter {
            map.insert(chapter, url);
        }
        map
    }
}

/// What is known about a source's chapter list.
#[derive(Debug, Clone, PartialEq)]
enum ChapterListSlot {
    /// Never derived from the current index HTML.
    Unset,
    /// The last derivation found no index element.
    Unavailable,
    Available(ChapterMap),
}

/// Cached state for one source.
#[derive(Debug, Clone)]
struct CachedIndex {
    html: String,
    chapter_list: ChapterListSlot,
    last_updated: SystemTime,
}

/// The cache for one manga series across its sources.
#[derive(Debug, Clone)]
pub struct SeriesCache {
    title: String,
    update_interval: Duration,
    indexes: HashMap<SourceKey, CachedIndex>,
    custom_urls: HashMap<SourceKey, String>,
}

impl SeriesCache {
    /// Creates an empty cache with the default 6 hour update interval.
    pub fn new(title: &str) -> Result<Self, ScraperError> {
        Self::with_update_interval(title, DEFAULT_UPDATE_INTERVAL_SEC)
    }

    /// Creates an empty cache that treats entries older than
    /// `update_interval_sec` as outdated.
    pub fn with_update_interval(title: &str, update_interval_sec: u64) -> Result<Self, ScraperError> {
        if title.trim().is_empty() {
            return Err(ScraperError::InvalidArgument(
                "title cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            title: title.to_string(),
            update_interval: Duration::from_secs(update_interval_sec),
            indexes: HashMap::new(),
            custom_urls: HashMap::new(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Number of sources with a cached index.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Whether an index page is cached for the source.
    pub fn contains(&self, source: &SourceDescriptor) -> bool {
        self.indexes.contains_key(&source.key())
    }

    /// The custom index URL stored for a source, if any.
    pub fn custom_url(&self, source: &SourceDescriptor) -> Option<&str> {
        self.custom_urls.get(&source.key()).map(String::as_str)
    }

    /// URL a refresh of this source's index would fetch.
    pub fn index_url_for(&self, source: &SourceDescriptor) -> Result<String, ScraperError> {
        match self.custom_url(source) {
            Some(url) => Ok(url.to_string()),
            None => source.index_url(&self.title),
        }
    }

    /// True if nothing is cached for the source or the entry is older than
    /// the update interval.
    pub fn has_outdated_cache(&self, source: &SourceDescriptor) -> bool {
        self.is_outdated_at(source, SystemTime::now())
    }

    fn is_outdated_at(&self, source: &SourceDescriptor, now: SystemTime) -> bool {
        match self.indexes.get(&source.key()) {
            Some(entry) => now
                .duration_since(entry.last_updated)
                .map(|age| age > self.update_interval)
                .unwrap_or(false),
            None => true,
        }
    }

    /// Whether `index_url` differs from the custom URL stored for a source.
    pub fn is_new_index_url(&self, source: &SourceDescriptor, index_url: Option<&str>) -> bool {
        index_url.is_some_and(|url| self.custom_url(source) != Some(url))
    }

    /// Fetches and stores the index page for a source.
    ///
    /// The URL is, in order of precedence: `index_url` (which also becomes
    /// the stored custom URL), the stored custom URL, or the URL generated
    /// from the series title. The body is stored whatever the response
    /// status; transport failures propagate.
    pub async fn update_index(
        &mut self,
        fetcher: &dyn Fetcher,
        source: &SourceDescriptor,
        index_url: Option<&str>,
    ) -> Result<(), ScraperError> {
        validate_index_url(index_url)?;

        let key = source.key();
        let url = match index_url {
            Some(url) => {
                self.custom_urls.insert(key.clone(), url.to_string());
                url.to_string()
            }
            None => self.index_url_for(source)?,
        };

        tracing::debug!(series = %self.title, source = %key, url = %url, "updating index");
        let html = fetcher.get_text(&url).await?;

        self.indexes.insert(
            key,
            CachedIndex {
                html,
                chapter_list: ChapterListSlot::Unset,
                last_updated: SystemTime::now(),
            },
        );

        Ok(())
    }

    /// Returns the index HTML for a source, refreshing it first when the
    /// cache is outdated or a new custom URL is given.
    pub async fn get_index(
        &mut self,
        fetcher: &dyn Fetcher,
        source: &SourceDescriptor,
        index_url: Option<&str>,
    ) -> Result<&str, ScraperError> {
        validate_index_url(index_url)?;

        if self.is_new_index_url(source, index_url) || self.has_outdated_cache(source) {
            self.update_index(fetcher, source, index_url).await?;
        } else {
            tracing::debug!(series = %self.title, source = %source.key(), "index cache hit");
        }

        self.indexes
            .get(&source.key())
            .map(|entry| entry.html.as_str())
            .ok_or_else(|| ScraperError::InvalidState(format!("no index cached for {}", source)))
    }

    /// Stores the chapter list derived for a source.
    ///
    /// `None` records that no chapter index could be found. The source must
    /// already have a cached index page.
    pub fn set_chapter_list(
        &mut self,
        source: &SourceDescriptor,
        chapter_list: Option<ChapterMap>,
    ) -> Result<(), ScraperError> {
        let Some(entry) = self.indexes.get_mut(&source.key()) else {
            return Err(ScraperError::InvalidState(format!(
                "cannot set chapter list for {} without an index",
                source
            )));
        };

        if let Some(map) = &chapter_list {
            if let Some(chapter) = map.chapters().find(|c| !CHAPTER_KEY_REGEX.is_match(c)) {
                return Err(ScraperError::InvalidArgument(format!(
                    "improperly formatted chapter number: {}",
                    chapter
                )));
            }
            if let Some((_, url)) = map.iter().find(|(_, url)| !is_absolute_url(url)) {
                return Err(ScraperError::InvalidArgument(format!(
                    "improperly formatted chapter URL: {}",
                    url
                )));
            }
        }

        entry.chapter_list = match chapter_list {
            Some(map) => ChapterListSlot::Available(map),
            None => ChapterListSlot::Unavailable,
        };
        Ok(())
    }

    /// Returns the cached chapter list for a source.
    ///
    /// Always `None` while the cache is outdated; otherwise `None` when no
    /// list has been derived or none could be found.
    pub fn get_chapter_list(&self, source: &SourceDescriptor) -> Option<&ChapterMap> {
        if self.has_outdated_cache(source) {
            return None;
        }

        match &self.indexes.get(&source.key())?.chapter_list {
            ChapterListSlot::Available(map) => Some(map),
            ChapterListSlot::Unset | ChapterListSlot::Unavailable => None,
        }
    }
}

impl fmt::Display for SeriesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

fn validate_index_url(index_url: Option<&str>) -> Result<(), ScraperError> {
    match index_url {
        Some(url) if !is_absolute_url(url) => Err(ScraperError::InvalidArgument(format!(
            "index URL must be absolute: {}",
            url
        ))),
        _ => Ok(()),
    }
}
