//! Source websites from which to pull manga.
//!
//! A [`SourceDescriptor`] is the validated, immutable form of a
//! [`SourceConfig`]: it knows how to turn a series title into an index URL
//! and carries the compiled selectors for the index element and page images.

use crate::error::ScraperError;
use crate::http::Fetcher;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// HTML attribute constraints, e.g. `{"class": "listing"}`.
pub type AttrFilter = BTreeMap<String, String>;

/// Shape every normalized root URL must have: `scheme://host/path`.
static ROOT_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^/\s]+/\S*$").unwrap());

/// Raw source settings as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Display name of the source.
    pub name: String,

    /// Root URL; a missing scheme and trailing slash are added.
    pub root_url: String,

    /// Replaces spaces when building a series slug.
    pub slug_filler: String,

    /// Whether every page of a chapter is its own document.
    pub is_multipage: bool,

    /// Extra attribute constraints for the page `<img>` tag.
    pub page_image: Option<AttrFilter>,

    /// Tag name of the element holding the chapter index.
    pub index_tag: String,

    /// Attribute constraints for the chapter index element.
    pub index: Option<AttrFilter>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            root_url: String::new(),
            slug_filler: "_".to_string(),
            is_multipage: true,
            page_image: None,
            index_tag: "table".to_string(),
            index: None,
        }
    }
}

/// Cache identity of a source: its name and normalized root URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    name: String,
    root_url: String,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.root_url)
    }
}

/// A validated source website.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    name: String,
    root_url: String,
    slug_filler: String,
    is_multipage: bool,
    index_tag: String,
    page_image_selector: Selector,
    index_selector: Selector,
}

impl SourceDescriptor {
    /// Creates a multipage source with the default index lookup.
    pub fn new(name: &str, root_url: &str, slug_filler: &str) -> Result<Self, ScraperError> {
        Self::from_config(&SourceConfig {
            name: name.to_string(),
            root_url: root_url.to_string(),
            slug_filler: slug_filler.to_string(),
            ..SourceConfig::default()
        })
    }

    /// Validates a config record and compiles its selectors.
    pub fn from_config(config: &SourceConfig) -> Result<Self, ScraperError> {
        if config.name.trim().is_empty() {
            return Err(ScraperError::InvalidArgument(
                "source name cannot be empty".to_string(),
            ));
        }

        let root_url = normalize_root_url(&config.root_url)?;

        let index_tag = config.index_tag.trim().to_ascii_lowercase();
        if index_tag.is_empty() {
            return Err(ScraperError::InvalidArgument(
                "index tag cannot be empty".to_string(),
            ));
        }

        let page_image_selector = build_selector("img", config.page_image.as_ref())?;
        let index_selector = build_selector(&index_tag, config.index.as_ref())?;

        Ok(Self {
            name: config.name.clone(),
            root_url,
            slug_filler: config.slug_filler.clone(),
            is_multipage: config.is_multipage,
            index_tag,
            page_image_selector,
            index_selector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn slug_filler(&self) -> &str {
        &self.slug_filler
    }

    pub fn is_multipage(&self) -> bool {
        self.is_multipage
    }

    pub fn index_tag(&self) -> &str {
        &self.index_tag
    }

    /// Selector for the page image tag.
    pub fn page_image_selector(&self) -> &Selector {
        &self.page_image_selector
    }

    /// Selector for the element containing the chapter index.
    pub fn index_selector(&self) -> &Selector {
        &self.index_selector
    }

    /// Identity used to key cached data for this source.
    pub fn key(&self) -> SourceKey {
        SourceKey {
            name: self.name.clone(),
            root_url: self.root_url.clone(),
        }
    }

    /// Builds the URL slug for a series title.
    ///
    /// Unsafe characters are removed before spaces are substituted, so
    /// `"sup - er"` becomes `"sup__er"` with a `_` filler.
    pub fn slug(&self, title: &str) -> String {
        title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ')
            .collect::<String>()
            .replace(' ', &self.slug_filler)
    }

    /// URL of the series index page at this source.
    pub fn index_url(&self, title: &str) -> Result<String, ScraperError> {
        Url::parse(&self.root_url)
            .and_then(|root| root.join(&self.slug(title)))
            .map(|url| url.to_string())
            .map_err(|e| ScraperError::InvalidArgument(format!("cannot build index URL: {}", e)))
    }

    /// Checks whether the source website answers at all.
    ///
    /// Any 2xx or 3xx status counts as online; error statuses and transport
    /// failures count as offline.
    pub async fn ping(&self, fetcher: &dyn Fetcher) -> bool {
        match fetcher.head_status(&self.root_url).await {
            Ok(status) => (200..400).contains(&status),
            Err(e) => {
                tracing::debug!(source = %self.name, error = %e, "ping failed");
                false
            }
        }
    }
}

impl PartialEq for SourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.root_url == other.root_url
    }
}

impl Eq for SourceDescriptor {}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Adds a missing scheme and trailing slash, then checks the URL shape.
fn normalize_root_url(raw: &str) -> Result<String, ScraperError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScraperError::InvalidArgument(
            "root URL cannot be empty".to_string(),
        ));
    }

    let mut url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    if !url.ends_with('/') {
        url.push('/');
    }

    if !ROOT_URL_REGEX.is_match(&url) || Url::parse(&url).is_err() {
        return Err(ScraperError::InvalidArgument(format!(
            "invalid root URL: {}",
            raw
        )));
    }

    Ok(url)
}

/// Compiles `tag[attr="value"]...` from an attribute filter.
///
/// `class` matches any one of the element's classes, other attributes must
/// match exactly.
fn build_selector(tag: &str, attrs: Option<&AttrFilter>) -> Result<Selector, ScraperError> {
    let mut css = tag.to_string();
    for (name, value) in attrs.into_iter().flatten() {
        let operator = if name == "class" { "~=" } else { "=" };
        let value = value.replace('\\', "\\\\").replace('"', "\\\"");
        css.push_str(&format!("[{}{}\"{}\"]", name, operator, value));
    }

    Selector::parse(&css)
        .map_err(|e| ScraperError::InvalidArgument(format!("invalid selector '{}': {}", css, e)))
}

/// Configured sources, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Builds descriptors for every config record.
    ///
    /// Fails on the first invalid record or on a repeated name.
    pub fn from_configs(configs: &[SourceConfig]) -> Result<Self, ScraperError> {
        let mut sources: Vec<SourceDescriptor> = Vec::with_capacity(configs.len());

        for config in configs {
            let source = SourceDescriptor::from_config(config)?;
            if sources
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(&source.name))
            {
                return Err(ScraperError::InvalidArgument(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
            sources.push(source);
        }

        Ok(Self { sources })
    }

    /// Finds a source by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Returns all sources in configured order.
    pub fn all(&self) -> &[SourceDescriptor] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubFetcher;
    use scraper::Html;

    fn source(filler: &str) -> SourceDescriptor {
        SourceDescriptor::new("test source", "http://www.source.com/", filler).unwrap()
    }

    #[test]
    fn test_new_sets_initial_values() {
        let source = source("-");
        assert_eq!(source.name(), "test source");
        assert_eq!(source.root_url(), "http://www.source.com/");
        assert_eq!(source.slug_filler(), "-");
        assert!(source.is_multipage());
        assert_eq!(source.index_tag(), "table");
    }

    #[test]
    fn test_root_url_normalization() {
        for raw in [
            "http://www.source.com",
            "www.source.com/",
            "www.source.com",
            "  www.source.com  ",
        ] {
            let source = SourceDescriptor::new("test", raw, "_").unwrap();
            assert_eq!(source.root_url(), "http://www.source.com/");
        }

        let source = SourceDescriptor::new("test", "https://source.com/manga", "_").unwrap();
        assert_eq!(source.root_url(), "https://source.com/manga/");
    }

    #[test]
    fn test_rejects_empty_and_invalid_values() {
        assert!(matches!(
            SourceDescriptor::new("", "http://www.source.com/", "-"),
            Err(ScraperError::InvalidArgument(_))
        ));
        assert!(matches!(
            SourceDescriptor::new("test", "", "-"),
            Err(ScraperError::InvalidArgument(_))
        ));
        assert!(matches!(
            SourceDescriptor::new("test", "bad test", "-"),
            Err(ScraperError::InvalidArgument(_))
        ));
        assert!(matches!(
            SourceDescriptor::new("test", "http:///path", "-"),
            Err(ScraperError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_unusable_attribute_filter() {
        let config = SourceConfig {
            name: "test".to_string(),
            root_url: "http://www.source.com/".to_string(),
            index: Some(AttrFilter::from([("bad name!".to_string(), "x".to_string())])),
            ..SourceConfig::default()
        };
        assert!(matches!(
            SourceDescriptor::from_config(&config),
            Err(ScraperError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_selectors_apply_attribute_filters() {
        let config = SourceConfig {
            name: "test".to_string(),
            root_url: "http://www.source.com/".to_string(),
            page_image: Some(AttrFilter::from([("id".to_string(), "img".to_string())])),
            index: Some(AttrFilter::from([("class".to_string(), "table".to_string())])),
            ..SourceConfig::default()
        };
        let source = SourceDescriptor::from_config(&config).unwrap();

        let doc = Html::parse_document(
            r#"<img src="a.png"><img id="img" src="b.png">
            <table class="x table"><tr><td>1</td></tr></table>"#,
        );
        let img = doc.select(source.page_image_selector()).next().unwrap();
        assert_eq!(img.value().attr("src"), Some("b.png"));
        assert!(doc.select(source.index_selector()).next().is_some());
    }

    #[test]
    fn test_key_and_display() {
        let source = source("_");
        assert_eq!(source.key().to_string(), "test source @ http://www.source.com/");
        assert_eq!(source.to_string(), "test source");

        let same = SourceDescriptor::new("test source", "www.source.com", "-").unwrap();
        assert_eq!(source.key(), same.key());
        assert_eq!(source, same);
    }

    #[test]
    fn test_slug_replaces_spaces_with_filler() {
        for filler in ["", "-", "_", "+"] {
            assert_eq!(source(filler).slug("hi there"), format!("hi{}there", filler));
        }
    }

    #[test]
    fn test_slug_removes_unsafe_characters() {
        let source = source("_");
        for (title, slug) in [
            ("it's?", "its"),
            ("hi.there", "hithere"),
            ("it-can\"t be!", "itcant_be"),
            ("1984+", "1984"),
            ("5_a: redux", "5a_redux"),
            ("sup - er", "sup__er"),
        ] {
            assert_eq!(source.slug(title), slug, "slug of {:?}", title);
        }
    }

    #[test]
    fn test_slug_lowercases() {
        let source = source("_");
        assert_eq!(source.slug("Find it!"), "find_it");
        assert_eq!(source.slug("RE:soo"), "resoo");
        assert_eq!(source.slug("sUpErHaCkA"), "superhacka");
    }

    #[test]
    fn test_index_url_joins_root_and_slug() {
        assert_eq!(
            source("_").index_url("hi test").unwrap(),
            "http://www.source.com/hi_test"
        );
    }

    #[tokio::test]
    async fn test_ping_online_statuses() {
        for status in [200, 302] {
            let fetcher = StubFetcher::new().status("http://www.source.com/", status);
            assert!(source("_").ping(&fetcher).await);
        }
    }

    #[tokio::test]
    async fn test_ping_offline_statuses_and_errors() {
        for status in [400, 403, 404, 500] {
            let fetcher = StubFetcher::new().status("http://www.source.com/", status);
            assert!(!source("_").ping(&fetcher).await);
        }

        let unreachable = StubFetcher::new();
        assert!(!source("_").ping(&unreachable).await);
    }

    #[test]
    fn test_registry_find_and_duplicates() {
        let configs = vec![
            SourceConfig {
                name: "Alpha".to_string(),
                root_url: "alpha.com".to_string(),
                ..SourceConfig::default()
            },
            SourceConfig {
                name: "Beta".to_string(),
                root_url: "beta.com".to_string(),
                is_multipage: false,
                ..SourceConfig::default()
            },
        ];
        let registry = SourceRegistry::from_configs(&configs).unwrap();
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.find("beta").unwrap().root_url(), "http://beta.com/");
        assert!(registry.find("gamma").is_none());

        let mut duplicated = configs.clone();
        duplicated[1].name = "ALPHA".to_string();
        assert!(SourceRegistry::from_configs(&duplicated).is_err());
    }
}
