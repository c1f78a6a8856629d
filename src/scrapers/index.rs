//! Chapter list extraction from a source's index page.

use super::chapter_number::{NUMBER_REGEX, parse_chapter_number};
use crate::cache::ChapterMap;
use crate::source::SourceDescriptor;
use crate::utils::resolve_url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Chapter links: any anchor with a target.
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Index tags whose stray anchors get moved ahead of the enclosing table by
/// the HTML parser.
const TABLE_TAGS: &[&str] = &["table", "tbody", "thead", "tfoot", "tr"];

/// Builds the chapter map from index HTML.
///
/// Returns `None` when the page has no element matching the source's index
/// selector. Anchor hrefs are resolved against `index_url`; later anchors
/// with the same chapter number replace earlier ones.
pub fn extract_chapter_list(
    html: &str,
    source: &SourceDescriptor,
    title: &str,
    index_url: &str,
) -> Option<ChapterMap> {
    let document = Html::parse_document(html);
    let index = document.select(source.index_selector()).next()?;

    let mut anchors: Vec<ElementRef> = Vec::new();
    if TABLE_TAGS.contains(&source.index_tag()) {
        anchors.extend(hoisted_anchors(index));
    }
    anchors.extend(index.select(&ANCHOR_SELECTOR));

    let mut chapters = ChapterMap::new();
    for anchor in anchors {
        let label = anchor.text().collect::<String>();
        if !NUMBER_REGEX.is_match(&label) {
            continue;
        }

        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        match parse_chapter_number(title, &label) {
            Ok(number) => {
                chapters.insert(number, resolve_url(index_url, href.trim()));
            }
            Err(e) => {
                tracing::debug!(label = label.trim(), error = %e, "skipping index link");
            }
        }
    }

    Some(chapters)
}

/// Anchors written directly inside table markup.
///
/// The HTML parser foster-parents them, so they end up as the siblings
/// immediately before the table instead of inside it. Whitespace between
/// them stays in the table, so only anchors with no text node between them
/// and the table are taken.
fn hoisted_anchors(index: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let Some(table) = std::iter::once(index)
        .chain(index.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "table")
    else {
        return Vec::new();
    };

    let mut hoisted = Vec::new();
    for sibling in table.prev_siblings() {
        let Some(anchor) = ElementRef::wrap(sibling) else {
            break;
        };
        if anchor.value().name() != "a" {
            break;
        }
        if anchor.value().attr("href").is_some() {
            hoisted.push(anchor);
        }
    }

    hoisted.reverse();
    hoisted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AttrFilter, SourceConfig};

    const INDEX_URL: &str = "http://www.source.com/test_series";

    fn source(index_tag: &str, index: Option<(&str, &str)>) -> SourceDescriptor {
        SourceDescriptor::from_config(&SourceConfig {
            name: "test source".to_string(),
            root_url: "http://www.source.com/".to_string(),
            index_tag: index_tag.to_string(),
            index: index.map(|(k, v)| AttrFilter::from([(k.to_string(), v.to_string())])),
            ..SourceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_anchors_directly_in_table() {
        let html = r#"<table class="table"><a href="/x/1">Chapter 1</a><a href="/x/2">Chapter 2</a></table>"#;
        let chapters =
            extract_chapter_list(html, &source("table", Some(("class", "table"))), "title", INDEX_URL)
                .unwrap();

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters.get("1"), Some("http://www.source.com/x/1"));
        assert_eq!(chapters.get("2"), Some("http://www.source.com/x/2"));
    }

    #[test]
    fn test_table_rows() {
        let html = r#"
            <a href="/news/2024">News 2024</a>
            <table id="listing">
              <tr><th>Chapter</th><th>Added</th></tr>
              <tr><td><a href="/test-series/1">Test Series 1</a> : Start</td><td>2017</td></tr>
              <tr><td><a href="/test-series/2">Test Series 2</a></td><td>2017</td></tr>
              <tr><td><a href="/test-series/2.5">Test Series 2.5</a></td><td>2018</td></tr>
            </table>"#;
        let chapters = extract_chapter_list(
            html,
            &source("table", Some(("id", "listing"))),
            "Test Series",
            INDEX_URL,
        )
        .unwrap();

        assert_eq!(chapters.chapters().collect::<Vec<_>>(), vec!["1", "2", "2.5"]);
        assert_eq!(
            chapters.get("2.5"),
            Some("http://www.source.com/test-series/2.5")
        );
    }

    #[test]
    fn test_list_and_div_markup() {
        let html = r##"
            <ul class="chapters">
              <li><a href="https://cdn.source.com/ch/10"><span>Vol.2</span> <em>Ch.010</em></a></li>
              <li><a href="ch/9">Chapter 9 : The wired red wild card pt.3</a></li>
              <li><a href="#top">Back to top</a></li>
            </ul>"##;
        let chapters = extract_chapter_list(
            html,
            &source("ul", Some(("class", "chapters"))),
            "title",
            INDEX_URL,
        )
        .unwrap();

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters.get("10"), Some("https://cdn.source.com/ch/10"));
        assert_eq!(chapters.get("9"), Some("http://www.source.com/ch/9"));

        let html = r#"<div id="list"><div><a href="/s/3">3</a></div></div>"#;
        let chapters =
            extract_chapter_list(html, &source("div", Some(("id", "list"))), "s", INDEX_URL)
                .unwrap();
        assert_eq!(chapters.get("3"), Some("http://www.source.com/s/3"));
    }

    #[test]
    fn test_stray_table_anchors_merged_with_rows() {
        let html = r#"<table class="t"><a href="/x/3">Chapter 3</a><tr><td><a href="/x/1">Chapter 1</a></td></tr><a href="/x/4">Chapter 4</a></table>"#;
        let chapters =
            extract_chapter_list(html, &source("table", Some(("class", "t"))), "title", INDEX_URL)
                .unwrap();

        assert_eq!(chapters.chapters().collect::<Vec<_>>(), vec!["3", "4", "1"]);
        assert_eq!(chapters.get("3"), Some("http://www.source.com/x/3"));
        assert_eq!(chapters.get("1"), Some("http://www.source.com/x/1"));
    }

    #[test]
    fn test_links_before_table_are_not_hoisted() {
        let html = r#"<p><a href="/x/9">Chapter 9</a></p><a href="/x/8">Chapter 8</a>
            <table class="t"><tr><td><a href="/x/1">Chapter 1</a></td></tr></table>"#;
        let chapters =
            extract_chapter_list(html, &source("table", Some(("class", "t"))), "title", INDEX_URL)
                .unwrap();

        assert_eq!(chapters.chapters().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn test_duplicate_chapter_last_wins() {
        let html = r#"<table><tr><td>
            <a href="/a/5">Chapter 5</a>
            <a href="/b/5">Chapter 005</a>
            <a href="/a/4">Chapter 4</a>
        </td></tr></table>"#;
        let chapters = extract_chapter_list(html, &source("table", None), "title", INDEX_URL).unwrap();

        assert_eq!(chapters.chapters().collect::<Vec<_>>(), vec!["5", "4"]);
        assert_eq!(chapters.get("5"), Some("http://www.source.com/b/5"));
    }

    #[test]
    fn test_index_without_chapters_is_empty() {
        let html = r#"<table><a href="/">No chaps</a></table>"#;
        let chapters = extract_chapter_list(html, &source("table", None), "title", INDEX_URL).unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn test_missing_index_element() {
        let html = r#"<div><a href="/x/1">Chapter 1</a></div>"#;
        assert!(
            extract_chapter_list(html, &source("table", Some(("class", "table"))), "title", INDEX_URL)
                .is_none()
        );
    }
}
