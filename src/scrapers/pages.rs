//! Chapter page walking and image download.
//!
//! A chapter is either spread over one document per page, each linking to
//! the next (multipage), or shown as a single document holding every page
//! image. Both walkers are lazy: nothing is fetched until the stream is
//! polled, and dropping the stream stops all further requests.

use crate::error::ScraperError;
use crate::http::Fetcher;
use crate::source::SourceDescriptor;
use crate::utils::{file_extension, resolve_url};
use futures::StreamExt;
use futures::stream::{self, LocalBoxStream};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

/// Last path segment of a dashed page URL, e.g. `437217-1`.
static DASHED_PAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[-_]\d+$").unwrap());

/// One downloaded page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Raw image bytes.
    pub data: Vec<u8>,

    /// Text after the last `.` of the image URL.
    pub extension: String,
}

/// Lazily fetched pages of a chapter, in reading order.
pub type PageStream<'a> = LocalBoxStream<'a, Result<Page, ScraperError>>;

/// The element taken out of a page document along with its image.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageElement {
    /// Anchor wrapping the image; its href leads to the next page.
    Anchor { href: Option<String> },
    /// Bare image.
    Image,
}

/// A page image found (and removed) in a document.
#[derive(Debug)]
struct PulledImage {
    image_url: String,
    element: PageElement,
}

impl PulledImage {
    fn href(&self) -> Option<&str> {
        match &self.element {
            PageElement::Anchor { href } => href.as_deref(),
            PageElement::Image => None,
        }
    }
}

/// A fetched page document, its first image and the link onwards.
pub(crate) struct FetchedPage {
    pub(crate) page: Page,
    /// Absolute next page URL, or empty when the element has no href.
    pub(crate) next_url: String,
    /// The page document with the pulled element removed.
    pub(crate) document: Html,
}

/// Takes the first page image out of `document`.
///
/// For multipage sources an anchor enclosing the image is removed instead,
/// so its href can be followed. Returns `Ok(None)` when no matching image is
/// left.
fn pull_page_image(
    document: &mut Html,
    source: &SourceDescriptor,
    page_url: &str,
) -> Result<Option<PulledImage>, ScraperError> {
    // Scan from the root: a detached anchor still holds its image, and
    // `Html::select` would match it.
    let Some(img) = document
        .root_element()
        .select(source.page_image_selector())
        .next()
    else {
        return Ok(None);
    };

    let src = img
        .value()
        .attr("src")
        .map(str::trim)
        .ok_or_else(|| ScraperError::NotFound(format!("page image at {} has no source", page_url)))?;

    let image_url = if src.starts_with("//") {
        format!("http:{}", src)
    } else {
        resolve_url(page_url, src)
    };

    let anchor = if source.is_multipage() {
        img.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "a")
    } else {
        None
    };

    let (node_id, element) = match anchor {
        Some(anchor) => (
            anchor.id(),
            PageElement::Anchor {
                href: anchor.value().attr("href").map(str::to_string),
            },
        ),
        None => (img.id(), PageElement::Image),
    };

    if let Some(mut node) = document.tree.get_mut(node_id) {
        node.detach();
    }

    Ok(Some(PulledImage { image_url, element }))
}

async fn download_image(fetcher: &dyn Fetcher, image_url: &str) -> Result<Page, ScraperError> {
    let data = fetcher.get_bytes(image_url).await?;
    Ok(Page {
        data,
        extension: file_extension(image_url).to_string(),
    })
}

/// Fetches one page of a chapter and downloads its image.
///
/// Transport failures on the page itself become
/// [`ScraperError::InvalidArgument`]; a page without an image is
/// [`ScraperError::NotFound`].
pub(crate) async fn fetch_page(
    fetcher: &dyn Fetcher,
    source: &SourceDescriptor,
    url: &str,
) -> Result<FetchedPage, ScraperError> {
    let body = fetcher.get_text(url).await.map_err(|e| {
        tracing::debug!(url, error = %e, "page request failed");
        ScraperError::InvalidArgument(format!("Invalid URL: {}", url))
    })?;

    let mut document = Html::parse_document(&body);
    let pulled = pull_page_image(&mut document, source, url)?
        .ok_or_else(|| ScraperError::NotFound(format!("no page image at {}", url)))?;

    let page = download_image(fetcher, &pulled.image_url).await?;
    let next_url = pulled
        .href()
        .map(|href| resolve_url(url, href.trim()))
        .unwrap_or_default();

    Ok(FetchedPage {
        page,
        next_url,
        document,
    })
}

/// Prefix shared by every page URL of the chapter starting at `url`.
///
/// Drops the last path segment (`/001/page/1` -> `/001/page`), keeping the
/// chapter part of a dashed segment (`/chap/437217-1` -> `/chap/437217`).
pub(crate) fn chapter_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let Some((base, last)) = trimmed.rsplit_once('/') else {
        return trimmed.to_string();
    };

    match DASHED_PAGE_REGEX.captures(last) {
        Some(caps) => format!("{}/{}", base, &caps[1]),
        None => base.to_string(),
    }
}

/// Streams the pages of a multipage chapter by following next-page links.
///
/// Stops once a link leaves the chapter's base URL. A page that cannot be
/// fetched or has no image also ends the chapter without an error.
pub fn multipage_chapter<'a>(
    fetcher: &'a dyn Fetcher,
    source: &'a SourceDescriptor,
    url: String,
) -> PageStream<'a> {
    let base_url = chapter_base_url(&url);
    tracing::debug!(url = %url, base_url = %base_url, "walking multipage chapter");

    stream::try_unfold(url, move |url| {
        next_chapter_page(fetcher, source, base_url.clone(), url)
    })
    .boxed_local()
}

async fn next_chapter_page(
    fetcher: &dyn Fetcher,
    source: &SourceDescriptor,
    base_url: String,
    url: String,
) -> Result<Option<(Page, String)>, ScraperError> {
    if !url.contains(&base_url) {
        tracing::debug!(next = %url, "left chapter");
        return Ok(None);
    }

    match fetch_page(fetcher, source, &url).await {
        Ok(fetched) => Ok(Some((fetched.page, fetched.next_url))),
        Err(e @ ScraperError::InvalidArgument(_)) => {
            tracing::warn!(url = %url, error = %e, "page unreachable, ending chapter");
            Ok(None)
        }
        Err(e @ ScraperError::NotFound(_)) => {
            tracing::debug!(url = %url, error = %e, "no page image, ending chapter");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

enum SinglePageState {
    Start(String),
    Scanning { url: String, document: Html },
}

/// Streams every page image from a single chapter document.
///
/// The document is fetched once; each image is removed from it after being
/// downloaded until no matching image is left.
pub fn singlepage_chapter<'a>(
    fetcher: &'a dyn Fetcher,
    source: &'a SourceDescriptor,
    url: String,
) -> PageStream<'a> {
    stream::try_unfold(SinglePageState::Start(url), move |state| {
        next_document_image(fetcher, source, state)
    })
    .boxed_local()
}

async fn next_document_image(
    fetcher: &dyn Fetcher,
    source: &SourceDescriptor,
    state: SinglePageState,
) -> Result<Option<(Page, SinglePageState)>, ScraperError> {
    match state {
        SinglePageState::Start(url) => {
            let fetched = fetch_page(fetcher, source, &url).await?;
            let document = fetched.document;
            Ok(Some((fetched.page, SinglePageState::Scanning { url, document })))
        }
        SinglePageState::Scanning { url, mut document } => {
            let Some(pulled) = pull_page_image(&mut document, source, &url)? else {
                return Ok(None);
            };
            let page = download_image(fetcher, &pulled.image_url).await?;
            Ok(Some((page, SinglePageState::Scanning { url, document })))
        }
    }
}
