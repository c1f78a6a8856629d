//! Utility functions for common URL operations.

use url::Url;

/// Resolves a possibly relative link against a base URL.
///
/// Follows standard relative-reference resolution, so `./2` against
/// `http://host/001/page/1` becomes `http://host/001/page/2`. If the base
/// is not a valid absolute URL the link is returned unchanged.
pub fn resolve_url(base: &str, relative: &str) -> String {
    match Url::parse(base).and_then(|base_url| base_url.join(relative)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => relative.to_string(),
    }
}

/// Returns the text after the last `.` of an image URL.
///
/// No validation is done: a URL without a real extension yields whatever
/// follows its last dot (or the whole URL if it has none).
pub fn file_extension(image_url: &str) -> &str {
    image_url
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or(image_url)
}

/// Checks that a string parses as an absolute URL with a scheme.
pub fn is_absolute_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok()
}
