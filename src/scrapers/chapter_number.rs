//! Chapter number extraction from free-text index labels.
//!
//! Index pages label chapters in wildly different ways ("Ch.004",
//! "Vol.10 chapter 85 : ... pt.9", "<title> 55.1"), so the parser removes the
//! series title, then prefers a number that follows a "ch..." token when the
//! label holds more than one.

use crate::error::ScraperError;
use regex::Regex;
use std::sync::LazyLock;

/// Decimal number, preferring a fractional match.
pub(crate) static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+|\d+").unwrap());

/// Number directly after a chapter token such as "ch.", "chap" or "chapter".
static CHAPTER_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bch[a-z]*\W*(\d+\.\d+|\d+)").unwrap());

/// Derives the canonical chapter number from an index label.
///
/// Fails with [`ScraperError::NotFound`] when no number remains once the
/// series title is removed from the label.
pub fn parse_chapter_number(title: &str, label: &str) -> Result<String, ScraperError> {
    let label = label
        .to_lowercase()
        .replacen(&title.to_lowercase(), "", 1);

    let numbers: Vec<&str> = NUMBER_REGEX.find_iter(&label).map(|m| m.as_str()).collect();

    let number = match numbers.as_slice() {
        [] => {
            return Err(ScraperError::NotFound(format!(
                "no chapter number in '{}'",
                label.trim()
            )));
        }
        [only] => *only,
        [first, ..] => CHAPTER_TOKEN_REGEX
            .captures(&label)
            .and_then(|caps| caps.get(1))
            .map_or(*first, |m| m.as_str()),
    };

    Ok(strip_leading_zeros(number))
}

/// Strips leading zeros from the integer part, keeping at least one digit.
fn strip_leading_zeros(number: &str) -> String {
    let (integer, fraction) = match number.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (number, None),
    };

    let integer = match integer.trim_start_matches('0') {
        "" => "0",
        stripped => stripped,
    };

    match fraction {
        Some(fraction) => format!("{}.{}", integer, fraction),
        None => integer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &[(&str, &str)] = &[
        ("{} 77 Vol 08 The Wired Red Wild Card Part 1", "77"),
        ("Vol.10 chapter 85 : The wired red wild card pt.9", "85"),
        ("97 - The Wired Red Wild Card PT.21", "97"),
        ("{} 55.1", "55.1"),
        ("Chaper 20", "20"),
        ("Vol.10 Ch.43", "43"),
        ("CH.004", "4"),
    ];

    #[test]
    fn test_finds_chapter_number_for_any_title() {
        for title in ["title", "300", "NO.7", "The Longest 4Ever"] {
            for (label, expected) in LABELS {
                let label = label.replace("{}", title);
                assert_eq!(
                    parse_chapter_number(title, &label).unwrap(),
                    *expected,
                    "title {:?}, label {:?}",
                    title,
                    label
                );
            }
        }
    }

    #[test]
    fn test_missing_number() {
        assert!(matches!(
            parse_chapter_number("title", "nothing"),
            Err(ScraperError::NotFound(_))
        ));
        assert!(parse_chapter_number("", "nothing").is_err());
    }

    #[test]
    fn test_number_only_in_title() {
        assert!(matches!(
            parse_chapter_number("Series 300", "series 300"),
            Err(ScraperError::NotFound(_))
        ));
    }

    #[test]
    fn test_title_removed_once() {
        assert_eq!(parse_chapter_number("7", "7 7").unwrap(), "7");
    }

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros("004"), "4");
        assert_eq!(strip_leading_zeros("000"), "0");
        assert_eq!(strip_leading_zeros("00.5"), "0.5");
        assert_eq!(strip_leading_zeros("012.10"), "12.10");
    }
}
