//! The channel details page template: selectors and field parsers.

use regex::Regex;
use std::sync::LazyLock;

/// Primary content container on a channel details page.
pub const CONTAINER_SELECTOR: &str = ".Roku-Page-Details-Hero";
/// Channel display name, inside the container.
pub const NAME_SELECTOR: &str = "h1";
/// Average rating, inside the container.
pub const RATING_SELECTOR: &str = ".average-rating";
/// Free-form "<n> ratings" text, inside the container.
pub const RATINGS_AMOUNT_SELECTOR: &str = "[itemprop=\"starRating\"]";

static RATINGS_AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) ratings").expect("static regex"));

/// Parse the average rating text. Blank text means no rating yet.
pub fn parse_rating(text: &str) -> Result<f32, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0.0);
    }
    text.parse::<f32>()
        .map_err(|e| format!("rating {text:?} is not a decimal: {e}"))
}

/// Pull the leading count out of text like "4195815 ratings".
///
/// Text that does not match the pattern counts as zero ratings; a count
/// that matches but overflows `u32` is an error.
pub fn parse_ratings_amount(text: &str) -> Result<u32, String> {
    let Some(captures) = RATINGS_AMOUNT_PATTERN.captures(text) else {
        return Ok(0);
    };
    let digits = &captures[1];
    digits
        .parse::<u32>()
        .map_err(|e| format!("ratings amount {digits:?} out of range: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_parses_decimal() {
        assert_eq!(parse_rating("3.8").unwrap(), 3.8);
        assert_eq!(parse_rating(" 4 \n").unwrap(), 4.0);
    }

    #[test]
    fn blank_rating_is_zero() {
        assert_eq!(parse_rating("").unwrap(), 0.0);
        assert_eq!(parse_rating("   ").unwrap(), 0.0);
    }

    #[test]
    fn garbage_rating_is_an_error() {
        assert!(parse_rating("four stars").is_err());
    }

    #[test]
    fn ratings_amount_extracts_leading_count() {
        assert_eq!(parse_ratings_amount("4195815 ratings").unwrap(), 4195815);
        assert_eq!(
            parse_ratings_amount("Average of 12 ratings so far").unwrap(),
            12
        );
    }

    #[test]
    fn ratings_amount_without_match_is_zero() {
        assert_eq!(parse_ratings_amount("").unwrap(), 0);
        assert_eq!(parse_ratings_amount("no ratings yet").unwrap(), 0);
        assert_eq!(parse_ratings_amount("1 rating").unwrap(), 0);
    }

    #[test]
    fn ratings_amount_overflow_is_an_error() {
        assert!(parse_ratings_amount("99999999999 ratings").is_err());
    }
}
