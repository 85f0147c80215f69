//! Locale-fixed text and number normalization.
//!
//! Price and rating strings on the target sites use Turkish formatting:
//! `.` as the thousands separator and `,` as the decimal separator.
//! These helpers are fixed to that locale rather than guessing.

/// Parse a price string into major currency units.
///
/// Currency tokens, whitespace and any other non-numeric characters are
/// stripped, thousands separators removed, the decimal comma replaced
/// with a dot. Unparsable input yields `0.0`, never an error.
///
/// `"342,39 TL"` parses to `342.39`, `"1.299,90 TL"` to `1299.9`.
pub fn parse_price(raw: &str) -> f64 {
    let numeric: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    numeric
        .replace('.', "")
        .replace(',', ".")
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Parse a rating value like `"4,6"` or `"4.6"`. Ratings carry no
/// thousands separator, so the dot is kept as-is.
pub fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Pull the digits out of a count label like `"1.240 Değerlendirme"`.
pub fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok()
}

/// Lowercase a display label and join its words with hyphens, for use
/// in derived SKU suffixes. `"Koyu Mavi"` becomes `"koyu-mavi"`.
pub fn slug(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
