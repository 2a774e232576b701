//! Content fingerprinting and best-effort PDF metadata extraction.
//!
//! The year heuristic scans the raw bytes for a `D:YYYY...` creation or
//! modification date marker. It is deliberately not a structured PDF parse;
//! absence of a date is a valid, common outcome.

use std::sync::LazyLock;

use regex::bytes::Regex;
use sha2::{Digest, Sha256};

/// Years outside this range are treated as garbage and discarded.
const MIN_PLAUSIBLE_YEAR: i32 = 1990;
const MAX_PLAUSIBLE_YEAR: i32 = 2100;

/// PDF date markers look like `D:20190412103000Z`.
static PDF_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"D:(\d{4})").unwrap());

/// Fingerprint and best-effort metadata for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfMetadata {
    /// Lowercase hex SHA-256 of the raw bytes.
    pub hash: String,
    /// Publication year from document metadata, if one could be found.
    pub year: Option<i32>,
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Extract the content hash and a best-effort publication year from raw bytes.
pub fn extract_metadata(content: &[u8]) -> PdfMetadata {
    PdfMetadata {
        hash: compute_hash(content),
        year: extract_year(content),
    }
}

/// Scan raw bytes for the first `D:YYYY` date marker with a plausible year.
fn extract_year(content: &[u8]) -> Option<i32> {
    let caps = PDF_DATE.captures(content)?;
    let digits = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    let year: i32 = digits.parse().ok()?;
    if (MIN_PLAUSIBLE_YEAR..=MAX_PLAUSIBLE_YEAR).contains(&year) {
        Some(year)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let content = b"the same bytes";
        assert_eq!(compute_hash(content), compute_hash(content));
        assert_eq!(compute_hash(content).len(), 64);
    }

    #[test]
    fn test_hash_differs_for_different_bytes() {
        assert_ne!(compute_hash(b"edition one"), compute_hash(b"edition two"));
    }

    #[test]
    fn test_extract_year_from_creation_date() {
        let content = b"%PDF-1.7 ... /CreationDate (D:20190412103000Z) ...";
        assert_eq!(extract_metadata(content).year, Some(2019));
    }

    #[test]
    fn test_extract_year_first_marker_wins() {
        let content = b"/CreationDate (D:20050101) /ModDate (D:20210301)";
        assert_eq!(extract_metadata(content).year, Some(2005));
    }

    #[test]
    fn test_extract_year_rejects_implausible() {
        let content = b"/CreationDate (D:18990101)";
        assert_eq!(extract_metadata(content).year, None);
    }

    #[test]
    fn test_extract_year_absent() {
        let content = b"%PDF-1.4 no date markers here";
        assert_eq!(extract_metadata(content).year, None);
    }

    #[test]
    fn test_extract_year_not_fooled_by_binary() {
        // A stray "D:" with fewer than four digits must not match.
        let content = b"stream D:19x endstream";
        assert_eq!(extract_metadata(content).year, None);
    }
}
