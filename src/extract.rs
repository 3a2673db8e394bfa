//! Indicator extraction - syntactic, local, no network calls
//!
//! Each threat-intelligence gate owns an `IndicatorExtractor`. The built-in
//! `PatternExtractor` is a regex per indicator kind; swap in your own
//! extractor for stricter parsing without touching the gate.

use crate::error::{ModerationError, Result};
use crate::types::IndicatorKind;
use regex::Regex;
use std::collections::HashSet;

/// Dotted-quad IPv4 with octets 0–255
pub const IP_PATTERN: &str =
    r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b";

/// `http(s)://` followed by non-space characters
pub const URL_PATTERN: &str = r#"(?i)\bhttps?://[^\s<>"'`]+"#;

/// Dot-separated labels ending in a two-letter country code or a common
/// generic TLD
///
/// Restricting the TLD keeps file names (`notes.txt`) and abbreviations
/// (`Mr.Smith`) out of reputation lookups. Names whose extension is also a
/// country code (`main.rs`, `app.py`) still match.
pub const DOMAIN_PATTERN: &str = concat!(
    r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+",
    r"(?:com|org|net|edu|gov|mil|int|info|biz|name|pro|xyz|top|site|online|app|dev|",
    r"cloud|shop|store|tech|blog|live|club|link|click|icu|vip|mobi|onion|",
    r"example|test|invalid|localhost|[a-z]{2})\b"
);

/// Characters stripped from the end of a URL match (sentence punctuation)
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Pulls indicators of one kind out of free text
pub trait IndicatorExtractor: Send + Sync {
    fn kind(&self) -> IndicatorKind;

    /// All indicators found in `text`, de-duplicated, in first-seen order
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Regex-backed extractor
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    kind: IndicatorKind,
    regex: Regex,
}

impl PatternExtractor {
    /// Extractor with a custom pattern
    pub fn new(kind: IndicatorKind, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            ModerationError::Config(format!("Invalid {} extraction pattern: {}", kind, e))
        })?;
        Ok(Self { kind, regex })
    }

    /// Extractor with the built-in pattern for `kind`
    pub fn for_kind(kind: IndicatorKind) -> Result<Self> {
        let pattern = match kind {
            IndicatorKind::Domain => DOMAIN_PATTERN,
            IndicatorKind::Url => URL_PATTERN,
            IndicatorKind::Ip => IP_PATTERN,
        };
        Self::new(kind, pattern)
    }
}

impl IndicatorExtractor for PatternExtractor {
    fn kind(&self) -> IndicatorKind {
        self.kind
    }

    fn extract(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut indicators = Vec::new();

        for mat in self.regex.find_iter(text) {
            let mut indicator = mat.as_str();
            if self.kind == IndicatorKind::Url {
                indicator = indicator.trim_end_matches(URL_TRAILING_PUNCTUATION);
            }
            if indicator.is_empty() {
                continue;
            }
            if seen.insert(indicator.to_string()) {
                indicators.push(indicator.to_string());
            }
        }

        indicators
    }
}
