use fancy_regex::Regex;

use crate::error::Result;

/// Contractions, letter runs, single digits, and runs of everything else.
/// Only these five English contractions are split off; merge files trained
/// against this pattern depend on it staying exactly so.
pub const CLIP_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d|[\p{L}]+|[\p{N}]|[^\s\p{L}\p{N}]+";

/// Splits normalized text into the pieces BPE runs on. Special tokens are matched
/// verbatim ahead of everything else; whitespace between matches is dropped.
#[derive(Debug, Clone)]
pub struct PreTokenizer {
    regex: Regex,
}

impl PreTokenizer {
    pub fn new<S: AsRef<str>>(specials: &[S]) -> Result<Self> {
        Self::with_pattern(specials, CLIP_PATTERN)
    }

    pub fn with_pattern<S: AsRef<str>>(specials: &[S], pattern: &str) -> Result<Self> {
        let mut escaped: Vec<String> = specials
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .map(|s| fancy_regex::escape(s).into_owned())
            .collect();
        // Longest first, so a special token that prefixes another never shadows it.
        escaped.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut full = String::from("(?i)");
        for s in &escaped {
            full.push_str(s);
            full.push('|');
        }
        full.push_str(pattern);

        let regex = Regex::new(&full)?;
        Ok(PreTokenizer { regex })
    }

    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        let mut pieces = Vec::new();
        for m in self.regex.find_iter(text) {
            let m = m?;
            if !m.as_str().is_empty() {
                pieces.push(m.as_str());
            }
        }
        Ok(pieces)
    }
}
