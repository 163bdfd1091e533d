//! Merge rules and the pair-rank table built from them.
//!
//! A merge resource is a text file with one rule per line, two symbols separated
//! by whitespace, most preferred first. The first line is a version header and is
//! never a rule.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::FnvHashMap;

/// Number of base byte symbols every byte-level vocabulary starts with.
pub const BYTE_ALPHABET: usize = 256;

pub type MergeRule = (String, String);

/// How many merge rules fit a vocabulary of `vocab_size` entries once the byte
/// alphabet and `num_special` special tokens are accounted for.
pub fn merge_limit(vocab_size: usize, num_special: usize) -> usize {
    vocab_size.saturating_sub(BYTE_ALPHABET + num_special)
}

/// Read at most `limit` rules from a merge file.
pub fn load_merges(path: impl AsRef<Path>, limit: usize) -> Result<Vec<MergeRule>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::ResourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = read_merges(BufReader::new(file), limit).map_err(|e| match e {
        Error::Io(source) => Error::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    log::info!("loaded {} merge rules from {}", rules.len(), path.display());
    Ok(rules)
}

pub fn read_merges<R: BufRead>(reader: R, limit: usize) -> Result<Vec<MergeRule>> {
    let mut rules = Vec::new();
    for (idx, line) in reader.lines().enumerate().skip(1) {
        if rules.len() >= limit {
            break;
        }
        let line = line?;
        if let Some(rule) = parse_rule(&line, idx + 1)? {
            rules.push(rule);
        }
    }
    Ok(rules)
}

pub fn parse_merges(text: &str, limit: usize) -> Result<Vec<MergeRule>> {
    read_merges(text.as_bytes(), limit)
}

fn parse_rule(line: &str, line_no: usize) -> Result<Option<MergeRule>> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (None, _, _) => Ok(None),
        (Some(left), Some(right), None) => Ok(Some((left.to_string(), right.to_string()))),
        _ => Err(Error::MalformedMerge {
            line: line_no,
            text: line.to_string(),
        }),
    }
}

/// Pair → rank lookup. The rank of a rule is its position in the rule list; a
/// pair listed twice keeps the later position.
#[derive(Debug, Clone, Default)]
pub struct MergeRanks {
    // Two levels so lookups borrow both halves without building a key.
    ranks: FnvHashMap<String, FnvHashMap<String, u32>>,
    rules: Vec<MergeRule>,
}

impl MergeRanks {
    pub fn new(rules: Vec<MergeRule>) -> Self {
        let mut ranks: FnvHashMap<String, FnvHashMap<String, u32>> = FnvHashMap::default();
        let mut duplicates = 0usize;
        for (rank, (left, right)) in rules.iter().enumerate() {
            let prev = ranks
                .entry(left.clone())
                .or_default()
                .insert(right.clone(), rank as u32);
            if prev.is_some() {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            log::warn!("{} duplicate merge rules; later ranks take precedence", duplicates);
        }
        MergeRanks { ranks, rules }
    }

    /// `None` means the pair is never merged.
    #[inline]
    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.get(left)?.get(right).copied()
    }

    pub fn rules(&self) -> &[MergeRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<L: Into<String>, R: Into<String>> FromIterator<(L, R)> for MergeRanks {
    fn from_iter<I: IntoIterator<Item = (L, R)>>(iter: I) -> Self {
        MergeRanks::new(
            iter.into_iter()
                .map(|(l, r)| (l.into(), r.into()))
                .collect(),
        )
    }
}
