use std::io::Write;

use crate::bpe::END_OF_WORD;
use crate::byte_level::ByteLevel;
use crate::hash::{FnvHashMap, FnvHashSet};
use crate::merges::MergeRule;
use crate::TokenId;

pub const START_OF_TEXT: &str = "<|startoftext|>";
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Reserved strings matched verbatim and never merged, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTokens {
    tokens: Vec<String>,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        SpecialTokens::new([START_OF_TEXT, END_OF_TEXT])
    }
}

impl SpecialTokens {
    /// Duplicates are dropped; the first declaration wins.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in tokens {
            let t = t.into();
            if !out.contains(&t) {
                out.push(t);
            }
        }
        SpecialTokens { tokens: out }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.tokens.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Symbol ↔ id tables. Ids are positions; when a symbol occurs more than once
/// the forward map keeps its last position.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    encoder: FnvHashMap<String, TokenId>,
    decoder: Vec<String>,
}

impl Vocabulary {
    /// The byte-level vocabulary implied by a merge list: the byte alphabet, the
    /// alphabet with the end-of-word marker, one symbol per merge in rank order,
    /// then the special tokens.
    pub fn from_merges(byte_level: &ByteLevel, rules: &[MergeRule], specials: &SpecialTokens) -> Self {
        let alphabet: Vec<String> = byte_level.alphabet().map(String::from).collect();
        let marked = alphabet.iter().map(|s| format!("{s}{END_OF_WORD}"));
        let merged = rules.iter().map(|(l, r)| format!("{l}{r}"));

        let symbols: Vec<String> = alphabet
            .iter()
            .cloned()
            .chain(marked)
            .chain(merged)
            .chain(specials.iter().map(String::from))
            .collect();
        Self::from_symbols(symbols)
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let decoder: Vec<String> = symbols.into_iter().map(Into::into).collect();
        let mut encoder = FnvHashMap::default();
        encoder.reserve(decoder.len());
        for (id, symbol) in decoder.iter().enumerate() {
            encoder.insert(symbol.clone(), id as TokenId);
        }
        Vocabulary { encoder, decoder }
    }

    #[inline]
    pub fn id(&self, symbol: &str) -> Option<TokenId> {
        self.encoder.get(symbol).copied()
    }

    #[inline]
    pub fn symbol(&self, id: TokenId) -> Option<&str> {
        self.decoder.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.encoder.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.decoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoder.is_empty()
    }

    /// `(id, symbol)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str)> + '_ {
        self.decoder
            .iter()
            .enumerate()
            .map(|(id, s)| (id as TokenId, s.as_str()))
    }

    /// One symbol per line, in id order. A repeated symbol is written only at
    /// its first position, so the output lists each distinct symbol once.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        let mut seen = FnvHashSet::default();
        for symbol in &self.decoder {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            writer.write_all(symbol.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}
