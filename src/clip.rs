//! CLIP text tokenizer: byte-level BPE with an end-of-word marker.
//!
//! Tokenization: normalize → regex pre-tokenize → byte-encode each piece →
//! BPE through the merge cache → vocabulary lookup. Special tokens skip the
//! byte encoding, BPE and the cache.
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::bpe::{bpe, END_OF_WORD, SYMBOL_SEPARATOR};
use crate::byte_level::ByteLevel;
use crate::cache::{CacheStats, MergeCache};
use crate::config::ClipConfig;
use crate::error::{Error, Result};
use crate::hash::FnvHashMap;
use crate::merges::{load_merges, merge_limit, MergeRanks, MergeRule};
use crate::normalize::Normalizer;
use crate::pretokenize::PreTokenizer;
use crate::vocab::{SpecialTokens, Vocabulary};
use crate::TokenId;

pub struct ClipTokenizer {
    byte_level: Arc<ByteLevel>,
    ranks: Arc<MergeRanks>,
    vocab: Arc<Vocabulary>,
    specials: SpecialTokens,
    /// Normalized spelling of each special token → its declared spelling.
    special_forms: FnvHashMap<String, String>,
    normalizer: Normalizer,
    pre_tokenizer: PreTokenizer,
    cache: MergeCache,
    bos_id: TokenId,
    eos_id: TokenId,
    pad_id: TokenId,
    unk_id: TokenId,
}

impl ClipTokenizer {
    /// Load the merge file named by `config` and build the tokenizer.
    pub fn from_config(config: &ClipConfig) -> Result<Self> {
        let specials = config.special_tokens();
        let limit = merge_limit(config.vocab_size, specials.len());
        let rules = load_merges(&config.merges_path, limit)?;
        Self::new(rules, config)
    }

    pub fn from_merges_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&ClipConfig::default().with_merges_path(path.as_ref()))
    }

    /// Build from rules already in memory; the vocabulary is derived from them.
    pub fn new(rules: Vec<MergeRule>, config: &ClipConfig) -> Result<Self> {
        let byte_level = Arc::new(ByteLevel::new());
        let specials = SpecialTokens::new(config.special_tokens());
        let vocab = Arc::new(Vocabulary::from_merges(&byte_level, &rules, &specials));
        let ranks = Arc::new(MergeRanks::new(rules));
        Self::from_parts(byte_level, ranks, vocab, config)
    }

    /// Assemble from shared tables. The vocabulary is taken as given, so a
    /// symbol the ranks can produce but the vocabulary lacks fails at encode time.
    pub fn from_parts(
        byte_level: Arc<ByteLevel>,
        ranks: Arc<MergeRanks>,
        vocab: Arc<Vocabulary>,
        config: &ClipConfig,
    ) -> Result<Self> {
        let specials = SpecialTokens::new(config.special_tokens());
        let normalizer = Normalizer::clip();
        // Specials are matched in normalized text, so match their normalized form.
        let mut special_forms = FnvHashMap::default();
        for token in specials.iter() {
            let form = normalizer.apply(token);
            if !form.is_empty() {
                special_forms.entry(form).or_insert_with(|| token.to_string());
            }
        }
        let forms: Vec<&str> = special_forms.keys().map(String::as_str).collect();
        let pre_tokenizer = PreTokenizer::new(forms.as_slice())?;
        let resolve = |token: &str| vocab.id(token).ok_or_else(|| Error::UnknownToken(token.to_string()));
        let bos_id = resolve(&config.bos_token)?;
        let eos_id = resolve(&config.eos_token)?;
        let pad_id = resolve(&config.pad_token)?;
        let unk_id = resolve(&config.unk_token)?;
        let cache = if config.cache {
            MergeCache::new()
        } else {
            MergeCache::disabled()
        };

        log::info!(
            "clip tokenizer: {} merge rules, {} vocabulary entries, {} special tokens",
            ranks.len(),
            vocab.len(),
            specials.len()
        );

        Ok(ClipTokenizer {
            byte_level,
            ranks,
            vocab,
            specials,
            special_forms,
            normalizer,
            pre_tokenizer,
            cache,
            bos_id,
            eos_id,
            pad_id,
            unk_id,
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.apply(text)
    }

    /// Split already-normalized text into raw pre-tokens.
    pub fn pretokenize<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        self.pre_tokenizer.split(text)
    }

    /// Merged symbols for one pre-token, separated by [`SYMBOL_SEPARATOR`].
    fn merge_piece(&self, piece: &str) -> Arc<str> {
        let encoded = self.byte_level.encode_bytes(piece.as_bytes());
        self.cache.get_or_compute(&encoded, |t| bpe(&self.ranks, t))
    }

    fn for_each_symbol<F>(&self, text: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let normalized = self.normalize(text);
        for piece in self.pretokenize(&normalized)? {
            if let Some(special) = self.special_forms.get(piece) {
                f(special.as_str())?;
                continue;
            }
            let merged = self.merge_piece(piece);
            for symbol in merged.split(SYMBOL_SEPARATOR) {
                f(symbol)?;
            }
        }
        Ok(())
    }

    /// The BPE symbols `text` encodes to, before id lookup.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.for_each_symbol(text, |s| {
            out.push(s.to_string());
            Ok(())
        })?;
        Ok(out)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut ids = Vec::new();
        self.for_each_symbol(text, |s| {
            let id = self
                .vocab
                .id(s)
                .ok_or_else(|| Error::UnknownToken(s.to_string()))?;
            ids.push(id);
            Ok(())
        })?;
        Ok(ids)
    }

    /// Encode many texts in parallel; the merge cache is shared by all workers.
    pub fn encode_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Result<Vec<Vec<TokenId>>> {
        let encoded = texts.par_iter().map(|t| self.encode(t.as_ref())).collect();
        log::debug!("encode_batch: {} texts, cache {:?}", texts.len(), self.cache.stats());
        encoded
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let mut total = 0;
        self.for_each_symbol(text, |_| {
            total += 1;
            Ok(())
        })?;
        Ok(total)
    }

    /// Ids back to text. Undecodable byte sequences become U+FFFD and every
    /// end-of-word marker becomes a space, so words come back space-terminated.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let mut joined = String::new();
        for &id in ids {
            let symbol = self.vocab.symbol(id).ok_or(Error::UnknownId(id))?;
            joined.push_str(symbol);
        }
        let bytes = self.byte_level.decode_str(&joined);
        Ok(String::from_utf8_lossy(&bytes).replace(END_OF_WORD, " "))
    }

    pub fn convert_tokens_to_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<TokenId>> {
        if tokens.is_empty() {
            return Err(Error::InvalidInput("no tokens to convert".to_string()));
        }
        tokens
            .iter()
            .map(|t| {
                let t = t.as_ref();
                self.vocab.id(t).ok_or_else(|| Error::UnknownToken(t.to_string()))
            })
            .collect()
    }

    pub fn convert_ids_to_tokens(&self, ids: &[TokenId]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                self.vocab
                    .symbol(id)
                    .map(String::from)
                    .ok_or(Error::UnknownId(id))
            })
            .collect()
    }

    /// `bos ids eos`. Only single sequences are supported.
    pub fn build_inputs_with_special_tokens(
        &self,
        ids: &[TokenId],
        pair: Option<&[TokenId]>,
    ) -> Result<Vec<TokenId>> {
        if pair.is_some_and(|p| !p.is_empty()) {
            return Err(Error::InvalidInput(
                "a second sequence is not supported".to_string(),
            ));
        }
        if ids.is_empty() {
            return Err(Error::InvalidInput("token id sequence is empty".to_string()));
        }
        let mut out = Vec::with_capacity(ids.len() + 2);
        out.push(self.bos_id);
        out.extend_from_slice(ids);
        out.push(self.eos_id);
        Ok(out)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Write the symbol table, one per line in id order, to `directory/filename`.
    pub fn save_vocabulary(&self, directory: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
        let path = directory.as_ref().join(filename);
        let file = File::create(&path)?;
        self.vocab.write_to(BufWriter::new(file))?;
        log::debug!("wrote {} symbols to {}", self.vocab.len(), path.display());
        Ok(path)
    }

    pub fn bos_id(&self) -> TokenId {
        self.bos_id
    }

    pub fn eos_id(&self) -> TokenId {
        self.eos_id
    }

    pub fn pad_id(&self) -> TokenId {
        self.pad_id
    }

    pub fn unk_id(&self) -> TokenId {
        self.unk_id
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.specials
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn merge_ranks(&self) -> &Arc<MergeRanks> {
        &self.ranks
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
