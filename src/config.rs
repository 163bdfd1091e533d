//! JSON-backed tokenizer configuration. The `type` field picks the tokenizer
//! family; every other field has a default.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vocab::{END_OF_TEXT, START_OF_TEXT};

/// Vocabulary size of the released CLIP text encoders.
pub const CLIP_VOCAB_SIZE: usize = 49152;

pub const DEFAULT_MAX_INPUT_CHARS_PER_WORD: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Merge-rule file: a header line, then one `left right` rule per line.
    pub merges_path: PathBuf,
    /// Caps how many rules are read: byte alphabet + merges + specials.
    pub vocab_size: usize,
    pub bos_token: String,
    pub eos_token: String,
    pub pad_token: String,
    pub unk_token: String,
    /// Memoize BPE results per pre-token.
    pub cache: bool,
}

impl Default for ClipConfig {
    fn default() -> Self {
        ClipConfig {
            merges_path: PathBuf::new(),
            vocab_size: CLIP_VOCAB_SIZE,
            bos_token: START_OF_TEXT.to_string(),
            eos_token: END_OF_TEXT.to_string(),
            pad_token: END_OF_TEXT.to_string(),
            unk_token: END_OF_TEXT.to_string(),
            cache: true,
        }
    }
}

impl ClipConfig {
    pub fn with_merges_path(self, merges_path: impl Into<PathBuf>) -> Self {
        Self {
            merges_path: merges_path.into(),
            ..self
        }
    }

    pub fn with_vocab_size(self, vocab_size: usize) -> Self {
        Self { vocab_size, ..self }
    }

    pub fn with_cache(self, cache: bool) -> Self {
        Self { cache, ..self }
    }

    /// Declared special tokens in bos, eos, pad, unk order, deduplicated.
    pub fn special_tokens(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for t in [&self.bos_token, &self.eos_token, &self.pad_token, &self.unk_token] {
            if !out.contains(t) {
                out.push(t.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordPieceConfig {
    /// `vocab.txt`: one token per line, the line index is the id.
    pub vocab_path: PathBuf,
    pub do_lower_case: bool,
    /// Defaults to `do_lower_case` when unset.
    pub strip_accents: Option<bool>,
    pub tokenize_chinese_chars: bool,
    pub unk_token: String,
    pub sep_token: String,
    pub pad_token: String,
    pub cls_token: String,
    pub mask_token: String,
    pub max_input_chars_per_word: usize,
}

impl Default for WordPieceConfig {
    fn default() -> Self {
        WordPieceConfig {
            vocab_path: PathBuf::new(),
            do_lower_case: true,
            strip_accents: None,
            tokenize_chinese_chars: true,
            unk_token: "[UNK]".to_string(),
            sep_token: "[SEP]".to_string(),
            pad_token: "[PAD]".to_string(),
            cls_token: "[CLS]".to_string(),
            mask_token: "[MASK]".to_string(),
            max_input_chars_per_word: DEFAULT_MAX_INPUT_CHARS_PER_WORD,
        }
    }
}

impl WordPieceConfig {
    pub fn with_vocab_path(self, vocab_path: impl Into<PathBuf>) -> Self {
        Self {
            vocab_path: vocab_path.into(),
            ..self
        }
    }

    pub fn with_lower_case(self, do_lower_case: bool) -> Self {
        Self {
            do_lower_case,
            ..self
        }
    }

    pub fn special_tokens(&self) -> [&str; 5] {
        [
            self.unk_token.as_str(),
            self.sep_token.as_str(),
            self.pad_token.as_str(),
            self.cls_token.as_str(),
            self.mask_token.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TokenizerConfig {
    #[serde(rename = "clip")]
    Clip(ClipConfig),
    #[serde(rename = "wordpiece")]
    WordPiece(WordPieceConfig),
}

impl TokenizerConfig {
    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| Error::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_defaults() {
        let cfg = TokenizerConfig::from_json_str(r#"{"type": "clip", "merges_path": "bpe.txt"}"#)
            .unwrap();
        let TokenizerConfig::Clip(clip) = cfg else {
            panic!("expected clip config");
        };
        assert_eq!(clip.merges_path, PathBuf::from("bpe.txt"));
        assert_eq!(clip.vocab_size, CLIP_VOCAB_SIZE);
        assert!(clip.cache);
        assert_eq!(clip.special_tokens(), [START_OF_TEXT, END_OF_TEXT]);
    }

    #[test]
    fn wordpiece_overrides() {
        let cfg = TokenizerConfig::from_json_str(
            r#"{"type": "wordpiece", "vocab_path": "vocab.txt", "do_lower_case": false}"#,
        )
        .unwrap();
        let TokenizerConfig::WordPiece(wp) = cfg else {
            panic!("expected wordpiece config");
        };
        assert!(!wp.do_lower_case);
        assert_eq!(wp.cls_token, "[CLS]");
        assert_eq!(wp.max_input_chars_per_word, 100);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let err = TokenizerConfig::from_json_str(r#"{"type": "sentencepiece"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn json_round_trip() {
        let cfg = TokenizerConfig::Clip(ClipConfig::default().with_merges_path("m.txt").with_cache(false));
        let text = cfg.to_json_string().unwrap();
        assert_eq!(TokenizerConfig::from_json_str(&text).unwrap(), cfg);
    }

    #[test]
    fn missing_config_file() {
        let err = TokenizerConfig::from_json_file("/nonexistent/tokenizer.json").unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable { .. }));
    }
}
