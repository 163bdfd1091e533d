use std::path::{Path, PathBuf};

use crate::clip::ClipTokenizer;
use crate::config::TokenizerConfig;
use crate::error::Result;
use crate::wordpiece::WordPieceTokenizer;
use crate::TokenId;

/// The tokenizer families a [`TokenizerConfig`] can select.
pub enum Tokenizer {
    Clip(ClipTokenizer),
    WordPiece(WordPieceTokenizer),
}

impl Tokenizer {
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        match config {
            TokenizerConfig::Clip(c) => ClipTokenizer::from_config(c).map(Tokenizer::Clip),
            TokenizerConfig::WordPiece(c) => {
                WordPieceTokenizer::from_config(c).map(Tokenizer::WordPiece)
            }
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&TokenizerConfig::from_json_file(path)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tokenizer::Clip(_) => "clip",
            Tokenizer::WordPiece(_) => "wordpiece",
        }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        match self {
            Tokenizer::Clip(t) => t.tokenize(text),
            Tokenizer::WordPiece(t) => Ok(t.tokenize(text)),
        }
    }

    /// Ids as the model consumes them. WordPiece wraps its output in
    /// `[CLS] .. [SEP]`; CLIP leaves that to `build_inputs_with_special_tokens`.
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        match self {
            Tokenizer::Clip(t) => t.encode(text),
            Tokenizer::WordPiece(t) => Ok(t.encode(text, None).input_ids),
        }
    }

    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        match self {
            Tokenizer::Clip(t) => t.decode(ids),
            Tokenizer::WordPiece(t) => t.decode(ids),
        }
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        match self {
            Tokenizer::Clip(t) => t.count_tokens(text),
            Tokenizer::WordPiece(t) => Ok(t.count_tokens(text)),
        }
    }

    pub fn vocab_size(&self) -> usize {
        match self {
            Tokenizer::Clip(t) => t.vocab_size(),
            Tokenizer::WordPiece(t) => t.vocab_size(),
        }
    }

    pub fn save_vocabulary(&self, directory: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
        match self {
            Tokenizer::Clip(t) => t.save_vocabulary(directory, filename),
            Tokenizer::WordPiece(t) => t.save_vocabulary(directory, filename),
        }
    }
}

impl From<ClipTokenizer> for Tokenizer {
    fn from(t: ClipTokenizer) -> Self {
        Tokenizer::Clip(t)
    }
}

impl From<WordPieceTokenizer> for Tokenizer {
    fn from(t: WordPieceTokenizer) -> Self {
        Tokenizer::WordPiece(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClipConfig, WordPieceConfig};

    #[test]
    fn dispatches_to_each_family() {
        let clip: Tokenizer = ClipTokenizer::new(
            vec![("l".to_string(), "o".to_string())],
            &ClipConfig::default(),
        )
        .unwrap()
        .into();
        assert_eq!(clip.name(), "clip");
        assert_eq!(clip.tokenize("low").unwrap(), ["lo", "w</w>"]);
        assert_eq!(clip.count_tokens("low").unwrap(), 2);
        assert_eq!(clip.vocab_size(), 512 + 1 + 2);

        let tokens = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "low"];
        let wp: Tokenizer = WordPieceTokenizer::from_tokens(tokens, &WordPieceConfig::default())
            .unwrap()
            .into();
        assert_eq!(wp.name(), "wordpiece");
        assert_eq!(wp.encode("low").unwrap(), [2, 5, 3]);
        assert_eq!(wp.decode(&[2, 5, 3]).unwrap(), "low");
        assert_eq!(wp.count_tokens("low low").unwrap(), 2);
    }

    #[test]
    fn missing_resource_surfaces_from_config() {
        let config = TokenizerConfig::Clip(ClipConfig::default().with_merges_path("/nonexistent/merges.txt"));
        assert!(matches!(
            Tokenizer::from_config(&config),
            Err(crate::Error::ResourceUnavailable { .. })
        ));
    }
}
