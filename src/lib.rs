//! Byte-level BPE tokenization as used by CLIP text encoders, plus a WordPiece
//! tokenizer for BERT-family vocabularies.
//!
//! ```no_run
//! use cliptok::{ClipConfig, ClipTokenizer};
//!
//! let config = ClipConfig::default().with_merges_path("bpe_simple_vocab_16e6.txt");
//! let tokenizer = ClipTokenizer::from_config(&config)?;
//! let ids = tokenizer.encode("a photo of a cat")?;
//! let inputs = tokenizer.build_inputs_with_special_tokens(&ids, None)?;
//! assert_eq!(inputs[0], tokenizer.bos_id());
//! # Ok::<(), cliptok::Error>(())
//! ```

pub mod bpe;
pub mod byte_level;
pub mod cache;
pub mod clip;
pub mod config;
pub mod error;
mod hash;
pub mod html;
pub mod merges;
pub mod normalize;
pub mod pretokenize;
pub mod tokenizer;
pub mod vocab;
pub mod wordpiece;

pub type TokenId = u32;

pub use byte_level::ByteLevel;
pub use cache::CacheStats;
pub use clip::ClipTokenizer;
pub use config::{ClipConfig, TokenizerConfig, WordPieceConfig};
pub use error::{Error, Result};
pub use merges::{MergeRanks, MergeRule};
pub use normalize::Normalizer;
pub use tokenizer::Tokenizer;
pub use vocab::{SpecialTokens, Vocabulary, END_OF_TEXT, START_OF_TEXT};
pub use wordpiece::{Encoding, WordPieceTokenizer};
