use std::path::PathBuf;

use thiserror::Error;

use crate::TokenId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("symbol {0:?} is not in the vocabulary")]
    UnknownToken(String),

    #[error("token id {0} is not in the vocabulary")]
    UnknownId(TokenId),

    #[error("resource unavailable: {}: {source}", path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed merge rule at line {line}: {text:?}")]
    MalformedMerge { line: usize, text: String },

    #[error("pre-tokenizer regex failed: {0}")]
    Regex(#[from] Box<fancy_regex::Error>),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::Regex(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
