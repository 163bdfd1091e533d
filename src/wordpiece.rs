//! WordPiece tokenizer for BERT-family vocabularies.
//!
//! Text is cleaned, optionally lowercased and stripped of accents, split on
//! whitespace and punctuation (CJK ideographs become single-character words),
//! then each word is matched greedily against the vocabulary, longest prefix
//! first, with `##` marking word-internal pieces.
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::WordPieceConfig;
use crate::error::{Error, Result};
use crate::vocab::Vocabulary;
use crate::TokenId;

pub const CONTINUATION_PREFIX: &str = "##";

/// Model inputs for one sequence or a sequence pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub input_ids: Vec<TokenId>,
    /// 0 for the first segment (with its `[CLS]` and `[SEP]`), 1 for the second.
    pub token_type_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    fn push_segment(&mut self, ids: &[TokenId], type_id: u32) {
        self.input_ids.extend_from_slice(ids);
        self.token_type_ids.extend(std::iter::repeat(type_id).take(ids.len()));
        self.attention_mask.extend(std::iter::repeat(1).take(ids.len()));
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

pub struct WordPieceTokenizer {
    vocab: Vocabulary,
    /// Matched whole and never lowercased or split.
    never_split: Vec<String>,
    do_lower_case: bool,
    strip_accents: bool,
    tokenize_chinese_chars: bool,
    max_input_chars_per_word: usize,
    unk_token: String,
    unk_id: TokenId,
    cls_id: TokenId,
    sep_id: TokenId,
    pad_id: TokenId,
}

impl WordPieceTokenizer {
    pub fn from_config(config: &WordPieceConfig) -> Result<Self> {
        Self::from_vocab_file(&config.vocab_path, config)
    }

    /// `vocab.txt` layout: one token per line, the line index is its id.
    pub fn from_vocab_file(path: impl AsRef<Path>, config: &WordPieceConfig) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loading wordpiece vocabulary from {}", path.display());
        Self::from_tokens(text.lines(), config)
    }

    pub fn from_tokens<I, S>(tokens: I, config: &WordPieceConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocab = Vocabulary::from_symbols(tokens);
        let resolve = |token: &str| vocab.id(token).ok_or_else(|| Error::UnknownToken(token.to_string()));
        let unk_id = resolve(&config.unk_token)?;
        let cls_id = resolve(&config.cls_token)?;
        let sep_id = resolve(&config.sep_token)?;
        let pad_id = resolve(&config.pad_token)?;

        log::info!("wordpiece tokenizer: {} vocabulary entries", vocab.len());

        Ok(WordPieceTokenizer {
            never_split: config.special_tokens().iter().map(|s| s.to_string()).collect(),
            do_lower_case: config.do_lower_case,
            strip_accents: config.strip_accents.unwrap_or(config.do_lower_case),
            tokenize_chinese_chars: config.tokenize_chinese_chars,
            max_input_chars_per_word: config.max_input_chars_per_word,
            unk_token: config.unk_token.clone(),
            vocab,
            unk_id,
            cls_id,
            sep_id,
            pad_id,
        })
    }

    /// Whitespace- and punctuation-split words, before WordPiece.
    pub fn basic_tokenize(&self, text: &str) -> Vec<String> {
        let mut cleaned = String::with_capacity(text.len());
        for c in text.chars() {
            if c == '\0' || c == '\u{FFFD}' || is_control(c) {
                continue;
            }
            if self.tokenize_chinese_chars && is_cjk(c) {
                cleaned.push(' ');
                cleaned.push(c);
                cleaned.push(' ');
            } else if c.is_whitespace() {
                cleaned.push(' ');
            } else {
                cleaned.push(c);
            }
        }

        let mut words = Vec::new();
        for word in cleaned.split_whitespace() {
            if self.never_split.iter().any(|s| s == word) {
                words.push(word.to_string());
                continue;
            }
            let mut word = if self.do_lower_case {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            if self.strip_accents {
                word = word.nfd().filter(|&c| !is_combining_mark(c)).collect();
            }
            split_on_punctuation(&word, &mut words);
        }
        words
    }

    /// Greedy longest-match-first split of one word. A word with any unmatched
    /// remainder, or longer than the per-word limit, becomes the unknown token.
    fn wordpiece<'a>(&'a self, word: &'a str, out: &mut Vec<&'a str>) {
        if word.chars().count() > self.max_input_chars_per_word {
            out.push(&self.unk_token);
            return;
        }
        let mark = out.len();
        let mut start = 0;
        let mut candidate = String::new();
        while start < word.len() {
            let mut end = word.len();
            let mut found = None;
            while start < end {
                candidate.clear();
                if start > 0 {
                    candidate.push_str(CONTINUATION_PREFIX);
                }
                candidate.push_str(&word[start..end]);
                if let Some(id) = self.vocab.id(&candidate) {
                    found = Some(id);
                    break;
                }
                end = prev_boundary(word, end);
            }
            match found.and_then(|id| self.vocab.symbol(id)) {
                Some(piece) => out.push(piece),
                None => {
                    out.truncate(mark);
                    out.push(&self.unk_token);
                    return;
                }
            }
            start = end;
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let words = self.basic_tokenize(text);
        let mut pieces = Vec::new();
        for word in &words {
            self.wordpiece(word, &mut pieces);
        }
        pieces.into_iter().map(String::from).collect()
    }

    fn piece_ids(&self, text: &str) -> Vec<TokenId> {
        self.tokenize(text)
            .iter()
            .map(|p| self.vocab.id(p).unwrap_or(self.unk_id))
            .collect()
    }

    /// `[CLS] a [SEP]`, or `[CLS] a [SEP] b` for a pair.
    pub fn encode(&self, text: &str, pair: Option<&str>) -> Encoding {
        let mut enc = Encoding::default();
        let mut first = vec![self.cls_id];
        first.extend(self.piece_ids(text));
        first.push(self.sep_id);
        enc.push_segment(&first, 0);
        if let Some(pair) = pair {
            enc.push_segment(&self.piece_ids(pair), 1);
        }
        enc
    }

    pub fn encode_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Encoding> {
        texts.par_iter().map(|t| self.encode(t.as_ref(), None)).collect()
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }

    /// Pieces joined by spaces, `##` pieces glued to their predecessor.
    /// `[CLS]`, `[SEP]` and `[PAD]` are dropped.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let mut out = String::new();
        for &id in ids {
            if id == self.cls_id || id == self.sep_id || id == self.pad_id {
                continue;
            }
            let piece = self.vocab.symbol(id).ok_or(Error::UnknownId(id))?;
            match piece.strip_prefix(CONTINUATION_PREFIX) {
                Some(rest) if !out.is_empty() => out.push_str(rest),
                _ => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(piece);
                }
            }
        }
        Ok(out)
    }

    pub fn convert_tokens_to_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<TokenId> {
        tokens
            .iter()
            .map(|t| self.vocab.id(t.as_ref()).unwrap_or(self.unk_id))
            .collect()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn save_vocabulary(&self, directory: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
        let path = directory.as_ref().join(filename);
        self.vocab.write_to(BufWriter::new(File::create(&path)?))?;
        log::debug!("wrote {} tokens to {}", self.vocab.len(), path.display());
        Ok(path)
    }

    pub fn cls_id(&self) -> TokenId {
        self.cls_id
    }

    pub fn sep_id(&self) -> TokenId {
        self.sep_id
    }

    pub fn pad_id(&self) -> TokenId {
        self.pad_id
    }

    pub fn unk_id(&self) -> TokenId {
        self.unk_id
    }
}

fn prev_boundary(s: &str, mut i: usize) -> usize {
    i -= 1;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn split_on_punctuation(word: &str, out: &mut Vec<String>) {
    let mut current = String::new();
    for c in word.chars() {
        if is_punctuation(c) {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Control and format characters other than tab, newline and carriage return.
fn is_control(c: char) -> bool {
    if matches!(c, '\t' | '\n' | '\r') {
        return false;
    }
    c.is_control()
        || matches!(
            c as u32,
            0xAD | 0x600..=0x605 | 0x200B..=0x200F | 0x202A..=0x202E | 0x2060..=0x2064 | 0xFEFF
        )
}

/// All non-alphanumeric ASCII counts, plus the Unicode punctuation blocks.
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c as u32,
            0xA1 | 0xA7 | 0xAB | 0xB6 | 0xB7 | 0xBB | 0xBF
                | 0x2010..=0x2027
                | 0x2030..=0x205E
                | 0x3001..=0x3003
                | 0x3008..=0x3011
                | 0x3014..=0x301F
                | 0xFF01..=0xFF03
                | 0xFF05..=0xFF0A
                | 0xFF0C..=0xFF0F
                | 0xFF1A..=0xFF1B
                | 0xFF1F..=0xFF20
        )
}

/// CJK Unified Ideographs and their extensions. Hangul and kana are not included.
fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: [&str; 9] = [
        "[PAD]", "[unused1]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "hello", "world", "!",
    ];

    fn basic() -> WordPieceTokenizer {
        WordPieceTokenizer::from_tokens(BASIC, &WordPieceConfig::default()).unwrap()
    }

    fn subwords() -> WordPieceTokenizer {
        let tokens = BASIC
            .iter()
            .copied()
            .chain(["un", "##aff", "##able", "run", "##ning", "\u{4e2d}", "\u{6587}"]);
        WordPieceTokenizer::from_tokens(tokens, &WordPieceConfig::default()).unwrap()
    }

    #[test]
    fn single_sequence() {
        let tok = basic();
        assert_eq!(tok.tokenize("hello world"), ["hello", "world"]);
        let enc = tok.encode("hello world", None);
        assert_eq!(enc.input_ids, [3, 6, 7, 4]);
        assert_eq!(enc.token_type_ids, [0, 0, 0, 0]);
        assert_eq!(enc.attention_mask, [1, 1, 1, 1]);
    }

    #[test]
    fn sequence_pair() {
        let enc = basic().encode("hello world", Some("hello world !"));
        assert_eq!(enc.input_ids, [3, 6, 7, 4, 6, 7, 8]);
        assert_eq!(enc.token_type_ids, [0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(enc.attention_mask, [1; 7]);
    }

    #[test]
    fn lowercases_and_splits_punctuation() {
        let tok = basic();
        assert_eq!(tok.tokenize("Hello, World!"), ["hello", "[UNK]", "world", "!"]);
        assert_eq!(tok.tokenize("H\u{e9}llo"), ["hello"]);
    }

    #[test]
    fn cased_mode_keeps_case() {
        let config = WordPieceConfig::default().with_lower_case(false);
        let tok = WordPieceTokenizer::from_tokens(BASIC, &config).unwrap();
        assert_eq!(tok.tokenize("Hello world"), ["[UNK]", "world"]);
    }

    #[test]
    fn greedy_continuations() {
        let tok = subwords();
        assert_eq!(tok.tokenize("unaffable running"), ["un", "##aff", "##able", "run", "##ning"]);
        // A partial match is not enough; the whole word becomes unknown.
        assert_eq!(tok.tokenize("unaffected"), ["[UNK]"]);
        assert_eq!(tok.tokenize("helloworld"), ["[UNK]"]);
    }

    #[test]
    fn cjk_characters_are_isolated() {
        assert_eq!(subwords().tokenize("\u{4e2d}\u{6587}"), ["\u{4e2d}", "\u{6587}"]);
    }

    #[test]
    fn special_tokens_are_not_split() {
        let tok = basic();
        assert_eq!(tok.tokenize("[CLS] hello [MASK]"), ["[CLS]", "hello", "[MASK]"]);
    }

    #[test]
    fn overlong_words_are_unknown() {
        let config = WordPieceConfig {
            max_input_chars_per_word: 4,
            ..WordPieceConfig::default()
        };
        let tok = WordPieceTokenizer::from_tokens(BASIC, &config).unwrap();
        assert_eq!(tok.tokenize("hello"), ["[UNK]"]);
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(basic().tokenize("hel\u{200b}lo\u{0}"), ["hello"]);
    }

    #[test]
    fn decode_glues_continuations() {
        let tok = subwords();
        let enc = tok.encode("unaffable world", None);
        assert_eq!(tok.decode(&enc.input_ids).unwrap(), "unaffable world");
        assert!(matches!(tok.decode(&[999]), Err(Error::UnknownId(999))));
    }

    #[test]
    fn missing_special_token_is_rejected() {
        let err = WordPieceTokenizer::from_tokens(["hello"], &WordPieceConfig::default()).err();
        assert!(matches!(err, Some(Error::UnknownToken(ref t)) if t == "[UNK]"));
    }
}
