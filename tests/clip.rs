use std::fs;
use std::path::{Path, PathBuf};

use cliptok::{ClipConfig, ClipTokenizer, Error, Tokenizer, END_OF_TEXT, START_OF_TEXT};
use tempfile::TempDir;

const MERGES: &str = "#version: 0.2\nl o\nlo w</w>\n\ne r</w>\nh i</w>\n";

fn write_merges(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("bpe_simple_vocab.txt");
    fs::write(&path, contents).unwrap();
    path
}

fn tokenizer(dir: &TempDir) -> ClipTokenizer {
    let path = write_merges(dir.path(), MERGES);
    ClipTokenizer::from_merges_file(path).unwrap()
}

#[test]
fn loads_merges_and_tokenizes() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    assert_eq!(tok.merge_ranks().len(), 4);
    assert_eq!(tok.vocab_size(), 512 + 4 + 2);
    assert_eq!(tok.tokenize("Low lower").unwrap(), ["low</w>", "lo", "w", "er</w>"]);
    assert_eq!(tok.tokenize("hi!").unwrap(), ["hi</w>", "!</w>"]);
}

#[test]
fn vocab_size_limits_merges() {
    let dir = TempDir::new().unwrap();
    let path = write_merges(dir.path(), MERGES);
    let config = ClipConfig::default()
        .with_merges_path(&path)
        .with_vocab_size(256 + 2 + 2);
    let tok = ClipTokenizer::from_config(&config).unwrap();
    assert_eq!(tok.merge_ranks().len(), 2);
    assert_eq!(tok.tokenize("lower").unwrap(), ["lo", "w", "e", "r</w>"]);
}

#[test]
fn normalizes_before_splitting() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    assert_eq!(tok.normalize("  &lt;Low&gt;\n\nLOWER "), "<low> lower");
    assert_eq!(
        tok.tokenize("  &lt;Low&gt;\n\nLOWER ").unwrap(),
        ["<</w>", "low</w>", "></w>", "lo", "w", "er</w>"]
    );
}

#[test]
fn decode_restores_words_with_trailing_spaces() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    let ids = tok.encode("low lower").unwrap();
    assert_eq!(tok.decode(&ids).unwrap(), "low lower ");

    let ids = tok.encode("caf\u{e9} \u{1f600}").unwrap();
    assert_eq!(tok.decode(&ids).unwrap(), "caf\u{e9} \u{1f600} ");
}

#[test]
fn special_tokens_wrap_inputs() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    let ids = tok
        .encode(&format!("{START_OF_TEXT}low{END_OF_TEXT}"))
        .unwrap();
    let low = tok.convert_tokens_to_ids(&["low</w>"]).unwrap()[0];
    assert_eq!(ids, [tok.bos_id(), low, tok.eos_id()]);
    assert_eq!(
        tok.build_inputs_with_special_tokens(&[low], None).unwrap(),
        ids
    );
}

#[test]
fn encode_batch_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    let texts = ["low", "lower hi", "", "low low low"];
    let batch = tok.encode_batch(&texts).unwrap();
    for (text, ids) in texts.iter().zip(&batch) {
        assert_eq!(&tok.encode(text).unwrap(), ids);
    }
}

#[test]
fn concurrent_encoding_shares_the_cache() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    let expected = tok.encode("low lower").unwrap();
    tok.clear_cache();

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..50 {
                    assert_eq!(tok.encode("low lower").unwrap(), expected);
                }
            });
        }
    });

    let stats = tok.cache_stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 8 * 50 * 2 - 2);
}

#[test]
fn save_vocabulary_writes_id_order() {
    let dir = TempDir::new().unwrap();
    let tok = tokenizer(&dir);
    let path = tok.save_vocabulary(dir.path(), "vocab.txt").unwrap();
    let saved = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = saved.lines().collect();
    assert_eq!(lines.len(), tok.vocab_size());
    assert_eq!(lines[0], "!");
    assert_eq!(lines[256], "!</w>");
    assert_eq!(lines[512], "lo");
    assert_eq!(lines[lines.len() - 1], END_OF_TEXT);
}

#[test]
fn missing_and_malformed_merge_files() {
    let dir = TempDir::new().unwrap();
    let err = ClipTokenizer::from_merges_file(dir.path().join("absent.txt")).err().unwrap();
    assert!(matches!(err, Error::ResourceUnavailable { .. }));

    let path = write_merges(dir.path(), "#version: 0.2\nl o\nl o w\n");
    match ClipTokenizer::from_merges_file(path) {
        Err(Error::MalformedMerge { line, text }) => {
            assert_eq!(line, 3);
            assert_eq!(text, "l o w");
        }
        Err(other) => panic!("expected MalformedMerge, got {other}"),
        Ok(_) => panic!("expected MalformedMerge"),
    }
}

#[test]
fn tokenizer_from_json_config() {
    let dir = TempDir::new().unwrap();
    let merges = write_merges(dir.path(), MERGES);
    let config_path = dir.path().join("tokenizer.json");
    let config = serde_json::json!({ "type": "clip", "merges_path": merges, "cache": false });
    fs::write(&config_path, config.to_string()).unwrap();

    let tok = Tokenizer::from_json_file(&config_path).unwrap();
    assert_eq!(tok.name(), "clip");
    assert_eq!(tok.count_tokens("low lower").unwrap(), 4);
    let Tokenizer::Clip(clip) = &tok else {
        panic!("expected clip tokenizer");
    };
    clip.encode("low").unwrap();
    assert_eq!(clip.cache_stats().entries, 0);
}
