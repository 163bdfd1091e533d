use unicode_normalization::UnicodeNormalization;

use crate::html;

/// Text clean-up steps applied before pre-tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalizer {
    None,
    /// Unescape HTML once, then repair mis-decoded UTF-8, stray control
    /// characters, curly quotes, ligatures and full-width forms, then NFC.
    FixText,
    HtmlUnescape { passes: usize },
    /// Every whitespace run becomes one space; leading and trailing space is trimmed.
    CollapseWhitespace,
    Lowercase,
    Nfc,
    Sequence(Vec<Normalizer>),
    /// Reapply `inner` until its output stops changing, at most `max_passes` times.
    UntilStable {
        inner: Box<Normalizer>,
        max_passes: usize,
    },
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::clip()
    }
}

impl Normalizer {
    /// fix-text → unescape twice → collapse whitespace → lowercase, repeated
    /// until stable so that normalizing twice changes nothing.
    pub fn clip() -> Self {
        Normalizer::UntilStable {
            inner: Box::new(Normalizer::Sequence(vec![
                Normalizer::FixText,
                Normalizer::HtmlUnescape { passes: 2 },
                Normalizer::CollapseWhitespace,
                Normalizer::Lowercase,
            ])),
            max_passes: 4,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        apply_normalizer(self, text)
    }
}

fn apply_normalizer(norm: &Normalizer, text: &str) -> String {
    match norm {
        Normalizer::None => text.to_string(),
        Normalizer::FixText => fix_text(text),
        Normalizer::HtmlUnescape { passes } => {
            let mut s = text.to_string();
            for _ in 0..*passes {
                s = html::unescape(&s);
            }
            s
        }
        Normalizer::CollapseWhitespace => collapse_whitespace(text),
        Normalizer::Lowercase => text.to_lowercase(),
        Normalizer::Nfc => text.nfc().collect(),
        Normalizer::Sequence(norms) => {
            let mut s = text.to_string();
            for n in norms {
                s = apply_normalizer(n, &s);
            }
            s
        }
        Normalizer::UntilStable { inner, max_passes } => {
            let mut s = text.to_string();
            for _ in 0..*max_passes {
                let next = apply_normalizer(inner, &s);
                if next == s {
                    break;
                }
                s = next;
            }
            s
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Windows-1252 characters for bytes 0x80..=0x9F. The five bytes Windows-1252
/// leaves undefined decode to the matching C1 control, as browsers do.
pub(crate) const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2C6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8D}', '\u{17D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2DC}', '\u{2122}', '\u{161}', '\u{203A}', '\u{153}', '\u{9D}', '\u{17E}', '\u{178}',
];

/// The byte a character came from if it was produced by decoding as Windows-1252
/// (or Latin-1, for the C1 range).
fn cp1252_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp <= 0xFF {
        return Some(cp as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|&h| h == c)
        .map(|i| 0x80 + i as u8)
}

/// Sequence length for the lead bytes that show up in mis-decoded text: `Â` and
/// `Ã` (Latin-1 range), `Å` (Latin Extended-A), `â` (general punctuation such as
/// `â€™`) and `ð` (emoji). Other leads are accented letters that legitimately
/// precede a curly quote or dash, so they are never re-decoded.
fn utf8_sequence_len(lead: u8) -> usize {
    match lead {
        0xC2 | 0xC3 | 0xC5 => 2,
        0xE2 => 3,
        0xF0 => 4,
        _ => 0,
    }
}

/// One pass of mojibake repair: every run that starts with a mojibake lead and
/// whose Windows-1252 bytes form a complete UTF-8 sequence is replaced by the
/// decoded character.
fn repair_mojibake_once(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut i = 0;
    while i < chars.len() {
        let seq_len = cp1252_byte(chars[i]).map_or(0, utf8_sequence_len);
        if seq_len > 0 && i + seq_len <= chars.len() {
            let bytes: Option<Vec<u8>> = chars[i..i + seq_len]
                .iter()
                .enumerate()
                .map(|(k, &c)| {
                    cp1252_byte(c).filter(|&b| k == 0 || (0x80..=0xBF).contains(&b))
                })
                .collect();
            if let Some(decoded) = bytes.and_then(|b| String::from_utf8(b).ok()) {
                out.push_str(&decoded);
                i += seq_len;
                changed = true;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    changed.then_some(out)
}

fn fix_encoding(text: &str) -> String {
    let mut s = text.to_string();
    // Text encoded wrongly more than once needs more than one pass.
    for _ in 0..4 {
        match repair_mojibake_once(&s) {
            Some(fixed) => s = fixed,
            None => break,
        }
    }
    s
}

fn fix_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace(['\r', '\u{2028}', '\u{2029}', '\u{85}'], "\n")
}

fn is_removable_control(c: char) -> bool {
    (c.is_control() && !matches!(c, '\t' | '\n' | '\x0C' | '\r'))
        || matches!(c, '\u{FEFF}' | '\u{FFF9}'..='\u{FFFC}')
}

fn fix_char(c: char, out: &mut String) {
    match c {
        '\u{2BC}' | '\u{2018}'..='\u{201B}' => out.push('\''),
        '\u{201C}'..='\u{201F}' => out.push('"'),
        '\u{FB00}' => out.push_str("ff"),
        '\u{FB01}' => out.push_str("fi"),
        '\u{FB02}' => out.push_str("fl"),
        '\u{FB03}' => out.push_str("ffi"),
        '\u{FB04}' => out.push_str("ffl"),
        '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
        '\u{3000}' => out.push(' '),
        // Full-width ASCII forms.
        '\u{FF01}'..='\u{FF5E}' => {
            out.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
        }
        c if is_removable_control(c) => {}
        c => out.push(c),
    }
}

/// Best-effort repair of text that went through a bad decode or a word processor.
pub fn fix_text(text: &str) -> String {
    let text = fix_line_breaks(&fix_encoding(&html::unescape(text)));
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        fix_char(c, &mut out);
    }
    out.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_utf8_read_as_windows_1252() {
        assert_eq!(fix_text("cafÃ©"), "café");
        assert_eq!(fix_text("donâ€™t"), "don't");
        assert_eq!(fix_text("â€œquotedâ€\u{9d}"), "\"quoted\"");
    }

    #[test]
    fn repairs_double_mojibake() {
        // "é" encoded to UTF-8 and decoded as Windows-1252 twice.
        assert_eq!(fix_text("cafÃƒÂ©"), "café");
    }

    #[test]
    fn accented_capitals_before_punctuation_are_not_mojibake() {
        let n = Normalizer::clip();
        assert_eq!(n.apply("JOS\u{c9}\u{2019}S"), "jos\u{e9}'s");
        assert_eq!(n.apply("Strau\u{df}\u{2019} Walzer"), "strau\u{df}' walzer");
        assert_eq!(n.apply("\u{c9}T\u{c9}\u{2014}2024"), "\u{e9}t\u{e9}\u{2014}2024");
        assert_eq!(fix_text("\u{d6}\u{201c}"), "\u{d6}\"");
    }

    #[test]
    fn repairs_mojibake_behind_entities() {
        // The escaped bytes only become mojibake once unescaped.
        assert_eq!(fix_text("caf&#195;&#169;"), "caf\u{e9}");
        assert_eq!(fix_text("\u{f0}\u{178}\u{2dc}\u{20ac}"), "\u{1f600}");
        assert_eq!(fix_text("Å\u{201c}uvre"), "\u{153}uvre");
    }

    #[test]
    fn leaves_real_latin1_alone() {
        assert_eq!(fix_text("café naïve Größe"), "café naïve Größe");
        assert_eq!(fix_text("\u{4e2d}\u{6587}"), "\u{4e2d}\u{6587}");
    }

    #[test]
    fn strips_controls_and_normalizes_forms() {
        assert_eq!(fix_text("\u{feff}a\u{0}b\u{7}c"), "abc");
        assert_eq!(fix_text("\u{ff28}\u{ff29}"), "HI");
        assert_eq!(fix_text("\u{fb01}ne"), "fine");
        assert_eq!(fix_text("e\u{301}"), "\u{e9}");
        assert_eq!(fix_text("a\r\nb"), "a\nb");
    }

    #[test]
    fn clip_pipeline() {
        let n = Normalizer::clip();
        assert_eq!(n.apply("  Hello\t\n  World  "), "hello world");
        assert_eq!(n.apply("Fish &amp;amp; Chips"), "fish & chips");
        assert_eq!(n.apply("It&#8217;s"), "it's");
        assert_eq!(n.apply("&ldquo;Hi&rdquo;"), "\"hi\"");
        assert_eq!(n.apply(""), "");
        assert_eq!(n.apply(" \t\n "), "");
    }

    #[test]
    fn clip_pipeline_is_idempotent() {
        let n = Normalizer::clip();
        for t in [
            "A  Photo of   a CAT",
            "don\u{2019}t &lt;stop&gt;",
            "naïve café\tMenu",
            "<|startoftext|>Hi<|endoftext|>",
            "It&#8217;s",
            "&amp;#8217;&amp;amp;lt;",
            "&Lt;b&GT;",
            "JOS\u{c9}\u{2019}S \u{c9}T\u{c9}\u{2014}2024",
        ] {
            let once = n.apply(t);
            assert_eq!(n.apply(&once), once, "input {t:?}");
        }
    }

    #[test]
    fn until_stable_reaches_a_fixed_point() {
        // Lowercasing turns an unknown reference into a known one.
        assert_eq!(Normalizer::clip().apply("&Lt;"), "<");
        let once = Normalizer::UntilStable {
            inner: Box::new(Normalizer::HtmlUnescape { passes: 1 }),
            max_passes: 1,
        };
        assert_eq!(once.apply("&amp;amp;"), "&amp;");
    }

    #[test]
    fn sequence_applies_in_order() {
        let n = Normalizer::Sequence(vec![Normalizer::Lowercase, Normalizer::None, Normalizer::Nfc]);
        assert_eq!(n.apply("E\u{301}T\u{c9}"), "\u{e9}t\u{e9}");
    }
}
