//! HTML character-reference decoding: named entities (the Latin-1 set plus the
//! common typographic ones) and decimal/hex numeric references.
use crate::normalize::CP1252_HIGH;

/// Entity names for U+00A1..=U+00FF, in code point order.
const LATIN1: [&str; 95] = [
    "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf", "laquo",
    "not", "shy", "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro", "para",
    "middot", "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest", "Agrave",
    "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil", "Egrave", "Eacute", "Ecirc",
    "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve", "Oacute", "Ocirc",
    "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute", "THORN",
    "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil", "egrave",
    "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde", "ograve",
    "oacute", "ocirc", "otilde", "ouml", "divide", "oslash", "ugrave", "uacute", "ucirc", "uuml",
    "yacute", "thorn", "yuml",
];

/// Entities that also decode without a trailing `;`.
const LEGACY: &[(&str, &str)] = &[
    ("amp", "&"),
    ("AMP", "&"),
    ("lt", "<"),
    ("LT", "<"),
    ("gt", ">"),
    ("GT", ">"),
    ("quot", "\""),
    ("QUOT", "\""),
    ("nbsp", "\u{A0}"),
    ("COPY", "\u{A9}"),
    ("REG", "\u{AE}"),
];

/// Entities that require the trailing `;`.
const STRICT: &[(&str, &str)] = &[
    ("apos", "'"),
    ("hellip", "\u{2026}"),
    ("mdash", "\u{2014}"),
    ("ndash", "\u{2013}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("sbquo", "\u{201A}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("bdquo", "\u{201E}"),
    ("lsaquo", "\u{2039}"),
    ("rsaquo", "\u{203A}"),
    ("bull", "\u{2022}"),
    ("middot", "\u{B7}"),
    ("trade", "\u{2122}"),
    ("euro", "\u{20AC}"),
    ("dagger", "\u{2020}"),
    ("Dagger", "\u{2021}"),
    ("permil", "\u{2030}"),
    ("prime", "\u{2032}"),
    ("Prime", "\u{2033}"),
    ("OElig", "\u{152}"),
    ("oelig", "\u{153}"),
    ("Scaron", "\u{160}"),
    ("scaron", "\u{161}"),
    ("Yuml", "\u{178}"),
    ("fnof", "\u{192}"),
    ("circ", "\u{2C6}"),
    ("tilde", "\u{2DC}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("thinsp", "\u{2009}"),
    ("zwnj", "\u{200C}"),
    ("zwj", "\u{200D}"),
    ("lrm", "\u{200E}"),
    ("rlm", "\u{200F}"),
    ("larr", "\u{2190}"),
    ("uarr", "\u{2191}"),
    ("rarr", "\u{2192}"),
    ("darr", "\u{2193}"),
    ("harr", "\u{2194}"),
    ("minus", "\u{2212}"),
    ("infin", "\u{221E}"),
    ("ne", "\u{2260}"),
    ("le", "\u{2264}"),
    ("ge", "\u{2265}"),
    ("spades", "\u{2660}"),
    ("clubs", "\u{2663}"),
    ("hearts", "\u{2665}"),
    ("diams", "\u{2666}"),
];

const MAX_NAME_LEN: usize = 32;

fn legacy_entity(name: &str) -> Option<String> {
    if let Some(&(_, v)) = LEGACY.iter().find(|(n, _)| *n == name) {
        return Some(v.to_string());
    }
    // Every Latin-1 entity is a legacy one.
    LATIN1
        .iter()
        .position(|&n| n == name)
        .and_then(|i| char::from_u32(0xA1 + i as u32))
        .map(String::from)
}

fn named_entity(name: &str) -> Option<String> {
    legacy_entity(name).or_else(|| {
        STRICT
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, v)| v.to_string())
    })
}

fn numeric_char(num: u32) -> String {
    match num {
        0x00 => '\u{FFFD}'.to_string(),
        0x0D => '\r'.to_string(),
        0x80..=0x9F => CP1252_HIGH[(num - 0x80) as usize].to_string(),
        0xD800..=0xDFFF => '\u{FFFD}'.to_string(),
        n if n > 0x10FFFF => '\u{FFFD}'.to_string(),
        0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F | 0xFDD0..=0xFDEF => String::new(),
        n if n & 0xFFFE == 0xFFFE => String::new(),
        n => char::from_u32(n).map(String::from).unwrap_or_default(),
    }
}

/// Decode the reference following an `&`. Returns the replacement and the number
/// of bytes consumed after the `&`.
fn decode_reference(s: &str) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    if bytes.first() == Some(&b'#') {
        let (radix, prefix) = match bytes.get(1) {
            Some(b'x') | Some(b'X') => (16, 2),
            _ => (10, 1),
        };
        let digits = s[prefix..]
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if digits == 0 {
            return None;
        }
        let num = u32::from_str_radix(&s[prefix..prefix + digits], radix).unwrap_or(u32::MAX);
        let mut consumed = prefix + digits;
        if bytes.get(consumed) == Some(&b';') {
            consumed += 1;
        }
        return Some((numeric_char(num), consumed));
    }

    let name_len = bytes
        .iter()
        .take(MAX_NAME_LEN)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 {
        return None;
    }
    let name = &s[..name_len];
    if bytes.get(name_len) == Some(&b';') {
        if let Some(v) = named_entity(name) {
            return Some((v, name_len + 1));
        }
    }
    // Longest legacy entity that prefixes the name, e.g. "&ampx" → "&x".
    (2..=name_len)
        .rev()
        .find_map(|len| legacy_entity(&name[..len]).map(|v| (v, len)))
}

pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        match decode_reference(&rest[pos + 1..]) {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &rest[pos + 1 + consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
