use std::collections::HashMap;

/// Bytes whose character is the byte itself: printable ASCII and the printable
/// Latin-1 supplement, minus the soft hyphen.
fn is_printable_byte(b: u8) -> bool {
    matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF)
}

/// The forward table plus its inverse, built once per tokenizer and shared.
#[derive(Debug, Clone)]
pub struct ByteLevel {
    encoder: [char; 256],
    decoder: HashMap<char, u8>,
}

impl Default for ByteLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteLevel {
    /// Printable bytes stand for themselves; the rest take U+0100, U+0101, ...
    /// in byte order, so every byte gets a visible, distinct character.
    pub fn new() -> Self {
        let mut encoder = ['\0'; 256];
        let mut decoder = HashMap::with_capacity(256);
        let mut next_remapped = 0x100u32;
        for b in 0..=u8::MAX {
            let c = if is_printable_byte(b) {
                char::from(b)
            } else {
                // 68 bytes are remapped, so this stays below U+0144.
                let c = char::from_u32(next_remapped).unwrap_or(char::REPLACEMENT_CHARACTER);
                next_remapped += 1;
                c
            };
            encoder[b as usize] = c;
            decoder.insert(c, b);
        }
        ByteLevel { encoder, decoder }
    }

    #[inline]
    pub fn encode_byte(&self, b: u8) -> char {
        self.encoder[b as usize]
    }

    #[inline]
    pub fn decode_char(&self, c: char) -> Option<u8> {
        self.decoder.get(&c).copied()
    }

    /// The 256 base symbols in vocabulary order: bytes that map to themselves
    /// first, then the remapped ones, each group in byte order.
    pub fn alphabet(&self) -> impl Iterator<Item = char> + '_ {
        let printable = (0..=u8::MAX).filter(|&b| is_printable_byte(b));
        let remapped = (0..=u8::MAX).filter(|&b| !is_printable_byte(b));
        printable.chain(remapped).map(|b| self.encoder[b as usize])
    }

    /// Encode raw bytes into the GPT-2 unicode representation.
    pub fn encode_bytes(&self, input: &[u8]) -> String {
        let mut out = String::with_capacity(input.len());
        for &b in input {
            out.push(self.encoder[b as usize]);
        }
        out
    }

    /// Inverse of [`ByteLevel::encode_bytes`]. Characters outside the byte
    /// alphabet (only reachable through hand-built vocabularies) contribute
    /// their own UTF-8 bytes.
    pub fn decode_str(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match self.decode_char(ch) {
                Some(b) => out.push(b),
                None => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_bytes_map_to_themselves() {
        let bl = ByteLevel::new();
        assert_eq!(bl.encode_byte(b'a'), 'a');
        assert_eq!(bl.encode_byte(b'~'), '~');
        assert_eq!(bl.encode_byte(0xE9), 'é');
    }

    #[test]
    fn gaps_map_above_255_in_byte_order() {
        let bl = ByteLevel::new();
        assert_eq!(bl.encode_byte(0x00), '\u{100}');
        assert_eq!(bl.encode_byte(b' '), '\u{120}');
        assert_eq!(bl.encode_byte(0x7F), '\u{121}');
        assert_eq!(bl.encode_byte(0xAD), '\u{143}');
    }

    #[test]
    fn every_byte_round_trips() {
        let bl = ByteLevel::new();
        for b in 0u8..=255 {
            assert_eq!(bl.decode_char(bl.encode_byte(b)), Some(b));
        }
        let distinct: std::collections::HashSet<char> = bl.alphabet().collect();
        assert_eq!(distinct.len(), 256);
    }

    #[test]
    fn alphabet_lists_printable_bytes_first() {
        let bl = ByteLevel::new();
        let order: Vec<char> = bl.alphabet().collect();
        assert_eq!(order[0], '!');
        assert_eq!(order[93], '~');
        assert_eq!(order[94], '\u{a1}');
        assert_eq!(order[187], '\u{ff}');
        assert_eq!(order[188], '\u{100}');
        assert_eq!(order[255], '\u{143}');
    }

    #[test]
    fn decode_str_passes_foreign_chars_through() {
        let bl = ByteLevel::new();
        let encoded = bl.encode_bytes("héllo wörld".as_bytes());
        assert_eq!(bl.decode_str(&encoded), "héllo wörld".as_bytes());
        assert_eq!(bl.decode_str("\u{4e2d}"), "\u{4e2d}".as_bytes());
    }
}
