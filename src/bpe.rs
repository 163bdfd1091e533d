use crate::merges::MergeRanks;

/// Suffix glued onto the last symbol of every word.
pub const END_OF_WORD: &str = "</w>";

/// Separator between symbols in a merged token string.
pub const SYMBOL_SEPARATOR: char = ' ';

/// A word under BPE: its symbols laid out contiguously in one buffer, each a
/// `[start, end)` byte range. Adjacent symbols are adjacent in memory, so
/// merging two neighbors is a range extension with no string allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    buf: String,
    parts: Vec<(usize, usize)>,
}

impl Word {
    /// One symbol per character, with [`END_OF_WORD`] appended to the last.
    pub fn from_token(token: &str) -> Self {
        let mut buf = String::with_capacity(token.len() + END_OF_WORD.len());
        let mut parts = Vec::with_capacity(token.len());
        for (start, ch) in token.char_indices() {
            buf.push(ch);
            parts.push((start, start + ch.len_utf8()));
        }
        buf.push_str(END_OF_WORD);
        match parts.last_mut() {
            Some(last) => last.1 = buf.len(),
            None => parts.push((0, buf.len())),
        }
        Word { buf, parts }
    }

    /// Symbols taken verbatim; no end-of-word marker is added.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buf = String::new();
        let mut parts = Vec::new();
        for s in symbols {
            let start = buf.len();
            buf.push_str(s.as_ref());
            parts.push((start, buf.len()));
        }
        Word { buf, parts }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    fn symbol(&self, i: usize) -> &str {
        let (start, end) = self.parts[i];
        &self.buf[start..end]
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().map(|&(s, e)| &self.buf[s..e])
    }

    /// The adjacent pair with the lowest rank, as the index of its left half.
    fn best_pair(&self, ranks: &MergeRanks) -> Option<(u32, usize)> {
        let mut best: Option<(u32, usize)> = None;
        for i in 0..self.parts.len().saturating_sub(1) {
            if let Some(rank) = ranks.rank(self.symbol(i), self.symbol(i + 1)) {
                if best.map_or(true, |(r, _)| rank < r) {
                    best = Some((rank, i));
                }
            }
        }
        best
    }

    /// Merge every non-overlapping occurrence of the pair at `at`, left to right.
    fn merge_occurrences(&mut self, at: usize) {
        let (l0, l1) = self.parts[at];
        let (r0, r1) = self.parts[at + 1];
        let (first, second) = (&self.buf[l0..l1], &self.buf[r0..r1]);

        let n = self.parts.len();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(n);
        let mut i = 0;
        while i < n {
            let (s, e) = self.parts[i];
            if i + 1 < n
                && &self.buf[s..e] == first
                && {
                    let (ns, ne) = self.parts[i + 1];
                    &self.buf[ns..ne] == second
                }
            {
                merged.push((s, self.parts[i + 1].1));
                i += 2;
            } else {
                merged.push((s, e));
                i += 1;
            }
        }
        self.parts = merged;
    }

    /// Apply merges until a single symbol remains or no adjacent pair is ranked.
    pub fn merge_all(&mut self, ranks: &MergeRanks) {
        while self.parts.len() > 1 {
            let Some((_, at)) = self.best_pair(ranks) else {
                break;
            };
            self.merge_occurrences(at);
        }
    }

    /// Symbols joined by [`SYMBOL_SEPARATOR`].
    pub fn join(&self) -> String {
        let mut out = String::with_capacity(self.buf.len() + self.parts.len());
        for (i, s) in self.symbols().enumerate() {
            if i > 0 {
                out.push(SYMBOL_SEPARATOR);
            }
            out.push_str(s);
        }
        out
    }
}

/// Run BPE on one pre-tokenized, byte-encoded token and return its merged
/// symbols separated by [`SYMBOL_SEPARATOR`].
pub fn bpe(ranks: &MergeRanks, token: &str) -> String {
    let mut word = Word::from_token(token);
    word.merge_all(ranks);
    word.join()
}
