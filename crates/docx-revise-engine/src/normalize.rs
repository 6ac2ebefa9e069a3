//! Typographic normalization.
//!
//! Authoring tools and language models disagree about quotes, dashes and
//! spaces. Everything that compares text (the diff, and the search inside the
//! document) goes through one of two modes:
//!
//! - **loose** ([`normalize`]): canonicalizes characters only. Line structure
//!   survives, which keeps diff hunks aligned with the source lines.
//! - **strict** ([`normalize_for_matching`]): loose, plus whitespace runs
//!   collapsed to one space and both ends trimmed. Used for matching against
//!   document text, where run boundaries and `w:tab` elements make the raw
//!   whitespace unreliable.
//!
//! [`NormalizedText`] keeps, for every byte of normalized output, the byte
//! range of source text it came from, so a match found in normalized space can
//! be spliced back into the untouched source.

use std::ops::Range;

/// Canonical replacement for a single character.
fn canonical(ch: char) -> Option<&'static str> {
    match ch {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{2036}' => Some("\""),
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{2035}' => Some("'"),
        '\u{2013}' | '\u{2014}' | '\u{2015}' => Some("-"),
        '\u{00A0}' | '\u{2000}'..='\u{200B}' => Some(" "),
        '\u{2026}' => Some("..."),
        _ => None,
    }
}

fn is_space(ch: char) -> bool {
    ch.is_whitespace() || canonical(ch) == Some(" ")
}

/// Loose normalization: typographic variants only, whitespace untouched
/// apart from exotic spaces becoming plain spaces.
pub fn normalize(text: &str) -> String {
    NormalizedText::loose(text).text
}

/// Strict normalization: [`normalize`] plus whitespace collapse and trim.
pub fn normalize_for_matching(text: &str) -> String {
    NormalizedText::strict(text).text
}

/// Normalized text with a byte-level index back into its source.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    text: String,
    /// `index[i]` is the source byte range that produced normalized byte `i`
    index: Vec<Range<usize>>,
    source_len: usize,
}

impl NormalizedText {
    pub fn loose(source: &str) -> Self {
        let mut out = Self::empty(source.len());
        for (pos, ch) in source.char_indices() {
            out.push_char(ch, pos..pos + ch.len_utf8());
        }
        out
    }

    pub fn strict(source: &str) -> Self {
        let mut out = Self::empty(source.len());
        let mut pending: Option<Range<usize>> = None;

        for (pos, ch) in source.char_indices() {
            let span = pos..pos + ch.len_utf8();
            if is_space(ch) {
                pending = Some(match pending {
                    Some(open) => open.start..span.end,
                    None => span,
                });
                continue;
            }
            if let Some(ws) = pending.take()
                && !out.text.is_empty()
            {
                out.push_str(" ", ws);
            }
            out.push_char(ch, span);
        }

        out
    }

    fn empty(source_len: usize) -> Self {
        Self {
            text: String::new(),
            index: Vec::new(),
            source_len,
        }
    }

    fn push_char(&mut self, ch: char, span: Range<usize>) {
        match canonical(ch) {
            Some(replacement) => self.push_str(replacement, span),
            None => {
                let mut buf = [0u8; 4];
                self.push_str(ch.encode_utf8(&mut buf), span);
            }
        }
    }

    fn push_str(&mut self, s: &str, span: Range<usize>) {
        self.text.push_str(s);
        self.index.extend(std::iter::repeat_n(span, s.len()));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Lower-cased copy for case-insensitive search. The index still points
    /// into the original source.
    pub fn fold_case(&self) -> Self {
        let mut out = Self::empty(self.source_len);
        for (pos, ch) in self.text.char_indices() {
            let span = self.index[pos].clone();
            for lower in ch.to_lowercase() {
                let mut buf = [0u8; 4];
                out.push_str(lower.encode_utf8(&mut buf), span.clone());
            }
        }
        out
    }

    /// Non-overlapping occurrences of `needle`, left to right, as normalized
    /// byte ranges.
    pub fn find_all(&self, needle: &str) -> Vec<Range<usize>> {
        if needle.is_empty() {
            return Vec::new();
        }
        self.text
            .match_indices(needle)
            .map(|(start, m)| start..start + m.len())
            .collect()
    }

    /// Map a normalized byte range back to the source byte range it covers.
    ///
    /// An empty range maps to an insertion point in the source.
    pub fn source_range(&self, range: Range<usize>) -> Range<usize> {
        if range.is_empty() {
            let point = self.source_point(range.start);
            return point..point;
        }
        let start = self.index[range.start].start;
        let end = self.index[range.end - 1].end;
        start..end
    }

    fn source_point(&self, at: usize) -> usize {
        if at == 0 {
            self.index.first().map(|r| r.start).unwrap_or(0)
        } else if at >= self.index.len() {
            self.index.last().map(|r| r.end).unwrap_or(self.source_len)
        } else {
            self.index[at].start
        }
    }
}
