//! Turning a diff script into find/replace edits.
//!
//! Each delete (optionally followed by an insert) becomes one [`Edit`]. A
//! hunk whose edge falls inside a word is widened to the whole word on both
//! sides, then anchored with a word of unchanged context before and after so
//! the find text is specific enough to locate in a document.
//!
//! Pure insertions never become edits: with nothing deleted there is no text
//! in the document to hang them on. They are reported as [`SkippedHunk`]s.

use std::fmt;

use serde::Serialize;

use crate::diff::DiffOp;

/// One located substitution.
///
/// `find` is never empty and never equal to `replace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub find: String,
    pub replace: String,
    pub deleted_preview: String,
    pub inserted_preview: String,
}

/// A diff hunk that did not produce an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedHunk {
    /// Text added with nothing removed.
    PureInsertion { preview: String },
    /// Only whitespace changed.
    WhitespaceOnly,
    /// Anchored find and replace came out identical.
    NoChange { preview: String },
}

impl fmt::Display for SkippedHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkippedHunk::PureInsertion { preview } => {
                write!(f, "skipped insertion without anchor: '{preview}'")
            }
            SkippedHunk::WhitespaceOnly => write!(f, "skipped whitespace-only change"),
            SkippedHunk::NoChange { preview } => write!(f, "skipped no-op change: '{preview}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Shortest whitespace-delimited word accepted as an anchor.
    pub min_context_word_len: usize,
    /// How far (in chars) into a neighbouring equality to look for an anchor.
    pub context_window: usize,
    /// Preview length in chars.
    pub preview_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_context_word_len: 3,
            context_window: 40,
            preview_len: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub edits: Vec<Edit>,
    pub skipped: Vec<SkippedHunk>,
}

#[derive(Debug)]
enum Segment {
    Equal(String),
    Change { deleted: String, inserted: String },
    PureInsert(String),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ends_in_word(s: &str) -> bool {
    s.chars().last().is_some_and(is_word_char)
}

fn starts_in_word(s: &str) -> bool {
    s.chars().next().is_some_and(is_word_char)
}

/// First `max` chars of `s`.
pub(crate) fn preview(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

fn segments(ops: &[DiffOp]) -> Vec<Segment> {
    let mut out = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        match &ops[i] {
            DiffOp::Equal(t) => out.push(Segment::Equal(t.clone())),
            DiffOp::Insert(t) => out.push(Segment::PureInsert(t.clone())),
            DiffOp::Delete(deleted) => {
                let inserted = match ops.get(i + 1) {
                    Some(DiffOp::Insert(t)) => {
                        i += 1;
                        t.clone()
                    }
                    _ => String::new(),
                };
                out.push(Segment::Change {
                    deleted: deleted.clone(),
                    inserted,
                });
            }
        }
        i += 1;
    }
    out
}

/// Extract edits with default options.
pub fn extract(ops: &[DiffOp]) -> Extraction {
    extract_with(ops, &ExtractOptions::default())
}

pub fn extract_with(ops: &[DiffOp], options: &ExtractOptions) -> Extraction {
    let mut segs = segments(ops);
    let mut extraction = Extraction::default();

    let mut i = 0;
    while i < segs.len() {
        let (mut deleted, mut inserted) = match &segs[i] {
            Segment::Equal(_) => {
                i += 1;
                continue;
            }
            Segment::PureInsert(text) => {
                extraction.skipped.push(SkippedHunk::PureInsertion {
                    preview: preview(text, options.preview_len),
                });
                i += 1;
                continue;
            }
            Segment::Change { deleted, inserted } => (deleted.clone(), inserted.clone()),
        };

        if deleted.trim().is_empty() && inserted.trim().is_empty() {
            extraction.skipped.push(SkippedHunk::WhitespaceOnly);
            i += 1;
            continue;
        }

        widen_left(&mut segs, i, &mut deleted, &mut inserted);
        widen_right(&mut segs, i, &mut deleted, &mut inserted);

        let before = match i.checked_sub(1).map(|p| &segs[p]) {
            Some(Segment::Equal(text)) => context_before(text, options),
            _ => "",
        };
        let after = match segs.get(i + 1) {
            Some(Segment::Equal(text)) => context_after(text, options),
            _ => "",
        };

        let find = format!("{before}{deleted}{after}").trim().to_string();
        let replace = format!("{before}{inserted}{after}").trim().to_string();

        if find.is_empty() || find == replace {
            extraction.skipped.push(SkippedHunk::NoChange {
                preview: preview(&deleted, options.preview_len),
            });
        } else {
            extraction.edits.push(Edit {
                find,
                replace,
                deleted_preview: preview(&deleted, options.preview_len),
                inserted_preview: preview(&inserted, options.preview_len),
            });
        }
        i += 1;
    }

    extraction
}

/// Pull the partial word at the end of the preceding equality into the hunk.
fn widen_left(segs: &mut [Segment], at: usize, deleted: &mut String, inserted: &mut String) {
    let Some(prev) = at.checked_sub(1) else {
        return;
    };
    let Segment::Equal(text) = &mut segs[prev] else {
        return;
    };
    if !ends_in_word(text) || !(starts_in_word(deleted) || starts_in_word(inserted)) {
        return;
    }
    let cut = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let fragment = text.split_off(cut);
    deleted.insert_str(0, &fragment);
    inserted.insert_str(0, &fragment);
}

/// Pull the partial word at the start of the following equality into the
/// hunk. If that empties the equality, the next hunk is joined on.
fn widen_right(segs: &mut Vec<Segment>, at: usize, deleted: &mut String, inserted: &mut String) {
    loop {
        let Some(Segment::Equal(text)) = segs.get_mut(at + 1) else {
            return;
        };
        if !starts_in_word(text) || !(ends_in_word(deleted) || ends_in_word(inserted)) {
            return;
        }
        let cut = text
            .char_indices()
            .find(|(_, c)| !is_word_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let fragment: String = text.drain(..cut).collect();
        deleted.push_str(&fragment);
        inserted.push_str(&fragment);
        if !text.is_empty() {
            return;
        }

        match segs.get(at + 2) {
            Some(Segment::Change {
                deleted: d,
                inserted: n,
            }) => {
                deleted.push_str(d);
                inserted.push_str(n);
            }
            Some(Segment::PureInsert(n)) => inserted.push_str(n),
            _ => return,
        }
        segs.drain(at + 1..at + 3);
    }
}

/// Whitespace-delimited tokens of `s` as byte ranges.
fn tokens(s: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(st)) => {
                out.push((st, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, s.len()));
    }
    out
}

/// Suffix of `equal` starting at its last anchor-worthy word.
fn context_before<'a>(equal: &'a str, options: &ExtractOptions) -> &'a str {
    let window_start = equal
        .char_indices()
        .rev()
        .nth(options.context_window.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = &equal[window_start..];
    let cut_word = window_start > 0
        && !window.starts_with(char::is_whitespace)
        && !equal[..window_start]
            .chars()
            .last()
            .is_some_and(char::is_whitespace);

    tokens(window)
        .into_iter()
        .enumerate()
        .rev()
        .filter(|(n, _)| !(cut_word && *n == 0))
        .find(|(_, (s, e))| window[*s..*e].chars().count() >= options.min_context_word_len)
        .map(|(_, (s, _))| &window[s..])
        .unwrap_or("")
}

/// Prefix of `equal` ending at its first anchor-worthy word.
fn context_after<'a>(equal: &'a str, options: &ExtractOptions) -> &'a str {
    let window_end = equal
        .char_indices()
        .nth(options.context_window)
        .map(|(i, _)| i)
        .unwrap_or(equal.len());
    let window = &equal[..window_end];
    let cut_word = window_end < equal.len()
        && !window.ends_with(char::is_whitespace)
        && !equal[window_end..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace);
    let toks = tokens(window);
    let last = toks.len().saturating_sub(1);

    toks.into_iter()
        .enumerate()
        .filter(|(n, _)| !(cut_word && *n == last))
        .find(|(_, (s, e))| window[*s..*e].chars().count() >= options.min_context_word_len)
        .map(|(_, (_, e))| &window[..e])
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn eq(s: &str) -> DiffOp {
        DiffOp::Equal(s.to_string())
    }
    fn del(s: &str) -> DiffOp {
        DiffOp::Delete(s.to_string())
    }
    fn ins(s: &str) -> DiffOp {
        DiffOp::Insert(s.to_string())
    }

    fn edits_between(old: &str, new: &str) -> Vec<Edit> {
        extract(&diff(&normalize(old), &normalize(new))).edits
    }

    #[test]
    fn anchors_replacement_with_surrounding_words() {
        let edits = edits_between("The quick brown fox jumps", "The quick brown fox leaps");
        insta::assert_debug_snapshot!(edits, @r#"
        [
            Edit {
                find: "fox jumps",
                replace: "fox leaps",
                deleted_preview: "jumps",
                inserted_preview: "leaps",
            },
        ]
        "#);
    }

    #[test]
    fn anchors_on_both_sides() {
        let ops = vec![eq("pay within "), del("thirty"), ins("forty"), eq(" days of receipt")];
        let edits = extract(&ops).edits;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].find, "within thirty days");
        assert_eq!(edits[0].replace, "within forty days");
    }

    #[test]
    fn short_words_are_skipped_when_anchoring() {
        let ops = vec![eq("sent to a "), del("client"), ins("customer"), eq(" of us")];
        let edits = extract(&ops).edits;
        assert_eq!(edits[0].find, "sent to a client");
        assert_eq!(edits[0].replace, "sent to a customer");
    }

    #[test]
    fn anchors_reach_past_short_adjacent_words() {
        // the neighbours "a" and "of" are too short to locate anything
        let ops = vec![eq("sent to a "), del("client"), ins("customer"), eq(" of us all")];
        let edit = &extract(&ops).edits[0];
        assert_eq!(edit.find, "sent to a client of us all");
        assert_eq!(edit.replace, "sent to a customer of us all");

        let nearest_only = ExtractOptions {
            context_window: 2,
            ..ExtractOptions::default()
        };
        let edit = &extract_with(&ops, &nearest_only).edits[0];
        assert_eq!(edit.find, "client");
    }

    #[test]
    fn pure_deletion_has_empty_insertion() {
        let ops = vec![eq("keep this "), del("very "), eq("short text")];
        let extraction = extract(&ops);
        assert_eq!(
            extraction.edits,
            vec![Edit {
                find: "this very short".to_string(),
                replace: "this short".to_string(),
                deleted_preview: "very".to_string(),
                inserted_preview: String::new(),
            }]
        );
    }

    #[test]
    fn pure_insertion_is_skipped() {
        let extraction = extract(&diff(
            "First sentence. Last sentence.",
            "First sentence. A brand new sentence. Last sentence.",
        ));
        assert!(extraction.edits.is_empty());
        assert!(matches!(
            extraction.skipped.as_slice(),
            [SkippedHunk::PureInsertion { .. }]
        ));
    }

    #[test]
    fn whitespace_only_change_is_skipped() {
        let ops = vec![eq("alpha"), del("  "), ins("\n"), eq("beta")];
        let extraction = extract(&ops);
        assert!(extraction.edits.is_empty());
        assert_eq!(extraction.skipped, vec![SkippedHunk::WhitespaceOnly]);
    }

    #[test]
    fn smart_quotes_do_not_produce_quote_only_edits() {
        let edits = edits_between(
            "He said \u{201C}hello\u{201D} twice",
            "He said \"hello\" twice",
        );
        assert!(edits.is_empty());
    }

    #[test]
    fn smart_quote_text_change_is_a_word_change() {
        let edits = edits_between("He said \u{201C}hello\u{201D}", "He said \u{201C}hi\u{201D}");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].find, "said \"hello");
        assert_eq!(edits[0].replace, "said \"hi");
    }

    #[test]
    fn intra_word_change_widens_to_whole_word() {
        let ops = vec![eq("the colo"), del("u"), eq("r red")];
        let edits = extract(&ops).edits;
        assert_eq!(edits[0].find, "the colour red");
        assert_eq!(edits[0].replace, "the color red");
        assert_eq!(edits[0].deleted_preview, "colour");
    }

    #[test]
    fn hunks_inside_one_word_are_joined() {
        let ops = vec![
            eq("new "),
            del("a"),
            ins("e"),
            eq("bc"),
            del("d"),
            ins("f"),
            eq(" word"),
        ];
        let extraction = extract(&ops);
        assert_eq!(extraction.edits.len(), 1);
        assert_eq!(extraction.edits[0].find, "new abcd word");
        assert_eq!(extraction.edits[0].replace, "new ebcf word");
    }

    #[test]
    fn insert_then_delete_yields_only_the_deletion() {
        let ops = vec![eq("start "), ins("added"), del("removed"), eq(" end of it")];
        let extraction = extract(&ops);
        assert_eq!(extraction.edits.len(), 1);
        assert_eq!(extraction.edits[0].find, "removed end");
        assert_eq!(extraction.edits[0].replace, "end");
        assert_eq!(extraction.skipped.len(), 1);
    }

    #[rstest]
    #[case("the quick brown fox ", "fox ")]
    #[case("see section (", "section (")]
    #[case("a b c ", "")]
    #[case("", "")]
    fn before_context(#[case] equal: &str, #[case] expected: &str) {
        assert_eq!(context_before(equal, &ExtractOptions::default()), expected);
    }

    #[rstest]
    #[case(" days of receipt", " days")]
    #[case(". The end", ". The")]
    #[case(" a b", "")]
    fn after_context(#[case] equal: &str, #[case] expected: &str) {
        assert_eq!(context_after(equal, &ExtractOptions::default()), expected);
    }

    #[test]
    fn context_window_never_yields_a_cut_word() {
        let options = ExtractOptions {
            context_window: 6,
            ..ExtractOptions::default()
        };
        // window is "ghijk " and starts mid-word
        assert_eq!(context_before("abcdefghijk ", &options), "");
        assert_eq!(context_before("abc defg ", &options), "defg ");
        // window is " abcde" and ends mid-word
        assert_eq!(context_after(" abcdefgh", &options), "");
    }

    #[test]
    fn previews_are_trimmed_and_capped() {
        let long = "x".repeat(80);
        let ops = vec![eq("anchor "), del(&format!(" {long} ")), ins("y"), eq(" tail")];
        let edit = &extract(&ops).edits[0];
        assert_eq!(edit.deleted_preview.chars().count(), 50);
        assert_eq!(edit.inserted_preview, "y");
    }
}
