//! Character-level diff.
//!
//! [`diff`] runs Myers over the characters of both inputs, coalesces the
//! result into maximal [`DiffOp`]s and then always runs the semantic cleanup
//! stages in [`cleanup`]. The cleanup decides where hunk edges fall, and the
//! edit extractor anchors on those edges, so it is not optional.

pub mod cleanup;

use serde::Serialize;
use similar::{Algorithm, ChangeTag, TextDiff};

/// One operation of a diff script.
///
/// Concatenating the text of `Equal` and `Delete` ops gives the old text;
/// `Equal` and `Insert` give the new text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiffOp {
    Equal(String),
    Delete(String),
    Insert(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(t) | DiffOp::Delete(t) | DiffOp::Insert(t) => t,
        }
    }

    pub(crate) fn text_mut(&mut self) -> &mut String {
        match self {
            DiffOp::Equal(t) | DiffOp::Delete(t) | DiffOp::Insert(t) => t,
        }
    }

    /// Same kind of op carrying different text.
    pub(crate) fn with_text(&self, text: String) -> DiffOp {
        match self {
            DiffOp::Equal(_) => DiffOp::Equal(text),
            DiffOp::Delete(_) => DiffOp::Delete(text),
            DiffOp::Insert(_) => DiffOp::Insert(text),
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, DiffOp::Equal(_))
    }

    fn same_kind(&self, tag: ChangeTag) -> bool {
        matches!(
            (self, tag),
            (DiffOp::Equal(_), ChangeTag::Equal)
                | (DiffOp::Delete(_), ChangeTag::Delete)
                | (DiffOp::Insert(_), ChangeTag::Insert)
        )
    }
}

/// Compute the cleaned-up character diff between `old` and `new`.
pub fn diff(old: &str, new: &str) -> Vec<DiffOp> {
    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);

    let mut ops: Vec<DiffOp> = Vec::new();
    for change in text_diff.iter_all_changes() {
        let value = change.value();
        match ops.last_mut() {
            Some(last) if last.same_kind(change.tag()) => last.text_mut().push_str(value),
            _ => ops.push(match change.tag() {
                ChangeTag::Equal => DiffOp::Equal(value.to_string()),
                ChangeTag::Delete => DiffOp::Delete(value.to_string()),
                ChangeTag::Insert => DiffOp::Insert(value.to_string()),
            }),
        }
    }

    cleanup::merge(&mut ops);
    cleanup::semantic(&mut ops);
    ops
}

/// The old text a diff script was computed from.
pub fn source_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Insert(_)))
        .map(DiffOp::text)
        .collect()
}

/// The new text a diff script produces.
pub fn target_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Delete(_)))
        .map(DiffOp::text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn identical_texts_are_one_equality() {
        assert_eq!(diff("same text", "same text"), vec![eq("same text")]);
    }

    #[test]
    fn empty_inputs_give_empty_script() {
        assert!(diff("", "").is_empty());
        assert_eq!(diff("", "new"), vec![ins("new")]);
        assert_eq!(diff("old", ""), vec![del("old")]);
    }

    #[test]
    fn word_substitution() {
        assert_eq!(
            diff("The quick brown fox jumps", "The quick brown fox leaps"),
            vec![
                eq("The quick brown fox "),
                del("jum"),
                ins("lea"),
                eq("ps")
            ]
        );
    }

    #[test]
    fn short_coincidental_equalities_are_absorbed() {
        let ops = diff("the cat sat", "a dog ran");
        assert!(ops.iter().all(|op| !op.is_equal() || op.text().len() > 1));
        assert_eq!(source_text(&ops), "the cat sat");
        assert_eq!(target_text(&ops), "a dog ran");
    }

    #[rstest]
    #[case("The quick brown fox jumps", "The quick brown fox leaps")]
    #[case("He said \"hello\" to me.", "He said \"hi\" to everyone.")]
    #[case("line one\nline two\nline three", "line one\nline 2\nline three\nline four")]
    #[case("caf\u{e9} cr\u{e8}me br\u{fb}l\u{e9}e", "caf\u{e9} au lait")]
    #[case("", "fresh")]
    #[case("abcabcabc", "abcxabc")]
    fn script_reconstructs_both_inputs(#[case] old: &str, #[case] new: &str) {
        let ops = diff(old, new);
        assert_eq!(source_text(&ops), old);
        assert_eq!(target_text(&ops), new);
    }

    #[test]
    fn no_empty_or_adjacent_same_kind_ops() {
        let ops = diff(
            "Payment is due within thirty days of the invoice date.",
            "Payment is due within 45 days of receipt of the invoice.",
        );
        assert!(ops.iter().all(|op| !op.text().is_empty()));
        for pair in ops.windows(2) {
            assert_ne!(
                std::mem::discriminant(&pair[0]),
                std::mem::discriminant(&pair[1])
            );
        }
    }
}
