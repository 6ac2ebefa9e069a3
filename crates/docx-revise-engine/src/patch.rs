//! Applying extracted edits to a [`Document`].
//!
//! Two modes share the same matching machinery:
//!
//! - [`RevisionMode::Tracked`] opens a revision scope, searches every
//!   paragraph (body first, then table cells row-major) case-sensitively,
//!   retries case-insensitively when nothing was found, and by default
//!   replaces every occurrence.
//! - [`RevisionMode::Direct`] mutates run text in place. Per paragraph it
//!   tries a verbatim match inside one run, then a normalized match inside
//!   one run, then a normalized match over the whole paragraph. By default it
//!   stops at the first replacement.
//!
//! Matching is done on strictly normalized text and mapped back through
//! [`NormalizedText`], and only the words that actually differ between
//! `find` and `replace` are touched.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::diff::cleanup::{common_prefix, common_suffix};
use crate::document::{Document, Paragraph, ParagraphId, RevisionAuthor};
use crate::error::PatchError;
use crate::extract::{Edit, preview};
use crate::normalize::{NormalizedText, normalize_for_matching};

pub const TRACKED_MIN_FIND_LEN: usize = 10;
pub const DIRECT_MIN_FIND_LEN: usize = 20;
pub const DEFAULT_AUTHOR: &str = "AI Review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionMode {
    #[default]
    Tracked,
    Direct,
}

/// How many occurrences of a matched edit are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrencePolicy {
    All,
    First,
}

/// What to do with a match that crosses run boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanPolicy {
    /// Put the replacement in the first run and remove the rest of the match
    /// from the following runs.
    #[default]
    Merge,
    Reject,
}

#[derive(Debug, Clone)]
pub struct PatchOptions {
    pub mode: RevisionMode,
    /// Edits whose find text has fewer chars than this are never attempted
    pub min_find_len: usize,
    pub occurrences: OccurrencePolicy,
    pub span_policy: SpanPolicy,
    /// Attribution for tracked revisions; [`DEFAULT_AUTHOR`] now if unset
    pub author: Option<RevisionAuthor>,
}

impl PatchOptions {
    pub fn tracked(author: RevisionAuthor) -> Self {
        Self {
            mode: RevisionMode::Tracked,
            min_find_len: TRACKED_MIN_FIND_LEN,
            occurrences: OccurrencePolicy::All,
            span_policy: SpanPolicy::Merge,
            author: Some(author),
        }
    }

    pub fn direct() -> Self {
        Self {
            mode: RevisionMode::Direct,
            min_find_len: DIRECT_MIN_FIND_LEN,
            occurrences: OccurrencePolicy::First,
            span_policy: SpanPolicy::Merge,
            author: None,
        }
    }

    pub fn for_mode(mode: RevisionMode, author: Option<RevisionAuthor>) -> Self {
        match mode {
            RevisionMode::Tracked => Self {
                author,
                ..Self::tracked(RevisionAuthor::now(DEFAULT_AUTHOR))
            },
            RevisionMode::Direct => Self::direct(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied {
        occurrences: usize,
        case_insensitive: bool,
    },
    SkippedTooShort {
        len: usize,
        min: usize,
    },
    /// Find and replace are the same once normalized.
    Unchanged,
    NotFound,
    /// Found, but every match was refused by the document.
    Rejected(PatchError),
    /// The replacement itself cannot be written.
    Failed(PatchError),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied { .. })
    }

    /// One diagnostics line for this outcome of `edit`.
    pub fn describe(&self, edit: &Edit) -> String {
        match self {
            EditOutcome::Applied {
                case_insensitive: false,
                occurrences,
            } => format!(
                "Applied: '{}' -> '{}' ({occurrences}x)",
                preview(&edit.deleted_preview, 30),
                preview(&edit.inserted_preview, 30)
            ),
            EditOutcome::Applied {
                case_insensitive: true,
                occurrences,
            } => format!(
                "Applied (case-insensitive): '{}' ({occurrences}x)",
                preview(&edit.find, 30)
            ),
            EditOutcome::SkippedTooShort { len, min } => format!(
                "Skipping short edit ({len} < {min}): '{}'",
                preview(&edit.find, 30)
            ),
            EditOutcome::Unchanged => {
                format!("Unchanged after normalization: '{}'", preview(&edit.find, 30))
            }
            EditOutcome::NotFound => format!("No match for: '{}'", preview(&edit.find, 50)),
            EditOutcome::Rejected(e) => {
                format!("Rejected '{}': {e}", preview(&edit.find, 30))
            }
            EditOutcome::Failed(e) => format!("Error applying edit: {e}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchReport {
    /// Edits with at least one replacement, not occurrences
    pub applied: usize,
    /// One per edit, in order
    pub outcomes: Vec<EditOutcome>,
}

/// The part of a find/replace pair that actually changes.
#[derive(Debug, Clone, PartialEq)]
struct Splice {
    needle: String,
    /// Bytes at the start of `needle` left untouched
    prefix: usize,
    /// Bytes at the end of `needle` left untouched
    suffix: usize,
    insert: String,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word(c: Option<char>) -> bool {
    c.is_some_and(is_word_char)
}

impl Splice {
    /// `None` when there is nothing to change.
    fn between(find: &str, replace: &str) -> Option<Self> {
        if find == replace || find.is_empty() {
            return None;
        }

        let mut prefix = common_prefix(find, replace);
        while prefix > 0 {
            let before = find[..prefix].chars().next_back();
            if is_word(before)
                && (is_word(find[prefix..].chars().next())
                    || is_word(replace[prefix..].chars().next()))
            {
                prefix -= before.map_or(0, char::len_utf8);
            } else {
                break;
            }
        }

        let mut suffix = common_suffix(&find[prefix..], &replace[prefix..]);
        while suffix > 0 {
            let at = find[find.len() - suffix..].chars().next();
            if is_word(at)
                && (is_word(find[..find.len() - suffix].chars().next_back())
                    || is_word(replace[..replace.len() - suffix].chars().next_back()))
            {
                suffix -= at.map_or(0, char::len_utf8);
            } else {
                break;
            }
        }

        Some(Self {
            needle: find.to_string(),
            prefix,
            suffix,
            insert: replace[prefix..replace.len() - suffix].to_string(),
        })
    }

    /// Changed source ranges for every occurrence in `haystack`, shifted by
    /// `offset`.
    fn find_in(
        &self,
        haystack: &NormalizedText,
        case_insensitive: bool,
        offset: usize,
    ) -> Vec<Range<usize>> {
        let folded;
        let (haystack, needle, prefix, suffix) = if case_insensitive {
            folded = haystack.fold_case();
            let end = self.needle.len() - self.suffix;
            (
                &folded,
                fold(&self.needle),
                fold(&self.needle[..self.prefix]).len(),
                fold(&self.needle[end..]).len(),
            )
        } else {
            (haystack, self.needle.clone(), self.prefix, self.suffix)
        };

        haystack
            .find_all(&needle)
            .into_iter()
            .map(|m| {
                let changed = haystack.source_range(m.start + prefix..m.end - suffix);
                changed.start + offset..changed.end + offset
            })
            .collect()
    }

    /// Changed ranges for every verbatim occurrence in `raw`.
    fn find_raw(&self, raw: &str, offset: usize) -> Vec<Range<usize>> {
        raw.match_indices(&self.needle)
            .map(|(start, m)| {
                start + self.prefix + offset..start + m.len() - self.suffix + offset
            })
            .collect()
    }
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

struct Splices {
    verbatim: Splice,
    normalized: Splice,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Paragraph { case_insensitive: bool },
    RunsFirst,
}

/// One replacement to make inside a paragraph.
struct Target<'s> {
    range: Range<usize>,
    insert: &'s str,
}

fn locate<'s>(paragraph: &Paragraph, splices: &'s Splices, strategy: Strategy) -> Vec<Target<'s>> {
    let text = paragraph.text();
    let whole = NormalizedText::strict(&text);
    let normalized = &splices.normalized;
    let targets = |ranges: Vec<Range<usize>>, splice: &'s Splice| -> Vec<Target<'s>> {
        ranges
            .into_iter()
            .map(|range| Target {
                range,
                insert: &splice.insert,
            })
            .collect()
    };

    match strategy {
        Strategy::Paragraph { case_insensitive } => {
            targets(normalized.find_in(&whole, case_insensitive, 0), normalized)
        }
        Strategy::RunsFirst => {
            if whole.find_all(&normalized.needle).is_empty() {
                return Vec::new();
            }
            let spans = paragraph.run_spans();

            let verbatim: Vec<Range<usize>> = spans
                .iter()
                .flat_map(|span| splices.verbatim.find_raw(&text[span.clone()], span.start))
                .collect();
            if !verbatim.is_empty() {
                return targets(verbatim, &splices.verbatim);
            }

            let in_run: Vec<Range<usize>> = spans
                .iter()
                .flat_map(|span| {
                    let run_text = NormalizedText::strict(&text[span.clone()]);
                    normalized.find_in(&run_text, false, span.start)
                })
                .collect();
            if !in_run.is_empty() {
                return targets(in_run, normalized);
            }

            targets(normalized.find_in(&whole, false, 0), normalized)
        }
    }
}

#[derive(Debug, Default)]
struct Pass {
    found: usize,
    applied: usize,
    error: Option<PatchError>,
}

fn replace_one(
    document: &mut Document,
    id: ParagraphId,
    target: &Target,
    span_policy: SpanPolicy,
) -> Result<(), PatchError> {
    let touched = document
        .paragraph(id)
        .map_or(0, |p| p.runs_touched(target.range.clone()).len());
    if touched > 1 && span_policy == SpanPolicy::Reject {
        return Err(PatchError::SpansRuns(touched));
    }
    document.replace(id, target.range.clone(), target.insert)
}

fn run_pass(
    document: &mut Document,
    splices: &Splices,
    strategy: Strategy,
    options: &PatchOptions,
) -> Pass {
    let mut pass = Pass::default();

    for id in document.paragraph_ids() {
        let Some(paragraph) = document.paragraph(id) else {
            continue;
        };
        let targets = locate(paragraph, splices, strategy);
        pass.found += targets.len();

        match options.occurrences {
            OccurrencePolicy::First => {
                for target in &targets {
                    match replace_one(document, id, target, options.span_policy) {
                        Ok(()) => {
                            pass.applied += 1;
                            return pass;
                        }
                        Err(e) => {
                            pass.error.get_or_insert(e);
                        }
                    }
                }
            }
            // right to left so earlier offsets stay valid
            OccurrencePolicy::All => {
                for target in targets.iter().rev() {
                    match replace_one(document, id, target, options.span_policy) {
                        Ok(()) => pass.applied += 1,
                        Err(e) => {
                            pass.error.get_or_insert(e);
                        }
                    }
                }
            }
        }
    }

    pass
}

fn apply_edit(document: &mut Document, edit: &Edit, options: &PatchOptions) -> EditOutcome {
    let len = edit.find.chars().count();
    if len < options.min_find_len {
        return EditOutcome::SkippedTooShort {
            len,
            min: options.min_find_len,
        };
    }

    let needle = normalize_for_matching(&edit.find);
    let replacement = normalize_for_matching(&edit.replace);
    let (Some(verbatim), Some(normalized)) = (
        Splice::between(&edit.find, &edit.replace),
        Splice::between(&needle, &replacement),
    ) else {
        return EditOutcome::Unchanged;
    };
    if let Some(ch) = [&verbatim.insert, &normalized.insert]
        .into_iter()
        .find_map(|s| crate::document::invalid_xml_char(s))
    {
        return EditOutcome::Failed(PatchError::InvalidCharacter(ch as u32));
    }
    let splices = Splices {
        verbatim,
        normalized,
    };

    let (pass, case_insensitive) = match options.mode {
        RevisionMode::Tracked => {
            let pass = run_pass(
                document,
                &splices,
                Strategy::Paragraph {
                    case_insensitive: false,
                },
                options,
            );
            if pass.found > 0 {
                (pass, false)
            } else {
                let strategy = Strategy::Paragraph {
                    case_insensitive: true,
                };
                (run_pass(document, &splices, strategy, options), true)
            }
        }
        RevisionMode::Direct => (
            run_pass(document, &splices, Strategy::RunsFirst, options),
            false,
        ),
    };

    if pass.applied > 0 {
        EditOutcome::Applied {
            occurrences: pass.applied,
            case_insensitive,
        }
    } else if let Some(e) = pass.error {
        EditOutcome::Rejected(e)
    } else {
        EditOutcome::NotFound
    }
}

/// Apply `edits` in order. Never aborts: each edit gets an outcome.
pub fn apply(document: &mut Document, edits: &[Edit], options: &PatchOptions) -> PatchReport {
    if options.mode == RevisionMode::Tracked {
        let author = options
            .author
            .clone()
            .unwrap_or_else(|| RevisionAuthor::now(DEFAULT_AUTHOR));
        document.start_track_revisions(author);
    }

    let mut outcomes = Vec::with_capacity(edits.len());
    for edit in edits {
        let outcome = apply_edit(document, edit, options);
        match &outcome {
            EditOutcome::Applied { .. }
            | EditOutcome::SkippedTooShort { .. }
            | EditOutcome::Unchanged => log::debug!("{}", outcome.describe(edit)),
            _ => log::warn!("{}", outcome.describe(edit)),
        }
        outcomes.push(outcome);
    }

    if options.mode == RevisionMode::Tracked {
        document.stop_track_revisions();
    }

    PatchReport {
        applied: outcomes.iter().filter(|o| o.is_applied()).count(),
        outcomes,
    }
}
