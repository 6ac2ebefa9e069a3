use crate::diff::diff;
use crate::document::{Document, RevisionAuthor, has_zip_signature};
use crate::error::RevisionError;
use crate::extract::{ExtractOptions, extract_with};
use crate::normalize::normalize;
use crate::patch::{self, DEFAULT_AUTHOR, PatchOptions, RevisionMode};

#[derive(Debug, Clone)]
pub struct ReviseOptions {
    pub patch: PatchOptions,
    pub extract: ExtractOptions,
}

impl ReviseOptions {
    pub fn tracked(author: RevisionAuthor) -> Self {
        Self {
            patch: PatchOptions::tracked(author),
            extract: ExtractOptions::default(),
        }
    }

    pub fn direct() -> Self {
        Self {
            patch: PatchOptions::direct(),
            extract: ExtractOptions::default(),
        }
    }
}

impl Default for ReviseOptions {
    fn default() -> Self {
        Self::tracked(RevisionAuthor::now(DEFAULT_AUTHOR))
    }
}

/// Output of one revision run.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionResult {
    /// The revised package
    pub document: Vec<u8>,
    pub edits_applied: usize,
    /// Every extracted edit, including ones too short to attempt
    pub edits_total: usize,
    /// Revision marks created; only reported in tracked mode
    pub revisions: Option<usize>,
    /// Skipped hunks first, then one line per edit in order
    pub diagnostics: Vec<String>,
}

/// Diff `original_text` against `modified_text` and apply the resulting
/// edits to the document in `bytes`.
///
/// `bytes` is never modified. Failures here are terminal: no document is
/// returned alongside an error. Individual edits that cannot be applied are
/// not failures; they show up in `diagnostics`.
pub fn revise(
    bytes: &[u8],
    original_text: &str,
    modified_text: &str,
    options: &ReviseOptions,
) -> Result<RevisionResult, RevisionError> {
    if !has_zip_signature(bytes) {
        return Err(RevisionError::InvalidContainer);
    }
    let mut document = Document::from_bytes(bytes)?;

    let ops = diff(&normalize(original_text), &normalize(modified_text));
    let extraction = extract_with(&ops, &options.extract);
    log::info!(
        "Found {} edits to apply ({} hunks skipped)",
        extraction.edits.len(),
        extraction.skipped.len()
    );

    let report = patch::apply(&mut document, &extraction.edits, &options.patch);
    let revised = document.to_bytes()?;

    let diagnostics = extraction
        .skipped
        .iter()
        .map(ToString::to_string)
        .chain(
            extraction
                .edits
                .iter()
                .zip(&report.outcomes)
                .map(|(edit, outcome)| outcome.describe(edit)),
        )
        .collect();

    log::info!(
        "Applied {} of {} edits",
        report.applied,
        extraction.edits.len()
    );

    Ok(RevisionResult {
        document: revised,
        edits_applied: report.applied,
        edits_total: extraction.edits.len(),
        revisions: (options.patch.mode == RevisionMode::Tracked)
            .then(|| document.revision_count()),
        diagnostics,
    })
}
