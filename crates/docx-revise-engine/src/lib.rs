pub mod api;
pub mod diff;
pub mod document;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod patch;
pub mod revise;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use api::{Defaults, RevisionRequest, RevisionResponse, handle};
pub use diff::{DiffOp, diff};
pub use document::{Document, ParagraphId, RevisionAuthor};
pub use error::{PatchError, RevisionError};
pub use extract::{Edit, ExtractOptions, Extraction, SkippedHunk, extract, extract_with};
pub use normalize::{normalize, normalize_for_matching};
pub use patch::{
    EditOutcome, OccurrencePolicy, PatchOptions, PatchReport, RevisionMode, SpanPolicy,
};
pub use revise::{ReviseOptions, RevisionResult, revise};
