use std::io;

use crate::document::ParagraphId;

/// Terminal failures of a revision request.
///
/// Anything in here aborts the whole request: no partial document is ever
/// returned alongside one of these.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid DOCX file format: missing zip signature")]
    InvalidContainer,
    #[error("Invalid base64 document: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Unreadable document package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Package part {0} not found")]
    MissingPart(&'static str),
    #[error("Malformed document XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Document part is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Failed to write document: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RevisionError {
    /// Whether this error comes from checking the request rather than
    /// from processing the document.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RevisionError::MissingField(_) | RevisionError::InvalidContainer
        )
    }
}

/// Failure to apply one edit at one location.
///
/// These never abort a patch pass; the patcher records them against the
/// edit and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("text contains character U+{0:04X} which cannot be stored in a document")]
    InvalidCharacter(u32),
    #[error("match touches a run with non-text content")]
    ProtectedRun,
    #[error("match spans {0} runs")]
    SpansRuns(usize),
    #[error("match touches text already inside a tracked insertion")]
    InsideInsertion,
    #[error("no paragraph at {0:?}")]
    NoParagraph(ParagraphId),
}
