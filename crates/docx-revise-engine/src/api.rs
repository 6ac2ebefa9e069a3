//! JSON request and response shapes for driving the engine from another
//! process.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::document::RevisionAuthor;
use crate::error::RevisionError;
use crate::extract::ExtractOptions;
use crate::patch::{
    DEFAULT_AUTHOR, DIRECT_MIN_FIND_LEN, PatchOptions, RevisionMode, SpanPolicy,
    TRACKED_MIN_FIND_LEN,
};
use crate::revise::{ReviseOptions, RevisionResult, revise};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequest {
    #[serde(default, alias = "originalDocxBase64")]
    pub original_document_base64: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub modified_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RevisionMode>,
}

impl RevisionRequest {
    /// The first required field that is missing or empty.
    pub fn validate(&self) -> Result<(), RevisionError> {
        let required = [
            ("originalDocumentBase64", &self.original_document_base64),
            ("originalText", &self.original_text),
            ("modifiedText", &self.modified_text),
        ];
        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(RevisionError::MissingField(name)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevisionResponse {
    Success(SuccessResponse),
    Failure(FailureResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
    pub document_base64: String,
    pub edits_applied: usize,
    pub edits_total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl RevisionResponse {
    pub fn success(result: &RevisionResult) -> Self {
        Self::Success(SuccessResponse {
            success: true,
            document_base64: STANDARD.encode(&result.document),
            edits_applied: result.edits_applied,
            edits_total: result.edits_total,
            revisions_count: result.revisions,
            diagnostics: result.diagnostics.clone(),
        })
    }

    /// Failure carrying the error message and its source chain.
    pub fn failure(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        Self::Failure(FailureResponse {
            success: false,
            error: error.to_string(),
            trace,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RevisionResponse::Success(_))
    }
}

/// Settings for requests that do not override them.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub mode: RevisionMode,
    pub author: String,
    pub tracked_min_find_len: usize,
    pub direct_min_find_len: usize,
    pub span_policy: SpanPolicy,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            mode: RevisionMode::Tracked,
            author: DEFAULT_AUTHOR.to_string(),
            tracked_min_find_len: TRACKED_MIN_FIND_LEN,
            direct_min_find_len: DIRECT_MIN_FIND_LEN,
            span_policy: SpanPolicy::Merge,
        }
    }
}

impl Defaults {
    /// Engine options for `request`; its mode and author win over ours.
    pub fn options_for(&self, request: &RevisionRequest) -> ReviseOptions {
        let mode = request.mode.unwrap_or(self.mode);
        let author = request
            .author
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(self.author.as_str());

        let patch = match mode {
            RevisionMode::Tracked => PatchOptions {
                min_find_len: self.tracked_min_find_len,
                span_policy: self.span_policy,
                ..PatchOptions::tracked(RevisionAuthor::now(author))
            },
            RevisionMode::Direct => PatchOptions {
                min_find_len: self.direct_min_find_len,
                span_policy: self.span_policy,
                ..PatchOptions::direct()
            },
        };
        ReviseOptions {
            patch,
            extract: ExtractOptions::default(),
        }
    }
}

fn process(request: &RevisionRequest, defaults: &Defaults) -> Result<RevisionResult, RevisionError> {
    request.validate()?;
    let bytes = STANDARD.decode(request.original_document_base64.trim())?;
    revise(
        &bytes,
        &request.original_text,
        &request.modified_text,
        &defaults.options_for(request),
    )
}

/// Run one request. Every failure becomes a failure response.
pub fn handle(request: &RevisionRequest, defaults: &Defaults) -> RevisionResponse {
    match process(request, defaults) {
        Ok(result) => RevisionResponse::success(&result),
        Err(e) => {
            log::error!("revision failed: {e}");
            RevisionResponse::failure(&e)
        }
    }
}
