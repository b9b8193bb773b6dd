//! Response interpretation.
//!
//! The service's replies are loosely shaped. [`interpret`] classifies a raw
//! body into exactly one [`ResponseShape`] before any field of that shape is
//! read, and collects `unparsed` diagnostics independently of the shape.
//! It never fails: undecodable bodies become [`ResponseShape::ErrorResult`].

mod candidate;
mod diagnostics;

pub use candidate::{format_score, Candidate, ScoreVector, ABSENT_SCORE, SUB_SCORE_KEYS};
pub use diagnostics::{Diagnostics, REPORT_LINE_END};

use std::path::{Component, Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::validation::ValidationReport;

/// Reported when the body is not a JSON object.
pub const DECODE_FAILURE_MESSAGE: &str = "SNAC-Alpha returned with an error";

/// Reported when the body decodes but carries no recognized result.
pub const UNRECOGNIZED_RESPONSE_MESSAGE: &str = "SNAC-Alpha returned no usable result";

/// Reported when a downloaded file's content is not valid base64.
pub const FILE_CONTENT_MESSAGE: &str = "SNAC returned a file that could not be decoded";

/// `result` value of a successful document parse.
pub const RESULT_SUCCESS: &str = "success";

/// Outcome text for a successful document result.
pub const OUTCOME_COMPLETE: &str = "Complete";

/// Outcome text for a document result that reported errors.
pub const OUTCOME_WITH_ERRORS: &str = "Complete -- with errors";

/// A classified response plus any diagnostics it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub shape: ResponseShape,
    pub diagnostics: Diagnostics,
}

/// The shapes a reply can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Reconciliation candidates in service order
    CandidateList(Vec<Candidate>),

    /// A downloaded constellation export
    FileResult(DownloadedFile),

    /// Result of a document parse or a local validation
    DocumentResult(DocumentResult),

    /// Undecodable or unrecognized reply
    ErrorResult(ServiceFailure),
}

/// Result of a document parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResult {
    /// Structured identity record, absent for validation results
    pub constellation: Option<Value>,

    /// Service-reported result marker
    pub result: String,
}

impl DocumentResult {
    pub fn is_success(&self) -> bool {
        self.result == RESULT_SUCCESS
    }

    /// `"Complete"` on success, `"Complete -- with errors"` otherwise.
    pub fn outcome_text(&self) -> &'static str {
        if self.is_success() {
            OUTCOME_COMPLETE
        } else {
            OUTCOME_WITH_ERRORS
        }
    }
}

/// An exported file returned by `download_constellation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// File name as reported by the service
    pub filename: String,

    /// Decoded file content
    pub content: Vec<u8>,
}

impl DownloadedFile {
    /// The reported name, if it is a single plain path component.
    ///
    /// Names that would escape the destination directory (`..`, absolute
    /// paths, nested paths) yield `None`.
    pub fn safe_name(&self) -> Option<&str> {
        let mut components = Path::new(&self.filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name.to_str(),
            _ => None,
        }
    }
}

/// Why a reply could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Body is not a JSON object
    Decode,

    /// Body decoded but matched no known shape
    Unrecognized,
}

/// An unusable reply with the raw body kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceFailure {
    pub cause: FailureCause,
    pub message: String,
    pub raw_body: String,
}

impl Interpretation {
    /// Present a local validation verdict the way a document result is
    /// presented: the verdict as the result marker, failed assertions as
    /// diagnostics.
    pub fn from_validation(report: &ValidationReport) -> Self {
        let result = if report.valid { RESULT_SUCCESS } else { "invalid" };
        Self {
            shape: ResponseShape::DocumentResult(DocumentResult {
                constellation: None,
                result: result.to_string(),
            }),
            diagnostics: Diagnostics::from_lines(report.messages()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.shape, ResponseShape::ErrorResult(_))
    }
}

/// Classify a raw response body.
pub fn interpret(raw: &str) -> Interpretation {
    let object = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(_) | Err(_) => {
            warn!(body = %raw, "response body could not be decoded");
            return Interpretation {
                shape: ResponseShape::ErrorResult(ServiceFailure {
                    cause: FailureCause::Decode,
                    message: DECODE_FAILURE_MESSAGE.to_string(),
                    raw_body: raw.to_string(),
                }),
                diagnostics: Diagnostics::default(),
            };
        }
    };

    let diagnostics = object
        .get("unparsed")
        .map(Diagnostics::from_value)
        .unwrap_or_default();

    let shape = classify(&object, raw);
    debug!(
        shape = shape_name(&shape),
        diagnostics = diagnostics.len(),
        "response classified"
    );

    Interpretation { shape, diagnostics }
}

fn classify(object: &Map<String, Value>, raw: &str) -> ResponseShape {
    if let Some(Value::Array(items)) = object.get("reconciliation") {
        return ResponseShape::CandidateList(candidates(items));
    }

    if let Some(Value::Object(file)) = object.get("file") {
        if let (Some(filename), Some(content)) = (
            file.get("filename").and_then(Value::as_str),
            file.get("content").and_then(Value::as_str),
        ) {
            return match STANDARD.decode(content.trim()) {
                Ok(content) => ResponseShape::FileResult(DownloadedFile {
                    filename: filename.to_string(),
                    content,
                }),
                Err(err) => {
                    warn!(filename, error = %err, "downloaded file content is not base64");
                    ResponseShape::ErrorResult(ServiceFailure {
                        cause: FailureCause::Decode,
                        message: FILE_CONTENT_MESSAGE.to_string(),
                        raw_body: raw.to_string(),
                    })
                }
            };
        }
    }

    if let (Some(constellation), Some(result)) = (object.get("constellation"), object.get("result")) {
        if let Some(result) = result.as_str() {
            return ResponseShape::DocumentResult(DocumentResult {
                constellation: Some(constellation.clone()),
                result: result.to_string(),
            });
        }
    }

    let message = service_error_message(object)
        .map(|detail| format!("{}: {}", UNRECOGNIZED_RESPONSE_MESSAGE, detail))
        .unwrap_or_else(|| UNRECOGNIZED_RESPONSE_MESSAGE.to_string());

    ResponseShape::ErrorResult(ServiceFailure {
        cause: FailureCause::Unrecognized,
        message,
        raw_body: raw.to_string(),
    })
}

fn candidates(items: &[Value]) -> Vec<Candidate> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let candidate = Candidate::from_value(item);
            if candidate.is_none() {
                warn!(index, "candidate without identity name, ark or strength skipped");
            }
            candidate
        })
        .collect()
}

/// The service reports failures as `error` (a string or `{ "message": .. }`).
fn service_error_message(object: &Map<String, Value>) -> Option<String> {
    match object.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn shape_name(shape: &ResponseShape) -> &'static str {
    match shape {
        ResponseShape::CandidateList(_) => "candidate_list",
        ResponseShape::FileResult(_) => "file_result",
        ResponseShape::DocumentResult(_) => "document_result",
        ResponseShape::ErrorResult(_) => "error_result",
    }
}
