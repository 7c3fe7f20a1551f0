//! Post-processing: pull a JSON object out of free-form LLM output.
//!
//! Models are asked to "return JSON", but routinely wrap it in prose or
//! markdown fences. We locate the region from the first `{` to the last `}`
//! (greedy) and parse that. What happens when nothing parses is decided by
//! the call site through [`JsonFallback`].

use crate::error::WorkbookError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

/// What to do when the accumulated text contains no parsable JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFallback {
    /// Fail the request with [`WorkbookError::GenerationFailed`].
    Fail,
    /// Succeed with `{ <key>: <raw text> }`.
    RawText(&'static str),
}

/// Why no JSON object could be taken from the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonExtractError {
    /// No `{ ... }` region at all.
    NotFound,
    /// A region was found but is not valid JSON.
    Malformed(String),
}

impl std::fmt::Display for JsonExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonExtractError::NotFound => write!(f, "No valid JSON found in response"),
            JsonExtractError::Malformed(e) => write!(f, "Malformed JSON in response: {e}"),
        }
    }
}

/// Locate and parse the greedy `{...}` region of `text`.
pub fn extract_json_object(text: &str) -> Result<Value, JsonExtractError> {
    let region = RE_JSON_OBJECT
        .find(text)
        .ok_or(JsonExtractError::NotFound)?;
    serde_json::from_str(region.as_str()).map_err(|e| JsonExtractError::Malformed(e.to_string()))
}

/// Extract a JSON object from `text`, applying `fallback` when none parses.
pub fn parse_with_fallback(text: &str, fallback: JsonFallback) -> Result<Value, WorkbookError> {
    match (extract_json_object(text), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(e), JsonFallback::Fail) => Err(WorkbookError::GenerationFailed {
            detail: e.to_string(),
        }),
        (Err(e), JsonFallback::RawText(key)) => {
            tracing::debug!("No JSON in LLM output ({e}); returning raw text under '{key}'");
            Ok(json!({ key: text }))
        }
    }
}
