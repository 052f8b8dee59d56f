//! Recovery of JSON objects embedded in free-form model replies.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{json, Value};
use thiserror::Error;

use crate::services::scoring::{RawGradingResult, ShapeError};

#[derive(Debug, Error)]
pub(crate) enum JsonRecoveryError {
    #[error("reply is empty")]
    Empty,
    #[error("reply contains no JSON object")]
    NoObject,
    #[error("reply JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Matches either a whole string literal or a trailing comma, so commas
/// inside quoted text are left alone.
fn trailing_comma() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?:[^"\\]|\\.)*"|,\s*([\]}])"#).ok()).as_ref()
}

fn strip_trailing_commas(text: String) -> String {
    let Some(re) = trailing_comma() else {
        return text;
    };
    re.replace_all(&text, |caps: &Captures<'_>| match caps.get(1) {
        Some(close) => close.as_str().to_string(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// Extracts the outermost JSON object from `reply`.
///
/// Clean JSON is accepted as-is. Otherwise markdown fences are stripped,
/// trailing commas removed and the text between the first `{` and the last
/// `}` is parsed.
pub(crate) fn recover_object(reply: &str) -> Result<Value, JsonRecoveryError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(JsonRecoveryError::Empty);
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_fences(trimmed);
    let cleaned = strip_trailing_commas(unfenced);

    let start = cleaned.find('{').ok_or(JsonRecoveryError::NoObject)?;
    let end = cleaned.rfind('}').ok_or(JsonRecoveryError::NoObject)?;
    if end < start {
        return Err(JsonRecoveryError::NoObject);
    }

    let value: Value = serde_json::from_str(&cleaned[start..=end])?;
    if !value.is_object() {
        return Err(JsonRecoveryError::NoObject);
    }
    Ok(value)
}

fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(index) = rest.find("```") {
        out.push_str(&rest[..index]);
        rest = &rest[index + 3..];
        if rest.get(..4).is_some_and(|label| label.eq_ignore_ascii_case("json")) {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[derive(Debug, Error)]
pub(crate) enum GradingReplyError {
    #[error(transparent)]
    Recovery(#[from] JsonRecoveryError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Parses a grading reply into a score record.
pub(crate) fn parse_grading_reply(reply: &str) -> Result<RawGradingResult, GradingReplyError> {
    let value = recover_object(reply)?;
    Ok(RawGradingResult::from_record(&value)?)
}

/// Substituted when a grading reply cannot be recovered: a zero percentage
/// flagged for manual review.
pub(crate) fn fallback_result(reason: &str) -> RawGradingResult {
    RawGradingResult::bare_percentage(0.0)
        .with_detail("fallback", Value::Bool(true))
        .with_detail("reason", json!(reason))
}

/// Parses a grading reply, substituting [`fallback_result`] when it is
/// unusable. The boolean is `true` when the fallback was used.
pub(crate) fn grading_result_or_fallback(reply: &str) -> (RawGradingResult, bool) {
    match parse_grading_reply(reply) {
        Ok(result) => (result, false),
        Err(err) => (fallback_result(&err.to_string()), true),
    }
}
