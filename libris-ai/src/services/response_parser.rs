//! Parsing of generative model output
//!
//! Model output is prose that usually contains JSON: sometimes bare,
//! sometimes inside a markdown code fence, sometimes with a sentence before
//! or after. Parsing is always: strip fences, take the span from the first
//! opening brace/bracket to the last closing one, decode. Anything that does
//! not decode, or decodes to an empty result, is a failure.

use serde::de::DeserializeOwned;

use super::ProviderError;

/// Maximum length of a diagnostic note persisted on a failed slot
pub const DIAGNOSTIC_MAX_CHARS: usize = 150;

/// Expected top-level JSON shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn delimiters(&self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }
}

/// Remove a markdown code fence (```` ```json ... ``` ````) if present
///
/// Returns the fenced body when a fence exists, else the trimmed input.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[start + 3..];
    // Language tag directly after the fence (json, JSON, text, ...)
    let body = after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric());

    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Substring from the first opening delimiter to the last closing one
pub fn extract_json_span(text: &str, shape: JsonShape) -> Option<&str> {
    let (open, close) = shape.delimiters();
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Strip fences, extract the expected span and decode it
pub fn parse_structured<T: DeserializeOwned>(text: &str, shape: JsonShape) -> Result<T, ProviderError> {
    let body = strip_code_fences(text);
    let span = extract_json_span(body, shape).ok_or_else(|| {
        ProviderError::Parse(format!(
            "no JSON {} in response: {}",
            match shape {
                JsonShape::Object => "object",
                JsonShape::Array => "array",
            },
            truncate_diagnostic(body, 60)
        ))
    })?;

    serde_json::from_str(span).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Try each shape in order, returning the first successful decode
///
/// The error from the last attempt is reported when all fail.
pub fn parse_any_shape<T: DeserializeOwned>(text: &str, shapes: &[JsonShape]) -> Result<T, ProviderError> {
    let mut last_err = ProviderError::Parse("no shapes to try".to_string());
    for shape in shapes {
        match parse_structured(text, *shape) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{00AB}', '\u{00BB}', '`'];

/// Reduce a free-text quotation to the literal string
///
/// Drops fences, markdown headings and emphasis, and surrounding quote marks.
pub fn clean_quote(text: &str) -> String {
    let body = strip_code_fences(text);

    let joined = body
        .lines()
        .map(|line| line.trim().trim_start_matches('#').trim_start_matches('>').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let unemphasised = joined.replace("**", "").replace("__", "").replace('*', "");

    unemphasised
        .trim()
        .trim_matches(|c: char| QUOTE_CHARS.contains(&c))
        .trim()
        .to_string()
}

/// Collapse whitespace and cap length (in characters) for persisting
pub fn truncate_diagnostic(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}
