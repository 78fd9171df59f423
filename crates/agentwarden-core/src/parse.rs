//! Parsing of agent CLI output
//!
//! Kept free of process handling so every fallback can be tested on plain
//! strings.

use crate::error::ParseError;
use crate::types::ServerSuggestion;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("fenced block regex is valid")
});

/// Parse the CLI's JSON envelope.
///
/// Accepts a single JSON object, or falls back to the last line that parses as
/// one (some builds print log lines before the envelope).
pub fn parse_envelope(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => return Ok(value),
        Ok(other) => {
            return Err(ParseError::UnexpectedShape(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
        Err(e) => {
            let last_object = trimmed
                .lines()
                .rev()
                .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
                .find(Value::is_object);
            if let Some(value) = last_object {
                return Ok(value);
            }
            Err(ParseError::InvalidJson(e.to_string()))
        }
    }
}

/// Session identifier from the init envelope
pub fn parse_session_id(raw: &str) -> Result<String, ParseError> {
    let envelope = parse_envelope(raw)?;
    ["session_id", "sessionId"]
        .iter()
        .find_map(|key| envelope.get(*key).and_then(Value::as_str))
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or(ParseError::MissingField("session_id"))
}

/// Response to one chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub tokens_used: Option<u64>,
    pub tool_calls: Vec<String>,
    /// False when `text` is the raw output because the envelope was unreadable
    pub structured: bool,
}

/// Extract the reply text, preferring the envelope's `result`, `content` or
/// `message` field and falling back to the raw output.
pub fn parse_turn_reply(raw: &str) -> TurnReply {
    let Ok(envelope) = parse_envelope(raw) else {
        return TurnReply {
            text: raw.to_string(),
            tokens_used: None,
            tool_calls: Vec::new(),
            structured: false,
        };
    };

    let text = ["result", "content", "message"]
        .iter()
        .find_map(|key| envelope.get(*key).and_then(Value::as_str));

    TurnReply {
        structured: text.is_some(),
        text: text.map(str::to_string).unwrap_or_else(|| raw.to_string()),
        tokens_used: tokens_used(&envelope),
        tool_calls: tool_calls(&envelope),
    }
}

fn tokens_used(envelope: &Value) -> Option<u64> {
    if let Some(total) = ["tokens_used", "tokensUsed"]
        .iter()
        .find_map(|key| envelope.get(*key).and_then(Value::as_u64))
    {
        return Some(total);
    }

    let usage = envelope.get("usage")?;
    let input = usage.get("input_tokens").and_then(Value::as_u64);
    let output = usage.get("output_tokens").and_then(Value::as_u64);
    match (input, output) {
        (None, None) => None,
        (i, o) => Some(i.unwrap_or(0) + o.unwrap_or(0)),
    }
}

fn tool_calls(envelope: &Value) -> Vec<String> {
    envelope
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| match call {
                    Value::String(name) => Some(name.clone()),
                    other => other.get("name").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Contents of the first fenced code block, if any
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestionList {
    Bare(Vec<ServerSuggestion>),
    Wrapped { servers: Vec<ServerSuggestion> },
}

/// Parse `text` as a JSON list of `{name, rationale}`
pub fn parse_suggestion_json(text: &str) -> Result<Vec<ServerSuggestion>, ParseError> {
    let list: SuggestionList = serde_json::from_str(text.trim())
        .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    Ok(match list {
        SuggestionList::Bare(servers) | SuggestionList::Wrapped { servers } => servers,
    })
}

/// Fenced block first, then the whole text
pub fn parse_server_suggestions(text: &str) -> Result<Vec<ServerSuggestion>, ParseError> {
    if let Some(block) = extract_fenced_block(text) {
        if let Ok(servers) = parse_suggestion_json(block) {
            return Ok(servers);
        }
    }
    parse_suggestion_json(text)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
