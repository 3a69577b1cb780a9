//! Permissive parser for Anthropic-style `/v1/messages` request bodies.
//!
//! Real clients send `content` as a plain string, as an array of text
//! blocks, or as an array mixing text with tool_use/tool_result blocks, and
//! `system` as either a string or a block array. The parser sniffs JSON node
//! kinds instead of insisting on one shape, and only rejects what it cannot
//! give meaning to.

pub mod models;

use serde_json::Value;
use thiserror::Error;

pub use models::{ContentBlock, NormalizedMessage, NormalizedRequest};

/// Validation failures, each with its own user-visible message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON body: {0}")]
    Json(String),
    #[error("missing required field: model")]
    MissingModel,
    #[error("missing required field: max_tokens")]
    MissingMaxTokens,
    #[error("missing required field: messages")]
    MissingMessages,
    #[error("max_tokens must be a positive integer")]
    NonPositiveMaxTokens,
    #[error("message {index} has an empty role")]
    BlankRole { index: usize },
    #[error("message {index} has empty content")]
    BlankContent { index: usize },
}

/// Parse a raw request body into the normalized record.
pub fn parse_anthropic_request(body: &[u8]) -> Result<NormalizedRequest, ParseError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| ParseError::Json(err.to_string()))?;

    let model = value
        .get("model")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .ok_or(ParseError::MissingModel)?
        .to_string();

    let max_tokens = value
        .get("max_tokens")
        .and_then(Value::as_i64)
        .ok_or(ParseError::MissingMaxTokens)?;
    if max_tokens <= 0 {
        return Err(ParseError::NonPositiveMaxTokens);
    }

    let raw_messages = value
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingMessages)?;

    let mut messages = Vec::with_capacity(raw_messages.len());
    for (index, raw) in raw_messages.iter().enumerate() {
        let message = parse_message(raw);
        if message.role.trim().is_empty() {
            return Err(ParseError::BlankRole { index });
        }
        if message.text.trim().is_empty() {
            return Err(ParseError::BlankContent { index });
        }
        messages.push(message);
    }

    Ok(NormalizedRequest {
        model,
        max_tokens,
        messages,
        system: parse_system(value.get("system")),
        stream: value
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        temperature: value.get("temperature").and_then(Value::as_f64),
        top_p: value.get("top_p").and_then(Value::as_f64),
        top_k: value.get("top_k").and_then(Value::as_i64),
        stop_sequences: value.get("stop_sequences").and_then(parse_string_array),
        tools: value
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| tools.to_vec()),
        tool_choice: value.get("tool_choice").cloned().filter(|v| !v.is_null()),
    })
}

/// Parse one message, tolerating string-or-array content.
fn parse_message(raw: &Value) -> NormalizedMessage {
    let role = raw
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match raw.get("content") {
        Some(Value::String(text)) => NormalizedMessage {
            role,
            text: text.clone(),
            blocks: None,
        },
        Some(Value::Array(items)) => {
            let blocks: Vec<ContentBlock> = items.iter().map(parse_block).collect();
            NormalizedMessage {
                role,
                text: models::flatten_blocks(&blocks),
                blocks: Some(blocks),
            }
        }
        _ => NormalizedMessage {
            role,
            text: String::new(),
            blocks: None,
        },
    }
}

fn parse_block(raw: &Value) -> ContentBlock {
    let block_type = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match block_type {
        "text" => ContentBlock::Text {
            text: raw
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        "tool_use" => ContentBlock::ToolUse {
            id: raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: raw
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            input: raw.get("input").cloned().unwrap_or(Value::Null),
        },
        "tool_result" => ContentBlock::ToolResult {
            tool_use_id: raw
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content: raw.get("content").cloned().filter(|v| !v.is_null()),
        },
        other => ContentBlock::Other {
            block_type: other.to_string(),
            raw: raw.clone(),
        },
    }
}

/// `system` is a string or a content-block array; both flatten to a string.
fn parse_system(raw: Option<&Value>) -> Option<String> {
    let flattened = match raw? {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let blocks: Vec<ContentBlock> = items.iter().map(parse_block).collect();
            models::flatten_blocks(&blocks)
        }
        _ => return None,
    };
    if flattened.is_empty() {
        None
    } else {
        Some(flattened)
    }
}

fn parse_string_array(raw: &Value) -> Option<Vec<String>> {
    let items = raw.as_array()?;
    let strings: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if strings.is_empty() {
        None
    } else {
        Some(strings)
    }
}
