//! Anthropic → OpenAI request translation.
//!
//! # Key differences
//!
//! | Anthropic                       | OpenAI                           |
//! |---------------------------------|----------------------------------|
//! | Top-level `system` field        | `messages[].role: "system"`      |
//! | Content-block arrays            | Flat `content` + `tool_calls`    |
//! | `tool_result` block             | `tool_call_id` on the message    |
//! | `{name, input_schema}` tools    | `{type, function}` tools         |
//! | `stop_sequences`                | `stop`                           |

use serde_json::Value;

use crate::parser::{models::flatten_tool_result_content, ContentBlock, NormalizedRequest};
use crate::upstream::{ChatMessage, ChatRequest, FunctionCall, FunctionDefinition, ToolCall, ToolDefinition};

/// Upstream rejects larger budgets on this surface.
const MAX_TOKENS_CAP: i64 = 4096;

/// Replacement when the caller sent a non-positive budget.
const MAX_TOKENS_FLOOR_DEFAULT: i64 = 100;

/// Upstream rejects messages with empty content; substitute a minimal one.
const BLANK_CONTENT_SUBSTITUTE: &str = "Hello";

/// Translate a normalized request into the upstream chat-request shape.
pub fn anthropic_to_openai(request: &NormalizedRequest) -> ChatRequest {
    let mut messages: Vec<ChatMessage> = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::text("system", system));
    }

    for message in &request.messages {
        messages.push(convert_message(message));
    }

    // Upstream refuses an empty conversation.
    if messages.is_empty() {
        messages.push(ChatMessage::text("user", BLANK_CONTENT_SUBSTITUTE));
    }

    ChatRequest {
        model: request.model.clone(),
        messages,
        max_tokens: Some(clamp_max_tokens(request.max_tokens)),
        temperature: request
            .temperature
            .filter(|t| (0.0..=2.0).contains(t)),
        top_p: request.top_p,
        stop: request.stop_sequences.clone(),
        stream: request.stream,
        tools: convert_tools(request.tools.as_deref()),
        tool_choice: request.tool_choice.clone(),
    }
}

/// Clamp the forwarded token budget into `[1, 4096]`.
fn clamp_max_tokens(requested: i64) -> i64 {
    if requested <= 0 {
        MAX_TOKENS_FLOOR_DEFAULT
    } else {
        requested.min(MAX_TOKENS_CAP)
    }
}

/// Convert one message. When the original content was a block array, the
/// structured view drives the conversion: text blocks join into `content`,
/// tool_use blocks become `tool_calls`, and a tool_result block sets
/// `tool_call_id` with its output appended to the text.
fn convert_message(message: &crate::parser::NormalizedMessage) -> ChatMessage {
    let Some(blocks) = &message.blocks else {
        let content = if message.text.trim().is_empty() {
            BLANK_CONTENT_SUBSTITUTE.to_string()
        } else {
            message.text.clone()
        };
        return ChatMessage::text(message.role.clone(), content);
    };

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut tool_call_id: Option<String> = None;

    for block in blocks {
        match block {
            ContentBlock::Text { text } => text_parts.push(text.clone()),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
            } => {
                if tool_call_id.is_none() {
                    tool_call_id = Some(tool_use_id.clone());
                }
                if let Some(content) = content {
                    let rendered = flatten_tool_result_content(content);
                    if !rendered.trim().is_empty() {
                        text_parts.push(rendered);
                    }
                }
            }
            ContentBlock::Other { .. } => {}
        }
    }

    let joined = text_parts.join("\n");
    let content = if joined.is_empty() {
        if tool_calls.is_empty() {
            Some(Value::String(BLANK_CONTENT_SUBSTITUTE.to_string()))
        } else {
            None
        }
    } else {
        Some(Value::String(joined))
    };

    ChatMessage {
        role: message.role.clone(),
        content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        tool_call_id,
    }
}

/// Convert tool descriptors. Anthropic-shaped `{name, input_schema}` is
/// rewritten to `{type, function}`; descriptors already in OpenAI shape pass
/// through; anything else is dropped with a warning.
fn convert_tools(tools: Option<&[Value]>) -> Option<Vec<ToolDefinition>> {
    let tools = tools?;
    let converted: Vec<ToolDefinition> = tools.iter().filter_map(convert_tool).collect();
    if converted.is_empty() {
        None
    } else {
        Some(converted)
    }
}

fn convert_tool(tool: &Value) -> Option<ToolDefinition> {
    // Anthropic shape: {name, description?, input_schema}.
    if let (Some(name), Some(schema)) = (
        tool.get("name").and_then(Value::as_str),
        tool.get("input_schema"),
    ) {
        return Some(ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: tool
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                parameters: raw_schema(schema),
            },
        });
    }

    // Already OpenAI shape: {type, function: {name, description?, parameters?}}.
    if let (Some(tool_type), Some(function)) = (
        tool.get("type").and_then(Value::as_str),
        tool.get("function"),
    ) {
        if let Some(name) = function.get("name").and_then(Value::as_str) {
            return Some(ToolDefinition {
                tool_type: tool_type.to_string(),
                function: FunctionDefinition {
                    name: name.to_string(),
                    description: function
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    parameters: function.get("parameters").and_then(raw_schema),
                },
            });
        }
    }

    tracing::warn!("dropping tool descriptor with unrecognized shape: {tool}");
    None
}

fn raw_schema(schema: &Value) -> Option<Box<serde_json::value::RawValue>> {
    serde_json::value::to_raw_value(schema).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_anthropic_request;

    fn translate(body: &str) -> ChatRequest {
        anthropic_to_openai(&parse_anthropic_request(body.as_bytes()).unwrap())
    }

    #[test]
    fn test_system_prompt_becomes_first_message() {
        let request = translate(
            r#"{
                "model": "claude-sonnet-4",
                "max_tokens": 1024,
                "system": "You are helpful",
                "messages": [{"role": "user", "content": "Hello"}]
            }"#,
        );

        assert_eq!(request.messages[0].role, "system");
        assert_eq!(
            request.messages[0].content,
            Some(Value::String("You are helpful".to_string()))
        );
        assert_eq!(request.messages[1].role, "user");
    }

    #[test]
    fn test_plain_string_messages_preserve_role_content_pairs() {
        // Round-trip law: plain-string messages survive translation as-is.
        let request = translate(
            r#"{
                "model": "claude-sonnet-4",
                "max_tokens": 1024,
                "messages": [
                    {"role": "user", "content": "one"},
                    {"role": "assistant", "content": "two"},
                    {"role": "user", "content": "three"}
                ]
            }"#,
        );

        let pairs: Vec<(&str, &str)> = request
            .messages
            .iter()
            .map(|m| (m.role.as_str(), m.content.as_ref().unwrap().as_str().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![("user", "one"), ("assistant", "two"), ("user", "three")]
        );
    }

    #[test]
    fn test_tool_use_blocks_become_tool_calls() {
        let request = translate(
            r#"{
                "model": "claude-sonnet-4",
                "max_tokens": 1024,
                "messages": [{
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": "Looking it up."},
                        {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {"city": "Tokyo"}}
                    ]
                }]
            }"#,
        );

        let message = &request.messages[0];
        assert_eq!(
            message.content,
            Some(Value::String("Looking it up.".to_string()))
        );
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Tokyo"}"#);
    }

    #[test]
    fn test_tool_result_sets_tool_call_id_and_appends_content() {
        let request = translate(
            r#"{
                "model": "claude-sonnet-4",
                "max_tokens": 1024,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "Here is the result."},
                        {"type": "tool_result", "tool_use_id": "t1", "content": "Sunny, 22C"}
                    ]
                }]
            }"#,
        );

        let message = &request.messages[0];
        assert_eq!(message.tool_call_id.as_deref(), Some("t1"));
        assert_eq!(
            message.content,
            Some(Value::String("Here is the result.\nSunny, 22C".to_string()))
        );
    }

    #[test]
    fn test_blank_string_content_substituted() {
        // The parser rejects blank content, so feed the translator directly.
        let normalized = NormalizedRequest {
            model: "claude-sonnet-4".to_string(),
            max_tokens: 10,
            messages: vec![crate::parser::NormalizedMessage {
                role: "user".to_string(),
                text: "  ".to_string(),
                blocks: None,
            }],
            system: None,
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
        };

        let request = anthropic_to_openai(&normalized);
        assert_eq!(
            request.messages[0].content,
            Some(Value::String("Hello".to_string()))
        );
    }

    #[test]
    fn test_empty_message_list_gets_placeholder() {
        let request = translate(
            r#"{"model": "claude-sonnet-4", "max_tokens": 10, "messages": []}"#,
        );
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(
            request.messages[0].content,
            Some(Value::String("Hello".to_string()))
        );
    }

    #[test]
    fn test_max_tokens_clamped() {
        let request = translate(
            r#"{"model": "m", "max_tokens": 128000, "messages": [{"role": "user", "content": "hi"}]}"#,
        );
        assert_eq!(request.max_tokens, Some(4096));

        let request = translate(
            r#"{"model": "m", "max_tokens": 1, "messages": [{"role": "user", "content": "hi"}]}"#,
        );
        assert_eq!(request.max_tokens, Some(1));

        assert_eq!(clamp_max_tokens(0), 100);
        assert_eq!(clamp_max_tokens(-5), 100);
    }

    #[test]
    fn test_temperature_dropped_when_out_of_range() {
        let request = translate(
            r#"{"model": "m", "max_tokens": 10, "temperature": 3.5, "messages": [{"role": "user", "content": "hi"}]}"#,
        );
        assert_eq!(request.temperature, None);

        let request = translate(
            r#"{"model": "m", "max_tokens": 10, "temperature": 0.7, "messages": [{"role": "user", "content": "hi"}]}"#,
        );
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_anthropic_tool_converted() {
        let request = translate(
            r#"{
                "model": "m", "max_tokens": 10,
                "tools": [{
                    "name": "get_weather",
                    "description": "Weather lookup",
                    "input_schema": {"type": "object", "properties": {"city": {"type": "string"}}}
                }],
                "messages": [{"role": "user", "content": "hi"}]
            }"#,
        );

        let tools = request.tools.as_ref().unwrap();
        assert_eq!(tools[0].tool_type, "function");
        assert_eq!(tools[0].function.name, "get_weather");
        assert_eq!(tools[0].function.description.as_deref(), Some("Weather lookup"));
        let schema: Value =
            serde_json::from_str(tools[0].function.parameters.as_ref().unwrap().get()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn test_openai_shaped_tool_passes_through() {
        let request = translate(
            r#"{
                "model": "m", "max_tokens": 10,
                "tools": [{
                    "type": "function",
                    "function": {"name": "lookup", "parameters": {"type": "object"}}
                }],
                "messages": [{"role": "user", "content": "hi"}]
            }"#,
        );

        let tools = request.tools.as_ref().unwrap();
        assert_eq!(tools[0].tool_type, "function");
        assert_eq!(tools[0].function.name, "lookup");
    }

    #[test]
    fn test_unrecognized_tool_dropped() {
        let request = translate(
            r#"{
                "model": "m", "max_tokens": 10,
                "tools": [{"kind": "mystery"}],
                "messages": [{"role": "user", "content": "hi"}]
            }"#,
        );
        assert!(request.tools.is_none());
    }

    #[test]
    fn test_stop_sequences_mapped_to_stop() {
        let request = translate(
            r#"{
                "model": "m", "max_tokens": 10,
                "stop_sequences": ["END", "STOP"],
                "messages": [{"role": "user", "content": "hi"}]
            }"#,
        );
        assert_eq!(
            request.stop,
            Some(vec!["END".to_string(), "STOP".to_string()])
        );
    }
}
