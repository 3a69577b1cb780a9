//! OpenAI → Anthropic response translation.
//!
//! Builds the Anthropic message object from a buffered chat completion:
//! every choice is walked (providers can return more than one), text and
//! tool-call content become typed blocks, and the caller's originally
//! requested model name is restored so the substitution upstream stays
//! invisible.

use serde::Serialize;
use serde_json::Value;

use crate::upstream::ChatResponse;

#[derive(Debug, Serialize)]
pub struct AnthropicResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    pub usage: AnthropicUsage,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

#[derive(Debug, Serialize)]
pub struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Translate a buffered upstream response into the Anthropic message shape.
///
/// `requested_model` is the name the caller asked for; it goes into the
/// response verbatim even when the upstream served a substitute.
pub fn openai_to_anthropic(response: &ChatResponse, requested_model: &str) -> AnthropicResponse {
    let mut content: Vec<AnthropicContentBlock> = Vec::new();

    for choice in &response.choices {
        if let Some(text) = &choice.message.content {
            if !text.trim().is_empty() {
                content.push(AnthropicContentBlock::Text { text: text.clone() });
            }
        }

        for call in choice.message.tool_calls.iter().flatten() {
            content.push(AnthropicContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: parse_tool_arguments(&call.function.arguments),
            });
        }
    }

    let has_tool_use = content
        .iter()
        .any(|block| matches!(block, AnthropicContentBlock::ToolUse { .. }));

    // The caller always gets at least one block.
    if content.is_empty() {
        content.push(AnthropicContentBlock::Text {
            text: String::new(),
        });
    }

    let stop_reason = if has_tool_use {
        "tool_use".to_string()
    } else {
        response
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
            .map(convert_finish_reason)
            .unwrap_or("end_turn")
            .to_string()
    };

    let usage = response
        .usage
        .as_ref()
        .map(|usage| AnthropicUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
        .unwrap_or(AnthropicUsage {
            input_tokens: 0,
            output_tokens: 0,
        });

    AnthropicResponse {
        id: format!("msg_{}", response.id.replace("chatcmpl-", "")),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: requested_model.to_string(),
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage,
    }
}

/// Tool arguments are model-produced JSON text; on parse failure the raw
/// string is wrapped instead of failing the whole response.
fn parse_tool_arguments(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("tool arguments are not valid JSON ({err}), wrapping raw string");
            serde_json::json!({ "arguments": raw })
        }
    }
}

fn convert_finish_reason(finish_reason: &str) -> &'static str {
    match finish_reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        _ => "end_turn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(body: &str) -> ChatResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_text_response_translation() {
        let response = upstream(
            r#"{
                "id": "chatcmpl-123",
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }"#,
        );

        let translated = openai_to_anthropic(&response, "claude-sonnet-4");
        let json = serde_json::to_value(&translated).unwrap();

        assert_eq!(json["id"], "msg_123");
        assert_eq!(json["type"], "message");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["model"], "claude-sonnet-4");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Hello!");
        assert_eq!(json["stop_reason"], "end_turn");
        assert_eq!(json["usage"]["input_tokens"], 10);
        assert_eq!(json["usage"]["output_tokens"], 5);
    }

    #[test]
    fn test_tool_call_translation_and_stop_reason_priority() {
        let response = upstream(
            r#"{
                "id": "chatcmpl-9",
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "t1",
                            "type": "function",
                            "function": {"name": "get_weather", "arguments": "{\"city\":\"Tokyo\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }"#,
        );

        let translated = openai_to_anthropic(&response, "claude-3-sonnet-20240229");
        let json = serde_json::to_value(&translated).unwrap();

        assert_eq!(json["content"][0]["type"], "tool_use");
        assert_eq!(json["content"][0]["id"], "t1");
        assert_eq!(json["content"][0]["name"], "get_weather");
        assert_eq!(json["content"][0]["input"]["city"], "Tokyo");
        assert_eq!(json["stop_reason"], "tool_use");
        assert_eq!(json["model"], "claude-3-sonnet-20240229");
    }

    #[test]
    fn test_unparseable_tool_arguments_are_wrapped() {
        let response = upstream(
            r#"{
                "id": "chatcmpl-9",
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "t1",
                            "type": "function",
                            "function": {"name": "run", "arguments": "{broken"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }"#,
        );

        let translated = openai_to_anthropic(&response, "claude-sonnet-4");
        let json = serde_json::to_value(&translated).unwrap();
        assert_eq!(json["content"][0]["input"]["arguments"], "{broken");
    }

    #[test]
    fn test_empty_walk_yields_one_empty_text_block() {
        let response = upstream(
            r#"{
                "id": "chatcmpl-9",
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": ""},
                    "finish_reason": "stop"
                }]
            }"#,
        );

        let translated = openai_to_anthropic(&response, "claude-sonnet-4");
        assert_eq!(translated.content.len(), 1);
        assert!(matches!(
            &translated.content[0],
            AnthropicContentBlock::Text { text } if text.is_empty()
        ));
    }

    #[test]
    fn test_all_choices_are_walked() {
        let response = upstream(
            r#"{
                "id": "chatcmpl-9",
                "model": "gpt-4o",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"},
                    {"index": 1, "message": {"role": "assistant", "content": "second"}, "finish_reason": "stop"}
                ]
            }"#,
        );

        let translated = openai_to_anthropic(&response, "claude-sonnet-4");
        assert_eq!(translated.content.len(), 2);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(convert_finish_reason("stop"), "end_turn");
        assert_eq!(convert_finish_reason("length"), "max_tokens");
        assert_eq!(convert_finish_reason("content_filter"), "end_turn");
        assert_eq!(convert_finish_reason("anything"), "end_turn");
    }
}
