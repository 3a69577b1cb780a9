//! Normalized request record and content-block model.
//!
//! The parser reduces every inbound Anthropic request to this shape. Each
//! message carries both a flattened text view and, when the caller sent a
//! content-block array, the structured blocks: the translator needs the
//! blocks to reconstruct tool-use round-trips instead of prose.

use serde_json::Value;

/// A typed element of an Anthropic message's `content` array.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Option<Value>,
    },
    /// Block type we do not model. The whole original block is kept so the
    /// structured view stays lossless for shapes added after this code.
    Other {
        block_type: String,
        raw: Value,
    },
}

impl ContentBlock {
    /// Flatten one block to prose for a downstream that only takes text.
    ///
    /// The tool sentences are wire contract: the downstream model reads them
    /// verbatim, and this phrasing keeps it from inventing bracketed marker
    /// syntax.
    pub fn flatten(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::ToolUse { name, input, .. } => {
                format!("I used the {name} tool with parameters: {input}")
            }
            ContentBlock::ToolResult { content, .. } => {
                let rendered = content.as_ref().map(flatten_tool_result_content);
                match rendered {
                    Some(text) if !text.trim().is_empty() => {
                        format!("The tool execution returned: {text}")
                    }
                    _ => "The tool execution completed.".to_string(),
                }
            }
            ContentBlock::Other { block_type, .. } => format!("[{block_type}]"),
        }
    }
}

/// Flatten a list of blocks, one line per block.
pub fn flatten_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(ContentBlock::flatten)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a tool_result `content` field to text. Callers send strings,
/// text-block arrays, or arbitrary JSON; anything unrecognized is rendered
/// as its JSON form.
pub fn flatten_tool_result_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                content.to_string()
            } else {
                texts.join("\n")
            }
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One normalized message: role, flattened text, and (when the caller sent
/// an array) the preserved structured view.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub role: String,
    pub text: String,
    pub blocks: Option<Vec<ContentBlock>>,
}

/// Dialect-independent request record produced by the parser.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub model: String,
    pub max_tokens: i64,
    pub messages: Vec<NormalizedMessage>,
    pub system: Option<String>,
    pub stream: bool,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub stop_sequences: Option<Vec<String>>,
    /// Raw tool descriptors; shape conversion happens in the translator,
    /// which also decides which shapes it accepts.
    pub tools: Option<Vec<Value>>,
    pub tool_choice: Option<Value>,
}
