//! Bidirectional protocol translation.
//!
//! Two pure functions: the normalized Anthropic-style request becomes an
//! OpenAI-shaped chat request for the upstream, and the upstream's
//! OpenAI-shaped response becomes an Anthropic-style message for the caller.
//! No suspension points; everything here is plain data transformation.
//!
//! Streaming is not translated: upstream SSE chunks are relayed to the
//! caller verbatim (framed as `data: <chunk>` lines with a `data: [DONE]`
//! terminator) on both surfaces. Callers of the Anthropic surface must
//! accept raw OpenAI-shaped frames.

mod request;
mod response;

pub use request::anthropic_to_openai;
pub use response::{openai_to_anthropic, AnthropicContentBlock, AnthropicResponse, AnthropicUsage};
