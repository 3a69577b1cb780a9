// copilot-relay - LLM protocol-translation gateway
//
// Accepts chat requests in two incompatible wire formats (OpenAI-style
// /v1/chat/completions and Anthropic-style /v1/messages), normalizes both
// to the OpenAI-shaped endpoint the GitHub Copilot backend exposes,
// authenticates on the caller's behalf, and streams or buffers responses
// back in the caller's dialect.
//
// Architecture:
// - auth: credential lifecycle (device flow, on-disk store, token cache)
// - upstream: Copilot client (token exchange, models, chat completions)
// - parser: permissive Anthropic request parsing
// - translation: pure request/response conversion between the dialects
// - forward: retry, rate-limit fallback, and session stickiness
// - server (axum): the thin HTTP surface

pub mod auth;
pub mod config;
pub mod forward;
pub mod parser;
pub mod server;
pub mod startup;
pub mod translation;
pub mod upstream;
