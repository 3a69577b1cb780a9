//! Upstream client for the GitHub Copilot backend.
//!
//! Wraps the three calls the gateway depends on: OAuth-to-API token
//! exchange (which also discovers the API endpoint), model listing, and
//! chat completions in buffered and streaming form. All non-success
//! responses go through the shared classifier so the forwarder can match
//! on `TokenExpired` / `RateLimited`.

mod error;
pub mod models;
mod types;

pub use error::{classify_response, UpstreamError};
pub use types::{
    ApiEndpoints, ApiToken, ChatChoice, ChatMessage, ChatRequest, ChatResponse, FunctionCall,
    FunctionDefinition, ModelDescriptor, ModelList, ResponseMessage, ToolCall, ToolDefinition,
    Usage,
};

use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;

/// Identity provider base; token exchange happens here.
pub const IDENTITY_BASE_URL: &str = "https://api.github.com";

/// Default chat API base, used until discovery replaces it.
pub const DEFAULT_API_BASE_URL: &str = "https://api.individual.githubcopilot.com";

// The upstream rejects chat calls that do not advertise an editor.
const EDITOR_VERSION: &str = "vscode/1.95.0";
const EDITOR_PLUGIN_VERSION: &str = "copilot/1.0.0";
const USER_AGENT: &str = "GitHub-Copilot-LLM-Provider/1.0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// Streaming completions can run long; the socket timeout covers the whole
// response, not just the first byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Stream of SSE `data:` payloads from a streaming completion. The `[DONE]`
/// terminator is consumed, not forwarded; the stream simply ends.
pub type PayloadStream = ReceiverStream<Result<String, UpstreamError>>;

pub struct CopilotClient {
    http: reqwest::Client,
    identity_base: String,
    api_base: RwLock<String>,
}

impl CopilotClient {
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_bases(IDENTITY_BASE_URL, DEFAULT_API_BASE_URL)
    }

    /// Construct against explicit bases; tests point both at a local server.
    pub fn with_bases(
        identity_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            identity_base: identity_base.into(),
            api_base: RwLock::new(api_base.into()),
        })
    }

    /// The shared HTTP client, reused by the device-authorization flow.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Currently-effective chat API base (default or discovered).
    pub async fn api_base(&self) -> String {
        self.api_base.read().await.clone()
    }

    /// Exchange the OAuth token for a short-lived API token. On success the
    /// response's `endpoints.api` replaces the cached API base.
    pub async fn get_api_token(&self, oauth_token: &str) -> Result<ApiToken, UpstreamError> {
        let url = format!("{}/copilot_internal/v2/token", self.identity_base);
        let response = self
            .http
            .get(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {oauth_token}"),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api {
                status,
                message: format!("token exchange failed: {body}"),
            });
        }

        let token: ApiToken = response
            .json()
            .await
            .map_err(|err| UpstreamError::Decode(format!("token response: {err}")))?;

        if let Some(api) = token
            .endpoints
            .as_ref()
            .and_then(|endpoints| endpoints.api.as_deref())
            .filter(|api| !api.is_empty())
        {
            let mut cached = self.api_base.write().await;
            if *cached != api {
                tracing::info!("discovered API endpoint: {api}");
                *cached = api.to_string();
            }
        }

        Ok(token)
    }

    /// List the models the backend offers for this account.
    pub async fn list_models(&self, api_token: &str) -> Result<Vec<ModelDescriptor>, UpstreamError> {
        let url = format!("{}/models", self.api_base().await);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_token)
            .header("Editor-Version", EDITOR_VERSION)
            .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.classified(response).await);
        }

        let listing: ModelList = response
            .json()
            .await
            .map_err(|err| UpstreamError::Decode(format!("model listing: {err}")))?;
        Ok(listing.data)
    }

    /// Best available Claude model per the preference ladder.
    pub async fn preferred_claude_model(&self, api_token: &str) -> Result<String, UpstreamError> {
        let listing = self.list_models(api_token).await?;
        Ok(models::preferred_claude_model(&listing))
    }

    /// Replacement model after a rate limit; `current` when none exists.
    pub async fn fallback_model_for_rate_limit(
        &self,
        api_token: &str,
        current: &str,
    ) -> Result<String, UpstreamError> {
        let listing = self.list_models(api_token).await?;
        Ok(models::fallback_model_for_rate_limit(&listing, current))
    }

    /// Buffered chat completion.
    pub async fn chat_completion(
        &self,
        api_token: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, UpstreamError> {
        let response = self.send_chat_request(api_token, request, false).await?;

        if !response.status().is_success() {
            return Err(self.classified(response).await);
        }

        response
            .json()
            .await
            .map_err(|err| UpstreamError::Decode(format!("chat completion: {err}")))
    }

    /// Streaming chat completion. Establishment failures (non-2xx) surface
    /// as classified errors before any payload is produced; once the stream
    /// is running, failures arrive as `Err` items.
    pub async fn chat_completion_stream(
        &self,
        api_token: &str,
        request: &ChatRequest,
    ) -> Result<PayloadStream, UpstreamError> {
        let response = self.send_chat_request(api_token, request, true).await?;

        if !response.status().is_success() {
            return Err(self.classified(response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<String, UpstreamError>>(64);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        tracing::error!("error reading upstream stream: {err}");
                        let _ = tx.send(Err(UpstreamError::Stream(err.to_string()))).await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));
                // SSE events can split across chunks; only complete lines are
                // parsed, the remainder stays buffered.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();
                    if payload.is_empty() {
                        continue;
                    }
                    if payload == "[DONE]" {
                        return;
                    }
                    if tx.send(Ok(payload.to_string())).await.is_err() {
                        // Caller hung up; drop the upstream connection too.
                        tracing::debug!("stream consumer dropped, abandoning upstream read");
                        return;
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn send_chat_request(
        &self,
        api_token: &str,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}/chat/completions", self.api_base().await);
        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(api_token)
            .header("Editor-Version", EDITOR_VERSION)
            .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION)
            .json(request);
        if stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        tracing::debug!(
            "chat completion: model={} messages={} stream={}",
            request.model,
            request.messages.len(),
            stream
        );
        Ok(builder.send().await?)
    }

    async fn classified(&self, response: reqwest::Response) -> UpstreamError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        classify_response(status, retry_after, &body)
    }
}
