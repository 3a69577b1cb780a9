//! Forwarding engine.
//!
//! Wraps every upstream call in one policy: resolve the outbound model,
//! retry once on an expired token (after a forced refresh), and fall back
//! once to a GPT model on a rate limit. The rate-limit fallback is sticky
//! for the whole session: after the first 429, every later request uses the
//! fallback model no matter what the caller asked for, until an operator
//! clears it.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::{AuthError, CredentialManager};
use crate::parser::NormalizedRequest;
use crate::translation::{self, AnthropicResponse};
use crate::upstream::{
    models, ChatRequest, ChatResponse, CopilotClient, PayloadStream, UpstreamError,
};

/// Forced token refreshes per request.
const MAX_TOKEN_RETRIES: u32 = 1;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub struct Forwarder {
    upstream: Arc<CopilotClient>,
    credentials: Arc<CredentialManager>,
    session_fallback_model: RwLock<Option<String>>,
}

impl Forwarder {
    pub fn new(upstream: Arc<CopilotClient>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            upstream,
            credentials,
            session_fallback_model: RwLock::new(None),
        }
    }

    /// Buffered completion, OpenAI dialect: the inbound request is already
    /// upstream-shaped, only the model name is rewritten.
    pub async fn chat_completion_openai(
        &self,
        request: ChatRequest,
    ) -> Result<ChatResponse, ForwardError> {
        let requested_model = request.model.clone();
        let upstream = Arc::clone(&self.upstream);
        self.execute_with_retry_and_fallback(&requested_model, move |token, model| {
            let upstream = Arc::clone(&upstream);
            let mut request = request.clone();
            async move {
                request.model = model;
                request.stream = false;
                upstream.chat_completion(&token, &request).await
            }
        })
        .await
    }

    /// Streaming completion, OpenAI dialect.
    pub async fn chat_completion_openai_stream(
        &self,
        request: ChatRequest,
    ) -> Result<PayloadStream, ForwardError> {
        let requested_model = request.model.clone();
        let upstream = Arc::clone(&self.upstream);
        self.execute_with_retry_and_fallback(&requested_model, move |token, model| {
            let upstream = Arc::clone(&upstream);
            let mut request = request.clone();
            async move {
                request.model = model;
                request.stream = true;
                upstream.chat_completion_stream(&token, &request).await
            }
        })
        .await
    }

    /// Buffered completion, Anthropic dialect: translate the request, call
    /// upstream, translate the response back. The response carries the
    /// caller's original model name.
    pub async fn messages_anthropic(
        &self,
        request: NormalizedRequest,
    ) -> Result<AnthropicResponse, ForwardError> {
        let requested_model = request.model.clone();
        let chat_request = translation::anthropic_to_openai(&request);
        let response = self.chat_completion_openai(chat_request).await?;
        Ok(translation::openai_to_anthropic(&response, &requested_model))
    }

    /// Streaming completion, Anthropic dialect. Chunks are relayed in the
    /// upstream's own shape; no Anthropic event synthesis.
    pub async fn messages_anthropic_stream(
        &self,
        request: NormalizedRequest,
    ) -> Result<PayloadStream, ForwardError> {
        let chat_request = translation::anthropic_to_openai(&request);
        self.chat_completion_openai_stream(chat_request).await
    }

    /// The sticky fallback model, if a rate limit has set one.
    pub async fn session_fallback_model(&self) -> Option<String> {
        self.session_fallback_model.read().await.clone()
    }

    /// Operator/test hook; nothing clears the fallback automatically.
    pub async fn clear_session_fallback(&self) {
        *self.session_fallback_model.write().await = None;
    }

    async fn execute_with_retry_and_fallback<T, F, Fut>(
        &self,
        requested_model: &str,
        op: F,
    ) -> Result<T, ForwardError>
    where
        F: Fn(String, String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let session_fallback = self.session_fallback_model().await;
        let mut model = session_fallback
            .clone()
            .unwrap_or_else(|| models::initial_selection(requested_model));

        let mut last_token_error: Option<UpstreamError> = None;

        for attempt in 0..=MAX_TOKEN_RETRIES {
            let token = if attempt == 0 {
                self.credentials.valid_api_token().await?
            } else {
                self.credentials.force_refresh_api_token().await?
            };

            // Only the first attempt consults the listing, and only while no
            // sticky fallback is pinned.
            if attempt == 0 && session_fallback.is_none() {
                model = self.actual_best_model(requested_model, &token).await;
            }

            match op(token.clone(), model.clone()).await {
                Ok(result) => return Ok(result),
                Err(err @ UpstreamError::TokenExpired { .. }) => {
                    tracing::warn!("upstream reported an expired token (attempt {attempt})");
                    last_token_error = Some(err);
                    continue;
                }
                Err(err @ UpstreamError::RateLimited { .. }) => {
                    let fallback = self
                        .upstream
                        .fallback_model_for_rate_limit(&token, &model)
                        .await
                        .unwrap_or_else(|_| model.clone());
                    if fallback == model {
                        return Err(err.into());
                    }

                    tracing::info!(
                        "rate limited on {model}, switching session to {fallback}"
                    );
                    *self.session_fallback_model.write().await = Some(fallback.clone());
                    // One retry only; whatever it returns is final.
                    return op(token, fallback).await.map_err(Into::into);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(last_token_error
            .expect("loop exits early unless a token error was recorded")
            .into())
    }

    /// Refine the initial selection with the live listing when the caller
    /// asked for a Claude variant; listing failures fall back to the pure
    /// name mapping.
    async fn actual_best_model(&self, requested_model: &str, token: &str) -> String {
        if models::wants_claude(requested_model) {
            match self.upstream.preferred_claude_model(token).await {
                Ok(model) => return model,
                Err(err) => {
                    tracing::debug!("model listing unavailable ({err}), using name mapping");
                }
            }
        }
        models::initial_selection(requested_model)
    }
}
