//! HTTP surface: two dialect endpoints plus health, root, model listing,
//! and local token counting. Everything substantive happens in the
//! forwarder; this layer validates, delegates, and frames.

mod error;
mod handlers;
mod sse;

pub use error::{ApiError, Dialect};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::CredentialManager;
use crate::config::Config;
use crate::forward::Forwarder;
use crate::upstream::CopilotClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<CopilotClient>,
    pub credentials: Arc<CredentialManager>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(upstream: Arc<CopilotClient>, credentials: Arc<CredentialManager>) -> Self {
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&upstream),
            Arc::clone(&credentials),
        ));
        Self {
            upstream,
            credentials,
            forwarder,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::root))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/messages", post(handlers::messages))
        .route("/v1/messages/count_tokens", post(handlers::count_tokens))
        .route("/v1/models", get(handlers::list_models))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
