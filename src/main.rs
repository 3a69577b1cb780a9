use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use copilot_relay::auth::CredentialManager;
use copilot_relay::config::Config;
use copilot_relay::server::{self, AppState};
use copilot_relay::startup;
use copilot_relay::upstream::CopilotClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copilot_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    startup::log_startup(&config);

    let upstream =
        Arc::new(CopilotClient::new().context("Failed to create upstream HTTP client")?);
    let credentials = Arc::new(CredentialManager::new(Arc::clone(&upstream)));

    // Resolve credentials before binding the listener: if no token is on
    // file this runs the interactive device-authorization flow, and a
    // failure here is fatal rather than a broken first request.
    credentials
        .valid_api_token()
        .await
        .context("Failed to obtain an initial Copilot API token")?;
    tracing::info!("credentials verified");

    startup::print_startup(&config);

    let state = AppState::new(upstream, credentials);
    server::serve(&config, state).await
}
