//! Credential lifecycle: device authorization, on-disk storage, and the
//! in-memory two-tier token cache.
//!
//! The long-lived OAuth token comes from disk (or a one-time device flow)
//! and is cached for the process lifetime. The short-lived Copilot API token
//! is exchanged from it on demand and refreshed proactively five minutes
//! before expiry.

pub mod browser;
pub mod device;
mod error;
pub mod store;

pub use error::{AuthError, Result};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::upstream::{ApiToken, CopilotClient};
use device::DeviceFlowConfig;

/// Tokens this close to expiry are treated as already expired.
pub const TOKEN_FRESHNESS_BUFFER_SECS: i64 = 300;

/// Produces "a currently-valid API token" on demand, caching both tiers.
///
/// Both caches sit behind async locks so a reader never observes a
/// half-written token; the refresh guard collapses concurrent expirations
/// into a single upstream exchange.
pub struct CredentialManager {
    upstream: Arc<CopilotClient>,
    device: DeviceFlowConfig,
    api_token: RwLock<Option<ApiToken>>,
    oauth_token: RwLock<Option<String>>,
    refresh_guard: Mutex<()>,
}

impl CredentialManager {
    pub fn new(upstream: Arc<CopilotClient>) -> Self {
        Self::with_device_config(upstream, DeviceFlowConfig::default())
    }

    pub fn with_device_config(upstream: Arc<CopilotClient>, device: DeviceFlowConfig) -> Self {
        Self {
            upstream,
            device,
            api_token: RwLock::new(None),
            oauth_token: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Construct with a pre-resolved OAuth token, skipping disk and device
    /// flow. Used by tests and by deployments that inject the token.
    pub fn with_oauth_token(upstream: Arc<CopilotClient>, oauth_token: impl Into<String>) -> Self {
        let manager = Self::new(upstream);
        *manager.oauth_token.try_write().expect("fresh lock") = Some(oauth_token.into());
        manager
    }

    /// Return a currently-valid API token, exchanging a fresh one when the
    /// cached token is missing or inside the freshness buffer.
    pub async fn valid_api_token(&self) -> Result<String> {
        if let Some(token) = self.cached_usable_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_guard.lock().await;
        // Another caller may have refreshed while we waited on the guard.
        if let Some(token) = self.cached_usable_token().await {
            return Ok(token);
        }
        self.exchange_and_cache().await
    }

    /// Drop the cached API token and exchange a new one unconditionally.
    pub async fn force_refresh_api_token(&self) -> Result<String> {
        let _guard = self.refresh_guard.lock().await;
        *self.api_token.write().await = None;
        tracing::info!("forcing API token refresh");
        self.exchange_and_cache().await
    }

    async fn cached_usable_token(&self) -> Option<String> {
        let cached = self.api_token.read().await;
        cached
            .as_ref()
            .filter(|token| token.is_usable_at(Utc::now().timestamp()))
            .map(|token| token.token.clone())
    }

    async fn exchange_and_cache(&self) -> Result<String> {
        let oauth = self.resolve_oauth_token().await?;
        let token = self.upstream.get_api_token(&oauth).await?;
        tracing::debug!(
            "obtained API token, expires_at={} refresh_in={:?}",
            token.expires_at,
            token.refresh_in
        );

        let value = token.token.clone();
        *self.api_token.write().await = Some(token);
        Ok(value)
    }

    /// Resolve the long-lived OAuth token: memory cache, then the credential
    /// store, then a full device-authorization flow.
    async fn resolve_oauth_token(&self) -> Result<String> {
        if let Some(token) = self.oauth_token.read().await.clone() {
            return Ok(token);
        }

        if let Some(token) = store::read_oauth_token() {
            *self.oauth_token.write().await = Some(token.clone());
            return Ok(token);
        }

        tracing::info!("no stored credentials, starting device authorization");
        let authorized = device::perform_device_auth_flow(self.upstream.http(), &self.device).await?;
        store::save_oauth_token(&authorized.access_token, &authorized.login)?;
        *self.oauth_token.write().await = Some(authorized.access_token.clone());
        Ok(authorized.access_token)
    }
}
