//! OAuth 2.0 device-authorization grant (RFC 8628) against GitHub.
//!
//! Used only when no OAuth token is on file: the provider hands out a user
//! code, the user enters it in a browser, and we poll the token endpoint
//! until the grant is approved, denied, or times out.

use serde::Deserialize;
use std::time::Duration;

use super::browser;
use super::error::{AuthError, Result};
use super::store::OAUTH_CLIENT_ID;

/// Polling attempts before the flow is abandoned.
const MAX_POLL_ATTEMPTS: u32 = 60;

/// Scope requested for the OAuth token.
const OAUTH_SCOPE: &str = "read:user";

/// Endpoints and client identity for the device flow. Overridable so tests
/// can point the flow at a local server.
#[derive(Debug, Clone)]
pub struct DeviceFlowConfig {
    pub device_code_url: String,
    pub access_token_url: String,
    pub user_url: String,
    pub client_id: String,
    pub scope: String,
}

impl Default for DeviceFlowConfig {
    fn default() -> Self {
        Self {
            device_code_url: "https://github.com/login/device/code".to_string(),
            access_token_url: "https://github.com/login/oauth/access_token".to_string(),
            user_url: "https://api.github.com/user".to_string(),
            client_id: OAUTH_CLIENT_ID.to_string(),
            scope: OAUTH_SCOPE.to_string(),
        }
    }
}

/// Response from the device-code endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[allow(dead_code)]
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PollError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The token endpoint answers 200 for both outcomes; the body shape decides.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PollResponse {
    Success(AccessTokenResponse),
    Pending(PollError),
}

/// Outcome of a completed device-authorization flow.
#[derive(Debug, Clone)]
pub struct AuthorizedUser {
    pub access_token: String,
    pub login: String,
}

/// Run the full device-authorization flow: request a device code, present
/// the verification URI to the user, poll until approval, and resolve the
/// authorizing user's login.
pub async fn perform_device_auth_flow(
    client: &reqwest::Client,
    config: &DeviceFlowConfig,
) -> Result<AuthorizedUser> {
    let device = request_device_code(client, config).await?;

    present_verification(&device);

    let access_token =
        poll_for_access_token(client, config, &device.device_code, device.interval).await?;
    let login = fetch_user_login(client, config, &access_token).await?;

    tracing::info!("device authorization completed for {login}");
    Ok(AuthorizedUser {
        access_token,
        login,
    })
}

async fn request_device_code(
    client: &reqwest::Client,
    config: &DeviceFlowConfig,
) -> Result<DeviceCodeResponse> {
    let response = client
        .post(&config.device_code_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("scope", config.scope.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::DeviceFlow(format!(
            "device-code endpoint returned {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|err| AuthError::DeviceFlow(format!("invalid device-code response: {err}")))
}

fn present_verification(device: &DeviceCodeResponse) {
    let prompt_url = format!(
        "{}?user_code={}",
        device.verification_uri, device.user_code
    );
    if browser::try_open_browser(&prompt_url) {
        tracing::info!("opened {} in a browser", device.verification_uri);
    } else {
        println!(
            "To authorize, open {} and enter the code {}",
            device.verification_uri, device.user_code
        );
    }
    println!("Waiting for authorization (code: {})...", device.user_code);
}

async fn poll_for_access_token(
    client: &reqwest::Client,
    config: &DeviceFlowConfig,
    device_code: &str,
    interval: u64,
) -> Result<String> {
    let mut poll_interval = Duration::from_secs(interval);

    for _ in 0..MAX_POLL_ATTEMPTS {
        tokio::time::sleep(poll_interval).await;

        let response = client
            .post(&config.access_token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", config.client_id.as_str()),
                ("device_code", device_code),
                (
                    "grant_type",
                    "urn:ietf:params:oauth:grant-type:device_code",
                ),
            ])
            .send()
            .await?;

        let body = response.text().await?;
        match serde_json::from_str::<PollResponse>(&body) {
            Ok(PollResponse::Success(token)) => return Ok(token.access_token),
            Ok(PollResponse::Pending(pending)) => match pending.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    // RFC 8628: the increase is permanent for this grant.
                    poll_interval += Duration::from_secs(5);
                    continue;
                }
                "expired_token" => return Err(AuthError::DeviceFlowTimeout),
                "access_denied" => return Err(AuthError::AccessDenied),
                other => {
                    return Err(AuthError::DeviceFlow(format!(
                        "{other}: {}",
                        pending.error_description.unwrap_or_default()
                    )))
                }
            },
            Err(err) => {
                return Err(AuthError::DeviceFlow(format!(
                    "unparseable token response: {err}"
                )))
            }
        }
    }

    Err(AuthError::DeviceFlowTimeout)
}

async fn fetch_user_login(
    client: &reqwest::Client,
    config: &DeviceFlowConfig,
    access_token: &str,
) -> Result<String> {
    #[derive(Deserialize)]
    struct UserResponse {
        login: String,
    }

    let response = client
        .get(&config.user_url)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("token {access_token}"),
        )
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(AuthError::DeviceFlow(format!(
            "identity endpoint returned {status}"
        )));
    }

    let user: UserResponse = response
        .json()
        .await
        .map_err(|err| AuthError::DeviceFlow(format!("invalid identity response: {err}")))?;
    Ok(user.login)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_code_response_deserialization() {
        let json = r#"{
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 900,
            "interval": 5
        }"#;

        let response: DeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.device_code, "dev-123");
        assert_eq!(response.user_code, "ABCD-EFGH");
        assert_eq!(response.interval, 5);
    }

    #[test]
    fn test_device_code_interval_defaults_to_five() {
        let json = r#"{
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 900
        }"#;

        let response: DeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.interval, 5);
    }

    #[test]
    fn test_poll_response_disambiguation() {
        let success: PollResponse =
            serde_json::from_str(r#"{"access_token": "gho_abc", "token_type": "bearer"}"#).unwrap();
        assert!(matches!(success, PollResponse::Success(t) if t.access_token == "gho_abc"));

        let pending: PollResponse =
            serde_json::from_str(r#"{"error": "authorization_pending"}"#).unwrap();
        assert!(matches!(pending, PollResponse::Pending(e) if e.error == "authorization_pending"));
    }
}
