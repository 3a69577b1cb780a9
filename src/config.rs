// Runtime configuration for the gateway.
//
// Configuration is deliberately small: bind host/port from the environment,
// package metadata from compile time. Upstream endpoints and the OAuth
// client identity are wire contract, not deployment knobs, and live as
// constants next to the code that uses them.

use std::net::SocketAddr;

/// Package metadata surfaced on `GET /` and the startup banner.
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load configuration from the environment (`HOST`, `PORT`), falling
    /// back to defaults on anything absent or unparseable.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|raw| match raw.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!("ignoring unparseable PORT value: {raw}");
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);

        let bind_addr = format!("{host}:{port}").parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparseable HOST value: {host}");
            SocketAddr::from(([0, 0, 0, 0], port))
        });

        Self { bind_addr }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}
