//! Configuration management for the courier bridge
//!
//! Settings come from the environment (optionally seeded from a `.env` file
//! by `main`), with port and database path overridable on the command line.

use std::path::PathBuf;

use crate::{Error, Result};

/// Courier bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the external agent consumer (`POST {base}/api/message`)
    pub agent_base_url: String,

    /// Externally reachable base URL of this bridge, used to build
    /// download references (`{base}/api/download/{id}`)
    pub server_base_url: String,

    /// Port the HTTP API listens on
    pub port: u16,

    /// Path to the message database
    pub db_path: PathBuf,

    /// Protocol session settings
    pub session: SessionConfig,
}

/// Settings for the network session transport
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the messaging network's HTTP API
    pub api_url: String,

    /// Bearer token for the network API
    pub access_token: String,

    /// JID of the account this session is logged in as, when known.
    /// Used to compute the self-origin flag on messages.
    pub own_jid: Option<String>,
}

impl Config {
    /// Assemble configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns error if a required variable (`AGENT_BASE_URL`,
    /// `NETWORK_API_URL`, `NETWORK_TOKEN`) is missing — the bridge cannot
    /// operate without its consumer or its network session.
    pub fn from_env(port: u16, db_path: PathBuf) -> Result<Self> {
        let agent_base_url = require_env("AGENT_BASE_URL")?;
        let server_base_url = std::env::var("SERVER_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let session = SessionConfig {
            api_url: require_env("NETWORK_API_URL")?,
            access_token: require_env("NETWORK_TOKEN")?,
            own_jid: std::env::var("SESSION_JID").ok().filter(|s| !s.is_empty()),
        };

        Ok(Self {
            agent_base_url: trim_base(agent_base_url),
            server_base_url: trim_base(server_base_url),
            port,
            db_path,
            session,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{name} environment variable not set")))
}

/// Strip a trailing slash so URL joins stay predictable
fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
