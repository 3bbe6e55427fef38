use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::view::DEFAULT_IDLE_THRESHOLD;

/// Startup parameters. A reconnect rebuilds the session from these unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub idle_threshold: Duration,
    /// Extra trust anchor for `wss://` servers behind a private CA.
    pub ca_cert: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let server = var("CCHAT_SERVER").unwrap_or_else(|| "ws://localhost:8765".into());
        if !(server.starts_with("ws://") || server.starts_with("wss://")) {
            bail!("CCHAT_SERVER must be a ws:// or wss:// URL, got {}", server);
        }

        let idle_threshold = match var("CCHAT_IDLE_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .context("CCHAT_IDLE_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_IDLE_THRESHOLD,
        };

        Ok(Self {
            server,
            user: var("CCHAT_USER").map(|u| u.trim().to_string()),
            password: lookup("CCHAT_PASSWORD").filter(|p| !p.is_empty()),
            idle_threshold,
            ca_cert: var("CCHAT_CA_CERT").map(PathBuf::from),
        })
    }
}
