use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Server settings, read from `CCHAT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// History file; `None` keeps the ledger in memory only.
    pub history_path: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("CCHAT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("CCHAT_PORT")
            .unwrap_or_else(|| "8765".into())
            .parse()
            .context("CCHAT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let tls = match (var("CCHAT_TLS_CERT"), var("CCHAT_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => bail!("CCHAT_TLS_CERT and CCHAT_TLS_KEY must be set together"),
        };

        Ok(Self {
            addr,
            history_path: var("CCHAT_HISTORY_PATH").map(PathBuf::from),
            tls,
        })
    }
}
