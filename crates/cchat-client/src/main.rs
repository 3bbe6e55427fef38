use anyhow::{Context, Result, bail};
use tracing::info;

use cchat_client::app::{self, Identity};
use cchat_client::config::ClientConfig;
use cchat_crypto::CipherBundle;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they do not interleave with the transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cchat=warn,cchat_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let mut console = app::console();

    let user = match config.user.clone() {
        Some(user) => user,
        None => {
            let answer = app::prompt(&mut console, "Enter a display name: ").await?;
            answer.map(|a| a.trim().to_string()).unwrap_or_default()
        }
    };
    if user.is_empty() {
        bail!("A display name is required (set CCHAT_USER or enter one)");
    }

    let password = match config.password.clone() {
        Some(password) => password,
        None => app::prompt(&mut console, "Enter shared password (not stored): ")
            .await?
            .unwrap_or_default(),
    };
    if password.is_empty() {
        bail!("A shared password is required");
    }

    // Key derivation is CPU-heavy, keep it off the runtime threads
    let cipher = tokio::task::spawn_blocking(move || CipherBundle::from_password(&password))
        .await
        .context("Key derivation task failed")??;
    info!("Derived session key for {}", user);

    app::run(config, Identity { user, cipher }, console).await
}
