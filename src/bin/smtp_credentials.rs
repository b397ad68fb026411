//! Administrator tool for the encrypted SMTP credential file.
//!
//! ```text
//! smtp-credentials setup   # encrypt SMTP_USERNAME / SMTP_PASSWORD
//! smtp-credentials check   # unlock and report the stored username
//! ```
//!
//! Reads `SMTP_CREDENTIALS_ADMIN`, `SMTP_MASTER_PASSWORD`,
//! `SMTP_CREDENTIALS_ADMINS` and (for `setup`) `SMTP_USERNAME` /
//! `SMTP_PASSWORD` from the environment or `.env`.

use dotenv::dotenv;
use tracing::{error, info};

use case_sheet_server::config::secrets::SmtpCredentialVault;
use case_sheet_server::config::settings::{LoggingConfig, SmtpConfig, StorageConfig};
use case_sheet_server::error::{AppError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let logging = LoggingConfig::load();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&logging.level))
        .with_target(false)
        .compact()
        .init();

    let command = std::env::args().nth(1).unwrap_or_default();
    if let Err(e) = run(&command).await {
        error!("❌ {}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: &str) -> Result<()> {
    let storage = StorageConfig::load();
    let smtp = SmtpConfig::load(&storage.data_dir)?;
    let vault = SmtpCredentialVault::from_config(&smtp.vault);

    let admin = smtp
        .vault
        .unlock_as
        .clone()
        .ok_or_else(|| AppError::config("SMTP_CREDENTIALS_ADMIN must be set"))?;
    let master = smtp
        .vault
        .master_password
        .clone()
        .ok_or_else(|| AppError::config("SMTP_MASTER_PASSWORD must be set"))?;

    match command {
        "setup" => {
            vault
                .store(&admin, &master, &smtp.username, &smtp.password, chrono::Utc::now())
                .await?;
            info!("✅ SMTP credentials written to {}", vault.path().display());
            info!("Remove SMTP_PASSWORD from the environment; the server unlocks the file at startup");
        }
        "check" => {
            let credentials = vault.unlock(&admin, &master).await?;
            info!(
                "✅ {} unlocks; SMTP user {} (stored by {} at {})",
                vault.path().display(),
                credentials.smtp_username,
                credentials.created_by,
                credentials.created_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        other => {
            return Err(AppError::InvalidRequest(format!(
                "unknown command {:?}; expected `setup` or `check`",
                other
            )));
        }
    }
    Ok(())
}
