use std::sync::Arc;

use tracing::error;

use crate::config::secrets::resolve_smtp_credentials;
use crate::config::settings::{Config, SmtpConfig};
use crate::error::{AppError, Result};
use crate::services::{AuthService, CaseService, EmailDispatcher, SmtpMailer};
use crate::storage::{init_storage, Stores};
use crate::utils::{Clock, SystemClock};

/// Application state that is shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Registration, login and session checks
    pub auth: Arc<AuthService>,
    /// Case record operations
    pub cases: Arc<CaseService>,
}

impl AppState {
    /// Wire services from explicit parts (tests inject memory stores, mailers and clocks here)
    pub fn new(
        config: Config,
        stores: Stores,
        mailer: Arc<dyn EmailDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthService::new(
            stores.credentials,
            mailer,
            clock.clone(),
            config.auth.clone(),
        );
        let cases = CaseService::new(stores.cases, clock, config.storage.export_dir.clone());

        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            cases: Arc::new(cases),
        }
    }

    /// Build production state: JSON stores under DATA_DIR, SMTP delivery, wall clock
    pub async fn from_config(mut config: Config) -> Result<Self> {
        let stores = init_storage(&config.storage).await?;
        resolve_smtp_credentials(&mut config.smtp).await?;
        let mailer = build_mailer(&config.smtp)?;
        Ok(Self::new(config, stores, mailer, Arc::new(SystemClock)))
    }
}

/// SMTP mailer for the configured relay. Missing credentials fail startup.
pub fn build_mailer(config: &SmtpConfig) -> Result<Arc<dyn EmailDispatcher>> {
    let mailer = SmtpMailer::new(config).map_err(|e| {
        error!("❌ Cannot configure outgoing mail: {}", e);
        AppError::config(e.to_string())
    })?;
    Ok(Arc::new(mailer))
}
