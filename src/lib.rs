// Re-export core functionality for external use
pub use async_trait::async_trait;

// Core module definitions
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;

// Unified error handling
pub use error::{AppError, Result};
pub type AppResult<T> = Result<T>;

// Essential re-exports for convenience
pub use server::{
    app_state::AppState,
    startup::{configure_routes, start_server, start_server_with_state},
};

pub use config::settings::{
    AuthConfig, Config, ServerConfig, SmtpConfig, SmtpVaultConfig, StorageConfig,
};

// Storage abstractions
pub use storage::{
    init_storage, CaseStore, CredentialStore, JsonCaseStore, JsonCredentialStore, MemoryStorage,
    Result as StorageResult, StorageError, Stores,
};

// Model exports
pub use models::{AccountProfile, CaseRecord, CaseStatus, LoginPin, PendingRegistration, UserAccount};

// Services
pub use auth::{AuthError, SessionIdentity, SessionSigner};
pub use services::{
    AuthService, AuthSession, CaseService, CaseStatistics, CaseSummary, EmailDispatcher,
    MemoryMailer, SmtpMailer,
};

// Version and build information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppError, AppResult, AuthError, AuthService, CaseRecord, CaseService, Config, Result,
        UserAccount, NAME, VERSION,
    };

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, warn};
}

// Environment parsing shared by the config sections
pub mod config_helpers {
    use crate::{AppError, Result};
    use std::env;

    /// Parse an environment variable, using `default` when it is unset or blank.
    ///
    /// A value that is present but malformed is a configuration error.
    pub fn parse_env_var<T>(key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|e| {
                AppError::config(format!("{} has invalid value {:?}: {}", key, value, e))
            }),
            _ => Ok(default),
        }
    }

    /// Read an environment variable that has no default
    pub fn get_required_env_var(key: &str) -> Result<String> {
        match env::var(key) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(AppError::config(format!(
                "{} must be set; there is no built-in default",
                key
            ))),
        }
    }

    /// Read an optional string variable, treating blank as unset
    pub fn optional_env_var(key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
