pub mod cases;
pub mod credentials;
pub mod json_file;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    config::settings::StorageConfig,
    error::{AppError, Result as AppResult},
    models::{CaseRecord, LoginPin, PendingRegistration, UserAccount},
};

pub use self::cases::JsonCaseStore;
pub use self::credentials::JsonCredentialStore;
pub use self::memory::MemoryStorage;

/// Storage Result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error types for storage operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "io",
            StorageError::NotFound(_) => "not_found",
            StorageError::SerializationError(_) => "serialization",
            StorageError::DeserializationError(_) => "deserialization",
            StorageError::ValidationError(_) => "validation",
            StorageError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Counts of entries dropped by an expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub pending_registrations: usize,
    pub login_pins: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.pending_registrations + self.login_pins
    }
}

/// Accounts, pending registrations and login PINs, all keyed by lowercase email
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Accounts
    async fn get_user(&self, email: &str) -> Result<Option<UserAccount>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserAccount>>;
    async fn put_user(&self, user: &UserAccount) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<UserAccount>>;

    // Pending registrations
    async fn get_pending(&self, email: &str) -> Result<Option<PendingRegistration>>;
    async fn put_pending(&self, pending: &PendingRegistration) -> Result<()>;
    async fn remove_pending(&self, email: &str) -> Result<bool>;

    // Login PINs
    async fn get_pin(&self, email: &str) -> Result<Option<LoginPin>>;
    async fn put_pin(&self, pin: &LoginPin) -> Result<()>;
    async fn remove_pin(&self, email: &str) -> Result<bool>;

    /// Drop pending registrations and PINs whose expiry is before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport>;
}

/// Case records in storage order
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn insert(&self, case: &CaseRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<CaseRecord>>;
    /// Replace the record with the same id; false if no such record
    async fn update(&self, case: &CaseRecord) -> Result<bool>;
    /// Remove by id; false if no such record
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<CaseRecord>>;
    async fn search(&self, term: &str) -> Result<Vec<CaseRecord>>;
}

/// Storage handles shared by the services
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub cases: Arc<dyn CaseStore>,
}

/// Storage factory
pub struct StorageFactory;

impl StorageFactory {
    /// Create the JSON file stores under `data_dir`
    pub async fn create_json_storage(data_dir: &Path) -> AppResult<Stores> {
        tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        Ok(Stores {
            credentials: Arc::new(JsonCredentialStore::new(data_dir)),
            cases: Arc::new(JsonCaseStore::new(data_dir.join(cases::CASES_FILE))),
        })
    }

    /// Create memory storage for testing
    pub fn create_memory_storage() -> Stores {
        let memory = Arc::new(MemoryStorage::new());
        Stores {
            credentials: memory.clone(),
            cases: memory,
        }
    }
}

/// Storage initialization
#[instrument(skip(config))]
pub async fn init_storage(config: &StorageConfig) -> AppResult<Stores> {
    info!("Initializing JSON storage in {}", config.data_dir.display());

    let stores = StorageFactory::create_json_storage(&config.data_dir).await?;

    // Surface unreadable files at startup rather than on the first request
    stores.credentials.list_users().await?;
    stores.cases.list().await?;

    info!("✅ Storage layer initialized successfully");
    Ok(stores)
}
