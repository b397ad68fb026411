use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::constants::{CREDENTIAL_KEY_ITERATIONS, MIN_MASTER_PASSWORD_LENGTH};
use crate::config::settings::{SmtpConfig, SmtpVaultConfig};
use crate::storage::json_file::JsonFile;
use crate::storage::StorageError;
use crate::utils::crypto::{aead_decrypt, aead_encrypt, derive_key, random_bytes};
use crate::utils::validator::normalize_email;

const VAULT_AAD: &[u8] = b"case-sheet-smtp-credentials";

/// Errors from the encrypted SMTP credential file
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretsError {
    #[error("{0} is not an authorized credential administrator")]
    Unauthorized(String),

    #[error("no SMTP credentials stored at {0}")]
    NotConfigured(String),

    #[error("master password must be at least {0} characters")]
    WeakMasterPassword(usize),

    #[error("SMTP username and password are required")]
    MissingCredentials,

    #[error("invalid master password or corrupted credential file")]
    Decrypt,

    #[error("credential file error: {0}")]
    Io(String),

    #[error("malformed credential file: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, SecretsError>;

impl From<StorageError> for SecretsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DeserializationError(msg) | StorageError::SerializationError(msg) => {
                SecretsError::Format(msg)
            }
            other => SecretsError::Io(other.to_string()),
        }
    }
}

/// On-disk layout: salt and ciphertext in base64, plus the admins allowed at write time
#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    salt: String,
    encrypted_credentials: String,
    authorized_users: Vec<String>,
    #[serde(default = "default_iterations")]
    iterations: u32,
}

fn default_iterations() -> u32 {
    CREDENTIAL_KEY_ITERATIONS
}

/// Decrypted SMTP login
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub smtp_username: String,
    pub smtp_password: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"<redacted>")
            .field("created_by", &self.created_by)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// SMTP credentials encrypted under a master password.
///
/// The key is PBKDF2-SHA256 over the master password and a per-file salt;
/// the payload is AES-256-GCM. Only emails on the administrator list may
/// write the file, and unlocking requires the email to be on both the
/// configured list and the list recorded in the file.
#[derive(Debug)]
pub struct SmtpCredentialVault {
    file: JsonFile<Option<VaultFile>>,
    admins: Vec<String>,
    iterations: u32,
}

impl SmtpCredentialVault {
    pub fn new(path: impl Into<PathBuf>, admins: &[String]) -> Self {
        Self {
            file: JsonFile::new(path),
            admins: admins.iter().map(|a| normalize_email(a)).collect(),
            iterations: CREDENTIAL_KEY_ITERATIONS,
        }
    }

    pub fn from_config(config: &SmtpVaultConfig) -> Self {
        Self::new(config.file.clone(), &config.admins)
    }

    /// Override the key-derivation work factor for newly written files
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(self.path()).await.unwrap_or(false)
    }

    fn is_authorized(&self, email: &str) -> bool {
        self.admins.iter().any(|a| *a == email)
    }

    /// Encrypt and write SMTP credentials, replacing any earlier file
    #[instrument(skip(self, master_password, smtp_password))]
    pub async fn store(
        &self,
        admin_email: &str,
        master_password: &str,
        smtp_username: &str,
        smtp_password: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let admin = normalize_email(admin_email);
        if !self.is_authorized(&admin) {
            warn!("Credential setup refused for {}", admin);
            return Err(SecretsError::Unauthorized(admin));
        }
        if master_password.chars().count() < MIN_MASTER_PASSWORD_LENGTH {
            return Err(SecretsError::WeakMasterPassword(MIN_MASTER_PASSWORD_LENGTH));
        }
        if smtp_username.trim().is_empty() || smtp_password.is_empty() {
            return Err(SecretsError::MissingCredentials);
        }

        let credentials = SmtpCredentials {
            smtp_username: smtp_username.trim().to_string(),
            smtp_password: smtp_password.to_string(),
            created_by: admin.clone(),
            created_at: now,
        };
        let plaintext =
            serde_json::to_vec(&credentials).map_err(|e| SecretsError::Format(e.to_string()))?;

        let salt: [u8; 16] = random_bytes();
        let key = derive_key(master_password, &salt, self.iterations);
        let blob = aead_encrypt(&key, &plaintext, VAULT_AAD).map_err(SecretsError::Io)?;

        if let Some(parent) = self.path().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SecretsError::Io(e.to_string()))?;
        }
        self.file
            .save(&Some(VaultFile {
                salt: STANDARD.encode(salt),
                encrypted_credentials: STANDARD.encode(blob),
                authorized_users: self.admins.clone(),
                iterations: self.iterations,
            }))
            .await?;

        info!("SMTP credentials encrypted to {} by {}", self.path().display(), admin);
        Ok(())
    }

    /// Decrypt the stored credentials for an authorized administrator
    #[instrument(skip(self, master_password))]
    pub async fn unlock(&self, admin_email: &str, master_password: &str) -> Result<SmtpCredentials> {
        let admin = normalize_email(admin_email);
        if !self.is_authorized(&admin) {
            warn!("Credential unlock refused for {}", admin);
            return Err(SecretsError::Unauthorized(admin));
        }

        let stored = self
            .file
            .load()
            .await?
            .ok_or_else(|| SecretsError::NotConfigured(self.path().display().to_string()))?;
        if !stored.authorized_users.iter().any(|u| normalize_email(u) == admin) {
            warn!("{} is no longer listed in {}", admin, self.path().display());
            return Err(SecretsError::Unauthorized(admin));
        }

        let salt = STANDARD
            .decode(&stored.salt)
            .map_err(|e| SecretsError::Format(format!("salt: {}", e)))?;
        let blob = STANDARD
            .decode(&stored.encrypted_credentials)
            .map_err(|e| SecretsError::Format(format!("ciphertext: {}", e)))?;

        let key = derive_key(master_password, &salt, stored.iterations.max(1));
        let plaintext = aead_decrypt(&key, &blob, VAULT_AAD).map_err(|_| SecretsError::Decrypt)?;
        serde_json::from_slice(&plaintext).map_err(|e| SecretsError::Format(e.to_string()))
    }
}

/// Fill SMTP username/password from the credential file when the environment has none.
///
/// Returns whether credentials were taken from the file. Environment values
/// always win; a file that exists but cannot be unlocked is an error.
pub async fn resolve_smtp_credentials(smtp: &mut SmtpConfig) -> Result<bool> {
    if smtp.has_credentials() {
        return Ok(false);
    }

    let vault = SmtpCredentialVault::from_config(&smtp.vault);
    let (Some(admin), Some(master)) = (&smtp.vault.unlock_as, &smtp.vault.master_password) else {
        if vault.exists().await {
            warn!(
                "{} exists but SMTP_CREDENTIALS_ADMIN / SMTP_MASTER_PASSWORD are not set",
                vault.path().display()
            );
        }
        return Ok(false);
    };

    let credentials = vault.unlock(admin, master).await?;
    smtp.username = credentials.smtp_username;
    smtp.password = credentials.smtp_password;
    info!("SMTP credentials unlocked from {}", vault.path().display());
    Ok(true)
}
