use crate::services::email_service::EmailError;
use crate::storage::StorageError;

pub mod token;

pub use token::{SessionIdentity, SessionSigner};

/// Authentication error enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Email domain is not permitted for registration: {0}")]
    InvalidDomain(String),

    #[error("An account already exists for {0}")]
    DuplicateAccount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No pending registration for {0}")]
    PendingNotFound(String),

    #[error("Verification code has expired, please register again")]
    CodeExpired,

    #[error("Invalid verification code")]
    CodeMismatch,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No login PIN was requested for {0}")]
    PinNotFound(String),

    #[error("Login PIN has expired, please request a new one")]
    PinExpired,

    #[error("Invalid login PIN")]
    PinMismatch,

    #[error("Login PIN has already been used")]
    PinAlreadyUsed,

    #[error("Too many incorrect attempts, please request a new code")]
    TooManyAttempts,

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Invalid session token: {0}")]
    TokenInvalid(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authentication result type
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<EmailError> for AuthError {
    fn from(err: EmailError) -> Self {
        AuthError::Email(err.to_string())
    }
}
