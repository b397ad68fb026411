use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::secrets::SecretsError;
use crate::services::email_service::EmailError;
use crate::storage::StorageError;

/// Unified error type for the entire application
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("File system error: {0}")]
    FileSystem(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a new config error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        Self::Internal(msg.into())
    }

    /// Get error category for logging and API responses
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Authentication(_) => "auth",
            AppError::Authorization(_) => "auth",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Serialization(_) => "serialization",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Email(_) => "email",
            AppError::Internal(_) => "internal",
            AppError::FileSystem(_) => "filesystem",
        }
    }

    /// Whether the caller can fix this by changing their input.
    /// Everything else is an environment failure.
    pub fn is_user_error(&self) -> bool {
        self.http_status_code() < 500
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::Storage(_) => 500,
            AppError::Config(_) => 500,
            AppError::Authentication(_) => 401,
            AppError::Authorization(_) => 403,
            AppError::Validation(_) => 400,
            AppError::Conflict(_) => 409,
            AppError::Serialization(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::InvalidRequest(_) => 400,
            AppError::Email(_) => 502,
            AppError::Internal(_) => 500,
            AppError::FileSystem(_) => 500,
        }
    }

    /// Convert to JSON for API responses
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.category(),
            "message": self.to_string(),
            "code": self.http_status_code(),
            "timestamp": chrono::Utc::now().timestamp()
        })
    }
}

// I/O failures come from the data and export directories, never from the caller
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(format!("I/O error ({:?}): {}", err.kind(), err))
    }
}

// Serialization error conversions
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::FileSystem(format!("CSV export error: {}", err))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::ValidationError(msg) => AppError::Validation(msg),
            _ => AppError::Storage(err.to_string()),
        }
    }
}

impl From<SecretsError> for AppError {
    fn from(err: SecretsError) -> Self {
        match err {
            SecretsError::Io(_) => AppError::FileSystem(err.to_string()),
            _ => AppError::Config(err.to_string()),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidDomain(_) | AuthError::InvalidInput(_) => {
                AppError::Validation(message)
            }
            AuthError::DuplicateAccount(_) => AppError::Conflict(message),
            AuthError::AccountNotFound(_) | AuthError::PendingNotFound(_) | AuthError::PinNotFound(_) => {
                AppError::NotFound(message)
            }
            AuthError::CodeExpired
            | AuthError::CodeMismatch
            | AuthError::InvalidCredentials
            | AuthError::PinExpired
            | AuthError::PinMismatch
            | AuthError::PinAlreadyUsed
            | AuthError::TooManyAttempts
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => AppError::Authentication(message),
            AuthError::Storage(_) => AppError::Storage(message),
            AuthError::Email(_) => AppError::Email(message),
            AuthError::Internal(_) => AppError::Internal(message),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code()).json(self.to_json())
    }
}

/// Error context trait for adding additional context to errors
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error: AppError = e.into();
            AppError::Internal(format!("{}: {}", f(), base_error))
        })
    }

    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| AppError::NotFound(f()))
    }

    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_client_statuses() {
        let err: AppError = AuthError::InvalidDomain("x@gmail.com".into()).into();
        assert_eq!(err.http_status_code(), 400);
        assert!(err.is_user_error());

        let err: AppError = AuthError::DuplicateAccount("jdoe@pd15.org".into()).into();
        assert_eq!(err.http_status_code(), 409);

        let err: AppError = AuthError::PinExpired.into();
        assert_eq!(err.http_status_code(), 401);
        assert_eq!(err.category(), "auth");
    }

    #[test]
    fn environment_errors_map_to_server_statuses() {
        let err: AppError = AuthError::Email("relay refused".into()).into();
        assert_eq!(err.http_status_code(), 502);
        assert!(!err.is_user_error());

        let err: AppError = StorageError::Io("disk full".into()).into();
        assert_eq!(err.http_status_code(), 500);
    }

    #[test]
    fn io_errors_are_never_user_errors() {
        for kind in [
            std::io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound,
            std::io::ErrorKind::InvalidInput,
            std::io::ErrorKind::Other,
        ] {
            let err: AppError = std::io::Error::new(kind, "export dir").into();
            assert_eq!(err.http_status_code(), 500, "{:?}", kind);
            assert!(!err.is_user_error());
            assert_eq!(err.category(), "filesystem");
        }
    }

    #[test]
    fn option_context_yields_not_found() {
        let missing: Option<u8> = None;
        let err = missing.context("case abc").unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "case abc"));
    }

    #[test]
    fn to_json_carries_category_and_code() {
        let json = AppError::validation("Missing fields: Last Name").to_json();
        assert_eq!(json["error"], "validation");
        assert_eq!(json["code"], 400);
    }
}
