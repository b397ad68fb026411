// Centralized configuration constants

// Network / HTTP
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;

// Server
pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const HTTP_KEEPALIVE_SECS: u64 = 60;
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
/// 1MB
pub const MAX_JSON_PAYLOAD_BYTES: usize = 1024 * 1024;

// CORS
pub const DEFAULT_CORS_MAX_AGE_SECS: usize = 3600;

// Storage
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_EXPORT_DIR: &str = "exports";

// SMTP
pub const DEFAULT_SMTP_SERVER: &str = "smtp-mail.outlook.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_FROM_NAME: &str = "Case Opening Sheet Manager";
pub const SMTP_TIMEOUT_SECS: u64 = 30;
/// Encrypted SMTP credential file, relative to the data directory
pub const SMTP_CREDENTIALS_FILE: &str = "smtp_credentials.enc";
pub const MIN_MASTER_PASSWORD_LENGTH: usize = 12;
pub const CREDENTIAL_KEY_ITERATIONS: u32 = 100_000;

// Authentication
pub const DEFAULT_ALLOWED_EMAIL_DOMAINS: &[&str] = &["@pd15.org", "@pd15.state.fl.us"];
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_VERIFICATION_CODE_TTL_MINUTES: i64 = 10;
pub const DEFAULT_LOGIN_PIN_TTL_MINUTES: i64 = 5;
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 30;
pub const MAX_CODE_TTL_MINUTES: i64 = 24 * 60;
/// Wrong guesses allowed against one verification code or PIN
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;
/// HS256 keys shorter than this are rejected at startup
pub const MIN_JWT_SECRET_BYTES: usize = 32;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "compact";
