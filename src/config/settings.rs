use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::constants::*;
use crate::config_helpers::{get_required_env_var, optional_env_var, parse_env_var};
use crate::error::{AppError, Result};

/// Main configuration container for the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration settings
    pub server: ServerConfig,
    /// Storage configuration settings
    pub storage: StorageConfig,
    /// Outgoing mail settings
    pub smtp: SmtpConfig,
    /// Registration, login and session settings
    pub auth: AuthConfig,
    /// Logging configuration settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Fails when `JWT_SECRET` is missing or too short, or when any value is
    /// malformed or out of range.
    pub fn load() -> Result<Self> {
        let storage = StorageConfig::load();
        let config = Self {
            server: ServerConfig::load()?,
            smtp: SmtpConfig::load(&storage.data_dir)?,
            storage,
            auth: AuthConfig::load()?,
            logging: LoggingConfig::load(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: temp-friendly paths and a fixed secret
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig {
                export_dir: data_dir.join(DEFAULT_EXPORT_DIR),
                data_dir: data_dir.clone(),
            },
            smtp: SmtpConfig {
                vault: SmtpVaultConfig {
                    file: data_dir.join(SMTP_CREDENTIALS_FILE),
                    ..SmtpVaultConfig::default()
                },
                ..SmtpConfig::default()
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
                ..AuthConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::config("SERVER_PORT must be non-zero"));
        }
        if self.server.worker_threads == 0 {
            return Err(AppError::config("WORKER_THREADS must be at least 1"));
        }
        self.auth.validate()
    }
}

/// Server configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to listen on
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Number of worker threads
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables or use defaults
    pub fn load() -> Result<Self> {
        Ok(Self {
            host: optional_env_var("SERVER_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            port: parse_env_var("SERVER_PORT", DEFAULT_HTTP_PORT)?,
            worker_threads: parse_env_var("WORKER_THREADS", num_cpus::get().max(1))?,
        })
    }
}

/// Storage configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding users.json, pending_users.json, login_pins.json and cases.json
    pub data_dir: PathBuf,
    /// Destination for CSV and JSON exports
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

impl StorageConfig {
    /// Load storage configuration from environment variables or use defaults
    pub fn load() -> Self {
        Self {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            export_dir: env::var("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_EXPORT_DIR)),
        }
    }
}

/// SMTP relay settings
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// STARTTLS relay host
    pub server: String,
    pub port: u16,
    /// Login for the relay; also the From address
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Display name used in the From header
    pub from_name: String,
    /// Encrypted credential file used when username/password are not in the environment
    pub vault: SmtpVaultConfig,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .field("vault", &self.vault)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SMTP_SERVER.to_string(),
            port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            from_name: DEFAULT_SMTP_FROM_NAME.to_string(),
            vault: SmtpVaultConfig::default(),
        }
    }
}

impl SmtpConfig {
    pub fn load(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            server: optional_env_var("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
            port: parse_env_var("SMTP_PORT", DEFAULT_SMTP_PORT)?,
            username: optional_env_var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_name: optional_env_var("SMTP_FROM_NAME")
                .unwrap_or_else(|| DEFAULT_SMTP_FROM_NAME.to_string()),
            vault: SmtpVaultConfig::load(data_dir),
        })
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Location of the encrypted SMTP credential file and who may unlock it
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SmtpVaultConfig {
    pub file: PathBuf,
    /// Administrator emails allowed to write or unlock the file
    pub admins: Vec<String>,
    /// Administrator identity used to unlock at startup
    pub unlock_as: Option<String>,
    #[serde(skip_serializing)]
    pub master_password: Option<String>,
}

impl std::fmt::Debug for SmtpVaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpVaultConfig")
            .field("file", &self.file)
            .field("admins", &self.admins)
            .field("unlock_as", &self.unlock_as)
            .field("master_password", &self.master_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SmtpVaultConfig {
    pub fn load(data_dir: &Path) -> Self {
        Self {
            file: optional_env_var("SMTP_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(SMTP_CREDENTIALS_FILE)),
            admins: optional_env_var("SMTP_CREDENTIALS_ADMINS")
                .map(|v| parse_email_list(&v))
                .unwrap_or_default(),
            unlock_as: optional_env_var("SMTP_CREDENTIALS_ADMIN").map(|v| v.to_lowercase()),
            master_password: env::var("SMTP_MASTER_PASSWORD").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Registration, login and session settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key for session tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Accepted email suffixes, each starting with '@'
    pub allowed_domains: Vec<String>,
    pub session_ttl_hours: i64,
    pub verification_code_ttl_minutes: i64,
    pub login_pin_ttl_minutes: i64,
    pub min_password_length: usize,
    /// Wrong guesses before a pending code or PIN is discarded
    pub max_code_attempts: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("allowed_domains", &self.allowed_domains)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("verification_code_ttl_minutes", &self.verification_code_ttl_minutes)
            .field("login_pin_ttl_minutes", &self.login_pin_ttl_minutes)
            .field("min_password_length", &self.min_password_length)
            .field("max_code_attempts", &self.max_code_attempts)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            allowed_domains: DEFAULT_ALLOWED_EMAIL_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            verification_code_ttl_minutes: DEFAULT_VERIFICATION_CODE_TTL_MINUTES,
            login_pin_ttl_minutes: DEFAULT_LOGIN_PIN_TTL_MINUTES,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

impl AuthConfig {
    pub fn load() -> Result<Self> {
        let jwt_secret = get_required_env_var("JWT_SECRET")?;

        let allowed_domains = optional_env_var("ALLOWED_EMAIL_DOMAINS")
            .map(|v| parse_domains(&v))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| Self::default().allowed_domains);

        Ok(Self {
            jwt_secret,
            allowed_domains,
            session_ttl_hours: parse_env_var("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            verification_code_ttl_minutes: parse_env_var(
                "VERIFICATION_CODE_TTL_MINUTES",
                DEFAULT_VERIFICATION_CODE_TTL_MINUTES,
            )?,
            login_pin_ttl_minutes: parse_env_var(
                "LOGIN_PIN_TTL_MINUTES",
                DEFAULT_LOGIN_PIN_TTL_MINUTES,
            )?,
            min_password_length: parse_env_var("MIN_PASSWORD_LENGTH", DEFAULT_MIN_PASSWORD_LENGTH)?,
            max_code_attempts: parse_env_var("MAX_CODE_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(AppError::config(format!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_BYTES
            )));
        }
        if self.allowed_domains.is_empty() {
            return Err(AppError::config(
                "ALLOWED_EMAIL_DOMAINS must name at least one domain",
            ));
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(AppError::config(format!(
                "SESSION_TTL_HOURS must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }
        for (name, minutes) in [
            ("VERIFICATION_CODE_TTL_MINUTES", self.verification_code_ttl_minutes),
            ("LOGIN_PIN_TTL_MINUTES", self.login_pin_ttl_minutes),
        ] {
            if !(1..=MAX_CODE_TTL_MINUTES).contains(&minutes) {
                return Err(AppError::config(format!(
                    "{} must be between 1 and {}",
                    name, MAX_CODE_TTL_MINUTES
                )));
            }
        }
        if self.max_code_attempts == 0 {
            return Err(AppError::config("MAX_CODE_ATTEMPTS must be at least 1"));
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn verification_code_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.verification_code_ttl_minutes)
    }

    pub fn login_pin_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.login_pin_ttl_minutes)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// "compact" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Load logging configuration from environment variables or use defaults
    pub fn load() -> Self {
        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| DEFAULT_LOG_FORMAT.to_string()),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Split a comma separated list, adding the leading '@' where missing
pub fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .map(|d| if d.starts_with('@') { d } else { format!("@{}", d) })
        .collect()
}

/// Split a comma separated list of email addresses, lowercased
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_normalized() {
        assert_eq!(
            parse_domains(" pd15.org, @PD15.state.fl.us ,,"),
            vec!["@pd15.org".to_string(), "@pd15.state.fl.us".to_string()]
        );
    }

    #[test]
    fn short_secret_is_rejected() {
        let auth = AuthConfig {
            jwt_secret: "too-short".to_string(),
            ..AuthConfig::default()
        };
        assert!(matches!(auth.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn testing_config_is_valid() {
        let config = Config::for_testing("/tmp/case-sheet");
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.login_pin_ttl(), chrono::Duration::minutes(5));
    }

    #[test]
    fn oversized_ttls_are_rejected() {
        let auth = AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            session_ttl_hours: i64::MAX / 2,
            ..AuthConfig::default()
        };
        assert!(matches!(auth.validate(), Err(AppError::Config(_))));

        let auth = AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            login_pin_ttl_minutes: MAX_CODE_TTL_MINUTES + 1,
            ..AuthConfig::default()
        };
        assert!(matches!(auth.validate(), Err(AppError::Config(ref m)) if m.contains("LOGIN_PIN")));

        let auth = AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            session_ttl_hours: MAX_SESSION_TTL_HOURS,
            ..AuthConfig::default()
        };
        assert!(auth.validate().is_ok());
        assert_eq!(auth.session_ttl(), chrono::Duration::days(30));
    }

    #[test]
    fn malformed_numbers_fail_instead_of_defaulting() {
        env::set_var("CASE_SHEET_TEST_TTL_MALFORMED", "abc");
        let parsed = parse_env_var("CASE_SHEET_TEST_TTL_MALFORMED", DEFAULT_SESSION_TTL_HOURS);
        assert!(matches!(parsed, Err(AppError::Config(ref m)) if m.contains("CASE_SHEET_TEST_TTL_MALFORMED")));

        env::set_var("CASE_SHEET_TEST_TTL_VALID", " 12 ");
        assert_eq!(parse_env_var("CASE_SHEET_TEST_TTL_VALID", 24i64).unwrap(), 12);
        assert_eq!(parse_env_var("CASE_SHEET_TEST_TTL_UNSET", 24i64).unwrap(), 24);
    }

    #[test]
    fn smtp_defaults_to_outlook_relay() {
        let smtp = SmtpConfig::default();
        assert_eq!(smtp.server, "smtp-mail.outlook.com");
        assert_eq!(smtp.port, 587);
        assert!(!smtp.has_credentials());
    }

    #[test]
    fn email_lists_are_lowercased() {
        assert_eq!(
            parse_email_list("Admin@PD15.org, ,ops@pd15.org"),
            vec!["admin@pd15.org".to_string(), "ops@pd15.org".to_string()]
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config::for_testing("/tmp/case-sheet");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-secret"));
    }
}
