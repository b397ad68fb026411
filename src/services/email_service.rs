use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::constants::SMTP_TIMEOUT_SECS;
use crate::config::settings::SmtpConfig;

/// Signature appended to every outgoing message
pub const EMAIL_SIGNATURE: &str = "---\n15th Judicial Circuit Public Defender's Office\nCase Opening Sheet Manager\nThis is an automated message.";

/// Email delivery errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("failed to send email: {0}")]
    SendFailure(String),

    #[error("email is not configured: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EmailError>;

/// Outgoing mail seam used by the auth service
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

fn with_signature(body: &str) -> String {
    format!("{}\n\n{}", body, EMAIL_SIGNATURE)
}

/// SMTP dispatcher: STARTTLS relay, authenticated, one message per connection
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from.to_string()).finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let server = config.server.trim();
        if server.is_empty() {
            return Err(EmailError::Config("SMTP_SERVER is empty".to_string()));
        }
        if !config.has_credentials() {
            return Err(EmailError::Config(
                "SMTP_USERNAME and SMTP_PASSWORD are required (or an unlocked credential file)"
                    .to_string(),
            ));
        }

        let from: Mailbox = format!("{} <{}>", config.from_name, config.username)
            .parse()
            .map_err(|e| EmailError::Config(format!("invalid from address: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
            .map_err(|e| EmailError::Config(format!("invalid SMTP relay {}: {}", server, e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(SMTP_TIMEOUT_SECS)))
            .build();

        info!("SMTP mailer configured for {}:{}", server, config.port);
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailDispatcher for SmtpMailer {
    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| EmailError::SendFailure(format!("invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(with_signature(body))
            .map_err(|e| EmailError::SendFailure(e.to_string()))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Email sent to {}", to);
                Ok(())
            }
            Err(e) => {
                error!("SMTP delivery to {} failed: {}", to, e);
                Err(EmailError::SendFailure(e.to_string()))
            }
        }
    }
}

/// Message captured by [`MemoryMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Dispatcher that keeps messages in memory. Only reachable through
/// `AppState::new`; production state always sends over SMTP.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail_with: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `SendFailure(reason)`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|m| m.to.eq_ignore_ascii_case(to))
    }

    /// First 6-digit number in the latest message to `to`
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let message = self.last_to(to)?;
        message
            .body
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 6)
            .map(str::to_string)
    }
}

#[async_trait]
impl EmailDispatcher for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(EmailError::SendFailure(reason.clone()));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| EmailError::SendFailure("mailbox lock poisoned".to_string()))?;
        sent.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: with_signature(body),
            sent_at: Utc::now(),
        });
        debug!("Captured email to {} ({} in mailbox)", to, sent.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_records_signed_messages() {
        let mailer = MemoryMailer::new();
        mailer
            .send("jdoe@pd15.org", "Subject", "Your login PIN is: 042137")
            .await
            .unwrap();

        let message = mailer.last_to("JDOE@pd15.org").unwrap();
        assert!(message.body.ends_with("This is an automated message."));
        assert_eq!(mailer.last_code_for("jdoe@pd15.org").as_deref(), Some("042137"));
    }

    #[tokio::test]
    async fn failing_mailer_reports_send_failure() {
        let mailer = MemoryMailer::failing("relay down");
        let err = mailer.send("a@pd15.org", "s", "b").await.unwrap_err();
        assert_eq!(err, EmailError::SendFailure("relay down".to_string()));
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn smtp_mailer_requires_credentials() {
        assert!(matches!(
            SmtpMailer::new(&SmtpConfig::default()),
            Err(EmailError::Config(_))
        ));

        let config = SmtpConfig {
            username: "mailer@pd15.org".to_string(),
            ..SmtpConfig::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(EmailError::Config(_))));
    }

    #[test]
    fn smtp_mailer_rejects_blank_server() {
        let config = SmtpConfig {
            server: "  ".to_string(),
            username: "mailer@pd15.org".to_string(),
            password: "app-password".to_string(),
            ..SmtpConfig::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(EmailError::Config(_))));
    }

    #[tokio::test]
    async fn smtp_mailer_builds_for_default_relay() {
        let config = SmtpConfig {
            username: "mailer@pd15.org".to_string(),
            password: "app-password".to_string(),
            ..SmtpConfig::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();
        assert!(format!("{:?}", mailer).contains("mailer@pd15.org"));
    }
}
