use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::token::SessionToken;
use crate::auth::{AuthError, Result, SessionIdentity, SessionSigner};
use crate::config::settings::AuthConfig;
use crate::models::{AccountProfile, LoginPin, PendingRegistration, UserAccount};
use crate::services::email_service::EmailDispatcher;
use crate::storage::{CredentialStore, PurgeReport};
use crate::utils::crypto::{
    codes_match, generate_id, generate_numeric_code, generate_salt, hash_password,
    verify_password,
};
use crate::utils::validator::{is_allowed_email_domain, normalize_email};
use crate::utils::Clock;

/// Acknowledgement that a code or PIN was emailed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeReceipt {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Successful sign-in: a session token and the account it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: SessionToken,
    pub account: AccountProfile,
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn EmailDispatcher>,
    clock: Arc<dyn Clock>,
    signer: SessionSigner,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailDispatcher>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        let signer = SessionSigner::new(config.jwt_secret.as_bytes(), config.session_ttl());
        Self {
            store,
            mailer,
            clock,
            signer,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn check_password_strength(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }
        Ok(())
    }

    /// Start a registration: store a pending entry and email its verification code
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<CodeReceipt> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required".to_string()));
        }
        let email = normalize_email(email);
        if !is_allowed_email_domain(&email, &self.config.allowed_domains) {
            warn!("Registration rejected for disallowed domain: {}", email);
            return Err(AuthError::InvalidDomain(email));
        }
        self.check_password_strength(password)?;

        let now = self.clock.now();
        self.store.purge_expired(now).await?;

        if self.store.get_user(&email).await?.is_some() {
            return Err(AuthError::DuplicateAccount(email));
        }
        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateAccount(username.to_string()));
        }

        let salt = generate_salt();
        let code = generate_numeric_code();
        let expires_at = now + self.config.verification_code_ttl();
        let pending = PendingRegistration {
            id: generate_id(),
            username: username.to_string(),
            email: email.clone(),
            password_hash: hash_password(password, &salt),
            salt,
            verification_code: code.clone(),
            code_expiry: expires_at,
            created_at: now,
            failed_attempts: 0,
        };
        self.store.put_pending(&pending).await?;

        let body = format!(
            "Welcome to the Case Opening Sheet Manager!\n\n\
             Your verification code is: {}\n\n\
             This code expires in {} minutes. Please enter this code on the verification page to complete your registration.\n\n\
             If you did not request this registration, please ignore this email.",
            code, self.config.verification_code_ttl_minutes
        );
        if let Err(e) = self
            .mailer
            .send(&email, "Verify Your Case Opening Sheet Manager Account", &body)
            .await
        {
            error!("Verification email to {} failed: {}", email, e);
            self.store.remove_pending(&email).await?;
            return Err(e.into());
        }

        info!("Pending registration created for {}", email);
        Ok(CodeReceipt { email, expires_at })
    }

    /// Confirm a registration code and promote the pending entry to an account
    #[instrument(skip(self, code))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<AccountProfile> {
        let email = normalize_email(email);
        let now = self.clock.now();

        let pending = self
            .store
            .get_pending(&email)
            .await?
            .ok_or_else(|| AuthError::PendingNotFound(email.clone()))?;

        if pending.is_expired(now) {
            self.store.remove_pending(&email).await?;
            warn!("Expired verification code presented for {}", email);
            return Err(AuthError::CodeExpired);
        }
        if !codes_match(&pending.verification_code, code) {
            let mut pending = pending;
            pending.failed_attempts += 1;
            warn!(
                "Verification code mismatch for {} ({} of {})",
                email, pending.failed_attempts, self.config.max_code_attempts
            );
            if pending.failed_attempts >= self.config.max_code_attempts {
                self.store.remove_pending(&email).await?;
                return Err(AuthError::TooManyAttempts);
            }
            self.store.put_pending(&pending).await?;
            return Err(AuthError::CodeMismatch);
        }

        if self.store.get_user(&email).await?.is_some() {
            self.store.remove_pending(&email).await?;
            return Err(AuthError::DuplicateAccount(email));
        }
        // Another pending entry may have claimed the username since registration
        if self
            .store
            .find_user_by_username(&pending.username)
            .await?
            .is_some()
        {
            self.store.remove_pending(&email).await?;
            warn!("Username {} was taken before {} verified", pending.username, email);
            return Err(AuthError::DuplicateAccount(pending.username));
        }

        let account = pending.into_account(now);
        self.store.put_user(&account).await?;
        self.store.remove_pending(&email).await?;
        self.store.purge_expired(now).await?;

        info!("Account verified for {}", email);
        Ok(AccountProfile::from(&account))
    }

    /// Password login
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let mut account = self
            .store
            .get_user(&email)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound(email.clone()))?;

        if !verify_password(password, &account.password_hash, &account.salt) {
            warn!("Invalid password for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.open_session(&mut account).await?;
        info!("Password login for {}", email);
        Ok(session)
    }

    /// Email a fresh login PIN, replacing any earlier one
    #[instrument(skip(self))]
    pub async fn request_pin(&self, email: &str) -> Result<CodeReceipt> {
        let email = normalize_email(email);
        let account = self
            .store
            .get_user(&email)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound(email.clone()))?;

        let now = self.clock.now();
        self.store.purge_expired(now).await?;

        let pin = generate_numeric_code();
        let expires_at = now + self.config.login_pin_ttl();
        self.store
            .put_pin(&LoginPin {
                email: email.clone(),
                user_id: account.id.clone(),
                pin: pin.clone(),
                expiry: expires_at,
                consumed: false,
                failed_attempts: 0,
            })
            .await?;

        let body = format!(
            "Your login PIN is: {}\n\n\
             This PIN expires in {} minutes.\n\n\
             If you did not request this PIN, please ignore this email.",
            pin, self.config.login_pin_ttl_minutes
        );
        if let Err(e) = self
            .mailer
            .send(&email, "Case Opening Sheet Manager - Login PIN", &body)
            .await
        {
            error!("Login PIN email to {} failed: {}", email, e);
            self.store.remove_pin(&email).await?;
            return Err(e.into());
        }

        info!("Login PIN issued for {}", email);
        Ok(CodeReceipt { email, expires_at })
    }

    /// One-time PIN login
    #[instrument(skip(self, pin))]
    pub async fn login_with_pin(&self, email: &str, pin: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let now = self.clock.now();

        let mut entry = self
            .store
            .get_pin(&email)
            .await?
            .ok_or_else(|| AuthError::PinNotFound(email.clone()))?;

        if entry.is_expired(now) {
            self.store.remove_pin(&email).await?;
            warn!("Expired login PIN presented for {}", email);
            return Err(AuthError::PinExpired);
        }
        if entry.consumed {
            warn!("Reused login PIN presented for {}", email);
            return Err(AuthError::PinAlreadyUsed);
        }
        if !codes_match(&entry.pin, pin) {
            entry.failed_attempts += 1;
            warn!(
                "Login PIN mismatch for {} ({} of {})",
                email, entry.failed_attempts, self.config.max_code_attempts
            );
            if entry.failed_attempts >= self.config.max_code_attempts {
                self.store.remove_pin(&email).await?;
                return Err(AuthError::TooManyAttempts);
            }
            self.store.put_pin(&entry).await?;
            return Err(AuthError::PinMismatch);
        }

        let Some(mut account) = self.store.get_user(&email).await? else {
            self.store.remove_pin(&email).await?;
            return Err(AuthError::AccountNotFound(email));
        };

        // Kept until expiry so a replay reports PinAlreadyUsed
        entry.consumed = true;
        self.store.put_pin(&entry).await?;

        let session = self.open_session(&mut account).await?;
        self.store.purge_expired(now).await?;
        info!("PIN login for {}", email);
        Ok(session)
    }

    /// Validate a bearer token and return its identity
    pub fn verify_session(&self, token: &str) -> Result<SessionIdentity> {
        let identity = self.signer.verify(token, self.clock.now())?;
        debug!("Session verified for {}", identity.email);
        Ok(identity)
    }

    /// Replace the password after checking the current one
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let email = normalize_email(email);
        let mut account = self
            .store
            .get_user(&email)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound(email.clone()))?;

        if !verify_password(current_password, &account.password_hash, &account.salt) {
            warn!("Password change rejected for {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        self.check_password_strength(new_password)?;

        let salt = generate_salt();
        account.password_hash = hash_password(new_password, &salt);
        account.salt = salt;
        self.store.put_user(&account).await?;

        info!("Password changed for {}", email);
        Ok(())
    }

    /// Drop expired pending registrations and PINs
    pub async fn cleanup_expired(&self) -> Result<PurgeReport> {
        let report = self.store.purge_expired(self.clock.now()).await?;
        debug!("Expired credential cleanup removed {} entries", report.total());
        Ok(report)
    }

    async fn open_session(&self, account: &mut UserAccount) -> Result<AuthSession> {
        let now = self.clock.now();
        account.last_login = Some(now);
        self.store.put_user(account).await?;

        let token = self.signer.issue(account, now)?;
        Ok(AuthSession {
            token,
            account: AccountProfile::from(&*account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email_service::MemoryMailer;
    use crate::storage::MemoryStorage;
    use crate::utils::ManualClock;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        service: AuthService,
        mailer: Arc<MemoryMailer>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStorage>,
    }

    fn fixture_with_mailer(mailer: MemoryMailer) -> Fixture {
        let store = Arc::new(MemoryStorage::new());
        let mailer = Arc::new(mailer);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap(),
        ));
        let config = AuthConfig {
            jwt_secret: "unit-test-secret-with-at-least-32-bytes".to_string(),
            ..AuthConfig::default()
        };
        let service = AuthService::new(store.clone(), mailer.clone(), clock.clone(), config);
        Fixture {
            service,
            mailer,
            clock,
            store,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_mailer(MemoryMailer::new())
    }

    async fn registered(f: &Fixture) {
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        f.service.verify("jdoe@pd15.org", &code).await.unwrap();
    }

    #[tokio::test]
    async fn register_rejects_outside_domains() {
        let f = fixture();
        let err = f
            .service
            .register("eve", "eve@gmail.com", "Secret123!")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidDomain("eve@gmail.com".to_string()));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn register_validates_input() {
        let f = fixture();
        assert!(matches!(
            f.service.register("  ", "a@pd15.org", "Secret123!").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            f.service.register("a", "a@pd15.org", "short").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn verification_code_is_single_use() {
        let f = fixture();
        f.service
            .register("jdoe", "JDoe@PD15.org", "Secret123!")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("jdoe@pd15.org").unwrap();

        let profile = f.service.verify("jdoe@pd15.org", &code).await.unwrap();
        assert_eq!(profile.email, "jdoe@pd15.org");
        assert!(profile.verified);

        let err = f.service.verify("jdoe@pd15.org", &code).await.unwrap_err();
        assert_eq!(err, AuthError::PendingNotFound("jdoe@pd15.org".to_string()));
    }

    #[tokio::test]
    async fn expired_code_removes_pending_entry() {
        let f = fixture();
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("jdoe@pd15.org").unwrap();

        f.clock.advance(Duration::minutes(10) + Duration::seconds(1));
        assert_eq!(
            f.service.verify("jdoe@pd15.org", &code).await.unwrap_err(),
            AuthError::CodeExpired
        );
        assert!(f.store.get_pending("jdoe@pd15.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_code_keeps_pending_entry() {
        let f = fixture();
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        let wrong = if code == "999999" { "100000" } else { "999999" };

        assert_eq!(
            f.service.verify("jdoe@pd15.org", wrong).await.unwrap_err(),
            AuthError::CodeMismatch
        );
        assert!(f.service.verify("jdoe@pd15.org", &code).await.is_ok());
    }

    #[tokio::test]
    async fn repeated_wrong_codes_discard_the_registration() {
        let f = fixture();
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        let wrong = if code == "999999" { "100000" } else { "999999" };
        let limit = f.service.config().max_code_attempts;

        for _ in 1..limit {
            assert_eq!(
                f.service.verify("jdoe@pd15.org", wrong).await.unwrap_err(),
                AuthError::CodeMismatch
            );
        }
        let pending = f.store.get_pending("jdoe@pd15.org").await.unwrap().unwrap();
        assert_eq!(pending.failed_attempts, limit - 1);

        assert_eq!(
            f.service.verify("jdoe@pd15.org", wrong).await.unwrap_err(),
            AuthError::TooManyAttempts
        );
        assert!(f.store.get_pending("jdoe@pd15.org").await.unwrap().is_none());
        assert_eq!(
            f.service.verify("jdoe@pd15.org", &code).await.unwrap_err(),
            AuthError::PendingNotFound("jdoe@pd15.org".to_string())
        );
    }

    #[tokio::test]
    async fn username_claimed_by_earlier_verification_is_rejected() {
        let f = fixture();
        f.service.register("jdoe", "a@pd15.org", "Secret123!").await.unwrap();
        let code_a = f.mailer.last_code_for("a@pd15.org").unwrap();
        f.service.register("jdoe", "b@pd15.org", "Secret123!").await.unwrap();
        let code_b = f.mailer.last_code_for("b@pd15.org").unwrap();

        f.service.verify("a@pd15.org", &code_a).await.unwrap();
        assert_eq!(
            f.service.verify("b@pd15.org", &code_b).await.unwrap_err(),
            AuthError::DuplicateAccount("jdoe".to_string())
        );
        assert!(f.store.get_pending("b@pd15.org").await.unwrap().is_none());
        assert!(f.store.get_user("b@pd15.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let f = fixture();
        registered(&f).await;
        assert_eq!(
            f.service
                .register("other", "jdoe@pd15.org", "Secret123!")
                .await
                .unwrap_err(),
            AuthError::DuplicateAccount("jdoe@pd15.org".to_string())
        );
        assert_eq!(
            f.service
                .register("jdoe", "john@pd15.org", "Secret123!")
                .await
                .unwrap_err(),
            AuthError::DuplicateAccount("jdoe".to_string())
        );
    }

    #[tokio::test]
    async fn failed_email_rolls_back_pending_entry() {
        let f = fixture_with_mailer(MemoryMailer::failing("relay down"));
        let err = f
            .service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Email(_)));
        assert!(f.store.get_pending("jdoe@pd15.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_issues_token_and_records_last_login() {
        let f = fixture();
        registered(&f).await;
        f.clock.advance(Duration::hours(1));

        let session = f.service.login("jdoe@pd15.org", "Secret123!").await.unwrap();
        assert_eq!(session.account.last_login, Some(f.clock.now()));

        let identity = f.service.verify_session(&session.token.token).unwrap();
        assert_eq!(identity.email, "jdoe@pd15.org");
        assert_eq!(identity.username, "jdoe");
    }

    #[tokio::test]
    async fn login_failures() {
        let f = fixture();
        registered(&f).await;
        assert_eq!(
            f.service.login("jdoe@pd15.org", "nope-nope").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            f.service.login("ghost@pd15.org", "Secret123!").await.unwrap_err(),
            AuthError::AccountNotFound("ghost@pd15.org".to_string())
        );
    }

    #[tokio::test]
    async fn unverified_login_is_account_not_found() {
        let f = fixture();
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        assert!(matches!(
            f.service.login("jdoe@pd15.org", "Secret123!").await,
            Err(AuthError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn pin_expiry_boundary() {
        let f = fixture();
        registered(&f).await;

        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        f.clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert!(f.service.login_with_pin("jdoe@pd15.org", &pin).await.is_ok());

        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        f.clock.advance(Duration::minutes(5) + Duration::seconds(1));
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", &pin).await.unwrap_err(),
            AuthError::PinExpired
        );
    }

    #[tokio::test]
    async fn pin_is_single_use() {
        let f = fixture();
        registered(&f).await;
        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();

        f.service.login_with_pin("jdoe@pd15.org", &pin).await.unwrap();
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", &pin).await.unwrap_err(),
            AuthError::PinAlreadyUsed
        );
    }

    #[tokio::test]
    async fn pin_errors() {
        let f = fixture();
        registered(&f).await;
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", "123456").await.unwrap_err(),
            AuthError::PinNotFound("jdoe@pd15.org".to_string())
        );
        assert!(matches!(
            f.service.request_pin("ghost@pd15.org").await,
            Err(AuthError::AccountNotFound(_))
        ));

        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        let wrong = if pin == "999999" { "100000" } else { "999999" };
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", wrong).await.unwrap_err(),
            AuthError::PinMismatch
        );
    }

    #[tokio::test]
    async fn repeated_wrong_pins_discard_the_pin() {
        let f = fixture();
        registered(&f).await;
        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        let wrong = if pin == "999999" { "100000" } else { "999999" };
        let limit = f.service.config().max_code_attempts;

        for _ in 1..limit {
            assert_eq!(
                f.service.login_with_pin("jdoe@pd15.org", wrong).await.unwrap_err(),
                AuthError::PinMismatch
            );
        }
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", wrong).await.unwrap_err(),
            AuthError::TooManyAttempts
        );
        assert_eq!(
            f.service.login_with_pin("jdoe@pd15.org", &pin).await.unwrap_err(),
            AuthError::PinNotFound("jdoe@pd15.org".to_string())
        );

        // a fresh PIN starts a new count
        f.service.request_pin("jdoe@pd15.org").await.unwrap();
        let pin = f.mailer.last_code_for("jdoe@pd15.org").unwrap();
        assert!(f.service.login_with_pin("jdoe@pd15.org", &pin).await.is_ok());
    }

    #[tokio::test]
    async fn session_expires_after_ttl() {
        let f = fixture();
        registered(&f).await;
        let session = f.service.login("jdoe@pd15.org", "Secret123!").await.unwrap();

        f.clock.advance(Duration::hours(24));
        assert_eq!(
            f.service.verify_session(&session.token.token).unwrap_err(),
            AuthError::TokenExpired
        );
        assert!(matches!(
            f.service.verify_session("not.a.token"),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[tokio::test]
    async fn change_password_resalts() {
        let f = fixture();
        registered(&f).await;
        let before = f.store.get_user("jdoe@pd15.org").await.unwrap().unwrap();

        assert_eq!(
            f.service
                .change_password("jdoe@pd15.org", "wrong-pass", "NewSecret456!")
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
        f.service
            .change_password("jdoe@pd15.org", "Secret123!", "NewSecret456!")
            .await
            .unwrap();

        let after = f.store.get_user("jdoe@pd15.org").await.unwrap().unwrap();
        assert_ne!(before.salt, after.salt);
        assert!(f.service.login("jdoe@pd15.org", "NewSecret456!").await.is_ok());
        assert_eq!(
            f.service.login("jdoe@pd15.org", "Secret123!").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn cleanup_reports_removed_entries() {
        let f = fixture();
        f.service
            .register("jdoe", "jdoe@pd15.org", "Secret123!")
            .await
            .unwrap();
        f.clock.advance(Duration::minutes(11));
        let report = f.service.cleanup_expired().await.unwrap();
        assert_eq!(report.pending_registrations, 1);
    }
}
