use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::is_expired;

/// Verified user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// unique ID (128-bit hex)
    pub id: String,
    /// user name
    pub username: String,
    /// email address (lowercase, store key)
    pub email: String,
    /// PBKDF2 password hash (hex)
    pub password_hash: String,
    /// password salt
    pub salt: String,
    /// verification status
    pub verified: bool,
    /// account creation time
    pub created_at: DateTime<Utc>,
    /// last login time
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration waiting for its emailed code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub verification_code: String,
    pub code_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Wrong codes entered so far
    #[serde(default)]
    pub failed_attempts: u32,
}

impl PendingRegistration {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.code_expiry, now)
    }

    /// Promote to an account once the code has been confirmed
    pub fn into_account(self, now: DateTime<Utc>) -> UserAccount {
        UserAccount {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            salt: self.salt,
            verified: true,
            created_at: self.created_at,
            last_login: Some(now),
        }
    }
}

/// Emailed one-time login PIN
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginPin {
    pub email: String,
    pub user_id: String,
    pub pin: String,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub consumed: bool,
    #[serde(default)]
    pub failed_attempts: u32,
}

impl LoginPin {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expiry, now)
    }
}

/// Account fields safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&UserAccount> for AccountProfile {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            verified: account.verified,
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}
