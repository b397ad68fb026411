use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::models::{LoginPin, PendingRegistration, UserAccount};
use crate::storage::json_file::JsonFile;
use crate::storage::{CredentialStore, PurgeReport, Result};

pub const USERS_FILE: &str = "users.json";
pub const PENDING_FILE: &str = "pending_users.json";
pub const PINS_FILE: &str = "login_pins.json";

type Collection<T> = BTreeMap<String, T>;

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Credential store backed by three JSON documents, one per collection
#[derive(Debug)]
pub struct JsonCredentialStore {
    data_dir: PathBuf,
    users: JsonFile<Collection<UserAccount>>,
    pending: JsonFile<Collection<PendingRegistration>>,
    pins: JsonFile<Collection<LoginPin>>,
}

impl JsonCredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            users: JsonFile::new(data_dir.join(USERS_FILE)),
            pending: JsonFile::new(data_dir.join(PENDING_FILE)),
            pins: JsonFile::new(data_dir.join(PINS_FILE)),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn get_user(&self, email: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.load().await?.remove(&key(email)))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .users
            .load()
            .await?
            .into_values()
            .find(|u| u.username == username))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.load().await?.into_values().find(|u| u.id == id))
    }

    async fn put_user(&self, user: &UserAccount) -> Result<()> {
        let user = user.clone();
        self.users
            .update(move |users| {
                users.insert(key(&user.email), user);
                ((), true)
            })
            .await
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        Ok(self.users.load().await?.into_values().collect())
    }

    async fn get_pending(&self, email: &str) -> Result<Option<PendingRegistration>> {
        Ok(self.pending.load().await?.remove(&key(email)))
    }

    async fn put_pending(&self, pending: &PendingRegistration) -> Result<()> {
        let pending = pending.clone();
        self.pending
            .update(move |entries| {
                entries.insert(key(&pending.email), pending);
                ((), true)
            })
            .await
    }

    async fn remove_pending(&self, email: &str) -> Result<bool> {
        let k = key(email);
        self.pending
            .update(move |entries| {
                let removed = entries.remove(&k).is_some();
                (removed, removed)
            })
            .await
    }

    async fn get_pin(&self, email: &str) -> Result<Option<LoginPin>> {
        Ok(self.pins.load().await?.remove(&key(email)))
    }

    async fn put_pin(&self, pin: &LoginPin) -> Result<()> {
        let pin = pin.clone();
        self.pins
            .update(move |entries| {
                entries.insert(key(&pin.email), pin);
                ((), true)
            })
            .await
    }

    async fn remove_pin(&self, email: &str) -> Result<bool> {
        let k = key(email);
        self.pins
            .update(move |entries| {
                let removed = entries.remove(&k).is_some();
                (removed, removed)
            })
            .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport> {
        let pending_registrations = self
            .pending
            .update(|entries| {
                let before = entries.len();
                entries.retain(|_, p| !p.is_expired(now));
                let removed = before - entries.len();
                (removed, removed > 0)
            })
            .await?;

        let login_pins = self
            .pins
            .update(|entries| {
                let before = entries.len();
                entries.retain(|_, p| !p.is_expired(now));
                let removed = before - entries.len();
                (removed, removed > 0)
            })
            .await?;

        let report = PurgeReport {
            pending_registrations,
            login_pins,
        };
        if report.total() > 0 {
            info!(
                "Purged {} expired pending registrations and {} expired login PINs",
                report.pending_registrations, report.login_pins
            );
        } else {
            debug!("No expired credentials to purge");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(email: &str) -> UserAccount {
        UserAccount {
            id: "u1".to_string(),
            username: "jdoe".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            salt: "salt".to_string(),
            verified: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn pin(email: &str, expiry: DateTime<Utc>) -> LoginPin {
        LoginPin {
            email: email.to_string(),
            user_id: "u1".to_string(),
            pin: "123456".to_string(),
            expiry,
            consumed: false,
            failed_attempts: 0,
        }
    }

    #[tokio::test]
    async fn users_are_keyed_by_lowercase_email() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path());
        store.put_user(&account("JDoe@PD15.org")).await.unwrap();

        assert!(store.get_user("jdoe@pd15.org").await.unwrap().is_some());
        assert!(store.find_user_by_username("jdoe").await.unwrap().is_some());
        assert!(store.find_user_by_id("u1").await.unwrap().is_some());
        assert!(dir.path().join(USERS_FILE).exists());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        JsonCredentialStore::new(dir.path())
            .put_user(&account("a@pd15.org"))
            .await
            .unwrap();

        let reopened = JsonCredentialStore::new(dir.path());
        assert_eq!(reopened.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path());
        let now = Utc::now();
        store.put_pin(&pin("old@pd15.org", now - Duration::seconds(1))).await.unwrap();
        store.put_pin(&pin("new@pd15.org", now + Duration::minutes(5))).await.unwrap();

        let report = store.purge_expired(now).await.unwrap();
        assert_eq!(report.login_pins, 1);
        assert_eq!(report.pending_registrations, 0);
        assert!(store.get_pin("old@pd15.org").await.unwrap().is_none());
        assert!(store.get_pin("new@pd15.org").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path());
        store.put_pin(&pin("a@pd15.org", Utc::now())).await.unwrap();
        assert!(store.remove_pin("a@pd15.org").await.unwrap());
        assert!(!store.remove_pin("a@pd15.org").await.unwrap());
    }
}
