use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::models::{CaseRecord, LoginPin, PendingRegistration, UserAccount};
use crate::storage::{CaseStore, CredentialStore, PurgeReport, Result, StorageError};

// In-memory storage data structure (using Mutex for thread safety)
#[derive(Default)]
struct StorageData {
    users: HashMap<String, UserAccount>,           // email -> account
    pending: HashMap<String, PendingRegistration>, // email -> pending registration
    pins: HashMap<String, LoginPin>,               // email -> login PIN
    cases: Vec<CaseRecord>,                        // insertion order
}

/// In-memory storage implementation (useful for testing)
#[derive(Default)]
pub struct MemoryStorage {
    data: TokioMutex<StorageData>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl CredentialStore for MemoryStorage {
    async fn get_user(&self, email: &str) -> Result<Option<UserAccount>> {
        let data = self.data.lock().await;
        Ok(data.users.get(&key(email)).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let data = self.data.lock().await;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserAccount>> {
        let data = self.data.lock().await;
        Ok(data.users.values().find(|u| u.id == id).cloned())
    }

    async fn put_user(&self, user: &UserAccount) -> Result<()> {
        let mut data = self.data.lock().await;
        data.users.insert(key(&user.email), user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let data = self.data.lock().await;
        Ok(data.users.values().cloned().collect())
    }

    async fn get_pending(&self, email: &str) -> Result<Option<PendingRegistration>> {
        let data = self.data.lock().await;
        Ok(data.pending.get(&key(email)).cloned())
    }

    async fn put_pending(&self, pending: &PendingRegistration) -> Result<()> {
        let mut data = self.data.lock().await;
        data.pending.insert(key(&pending.email), pending.clone());
        Ok(())
    }

    async fn remove_pending(&self, email: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        Ok(data.pending.remove(&key(email)).is_some())
    }

    async fn get_pin(&self, email: &str) -> Result<Option<LoginPin>> {
        let data = self.data.lock().await;
        Ok(data.pins.get(&key(email)).cloned())
    }

    async fn put_pin(&self, pin: &LoginPin) -> Result<()> {
        let mut data = self.data.lock().await;
        data.pins.insert(key(&pin.email), pin.clone());
        Ok(())
    }

    async fn remove_pin(&self, email: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        Ok(data.pins.remove(&key(email)).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport> {
        let mut data = self.data.lock().await;
        let pending_before = data.pending.len();
        data.pending.retain(|_, p| !p.is_expired(now));
        let pins_before = data.pins.len();
        data.pins.retain(|_, p| !p.is_expired(now));

        let report = PurgeReport {
            pending_registrations: pending_before - data.pending.len(),
            login_pins: pins_before - data.pins.len(),
        };
        debug!("Memory purge removed {} entries", report.total());
        Ok(report)
    }
}

#[async_trait]
impl CaseStore for MemoryStorage {
    async fn insert(&self, case: &CaseRecord) -> Result<()> {
        let mut data = self.data.lock().await;
        if data.cases.iter().any(|c| c.id == case.id) {
            return Err(StorageError::ValidationError(
                "a case with this id already exists".to_string(),
            ));
        }
        data.cases.push(case.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<CaseRecord>> {
        let data = self.data.lock().await;
        Ok(data.cases.iter().find(|c| c.id == id).cloned())
    }

    async fn update(&self, case: &CaseRecord) -> Result<bool> {
        let mut data = self.data.lock().await;
        match data.cases.iter_mut().find(|c| c.id == case.id) {
            Some(slot) => {
                *slot = case.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        let before = data.cases.len();
        data.cases.retain(|c| c.id != id);
        Ok(data.cases.len() != before)
    }

    async fn list(&self) -> Result<Vec<CaseRecord>> {
        let data = self.data.lock().await;
        Ok(data.cases.clone())
    }

    async fn search(&self, term: &str) -> Result<Vec<CaseRecord>> {
        let data = self.data.lock().await;
        Ok(data.cases.iter().filter(|c| c.matches(term)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn purge_counts_both_collections() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage
            .put_pending(&PendingRegistration {
                id: "p".into(),
                username: "u".into(),
                email: "u@pd15.org".into(),
                password_hash: "h".into(),
                salt: "s".into(),
                verification_code: "123456".into(),
                code_expiry: now - Duration::minutes(1),
                created_at: now - Duration::minutes(11),
                failed_attempts: 0,
            })
            .await
            .unwrap();
        storage
            .put_pin(&LoginPin {
                email: "v@pd15.org".into(),
                user_id: "v".into(),
                pin: "654321".into(),
                expiry: now - Duration::seconds(1),
                consumed: false,
                failed_attempts: 0,
            })
            .await
            .unwrap();

        let report = storage.purge_expired(now).await.unwrap();
        assert_eq!(report, PurgeReport { pending_registrations: 1, login_pins: 1 });
    }

    #[tokio::test]
    async fn cases_keep_insertion_order() {
        let storage = MemoryStorage::new();
        for id in ["b", "a", "c"] {
            storage
                .insert(&CaseRecord { id: id.into(), ..Default::default() })
                .await
                .unwrap();
        }
        let ids: Vec<_> = CaseStore::list(&storage).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
