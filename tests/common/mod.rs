// Common test helpers for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use case_sheet_server::config::settings::Config;
use case_sheet_server::server::app_state::AppState;
use case_sheet_server::services::{AuthService, CaseService, MemoryMailer};
use case_sheet_server::storage::{JsonCaseStore, JsonCredentialStore};
use case_sheet_server::utils::ManualClock;
use case_sheet_server::Stores;
use chrono::{TimeZone, Utc};

pub const EMAIL: &str = "jdoe@pd15.org";
pub const PASSWORD: &str = "Secret123!";

/// Services wired to JSON stores in a temp dir, an in-memory mailer and a manual clock
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: Config,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::for_testing(dir.path());
        let mailer = Arc::new(MemoryMailer::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap(),
        ));
        let state = AppState::new(
            config.clone(),
            json_stores(dir.path()),
            mailer.clone(),
            clock.clone(),
        );

        Self {
            dir,
            config,
            mailer,
            clock,
            state,
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.state.auth
    }

    pub fn cases(&self) -> &CaseService {
        &self.state.cases
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Register and verify `EMAIL` with `PASSWORD`
    pub async fn verified_account(&self) {
        self.auth()
            .register("jdoe", EMAIL, PASSWORD)
            .await
            .expect("register");
        let code = self.mailer.last_code_for(EMAIL).expect("verification email");
        self.auth().verify(EMAIL, &code).await.expect("verify");
    }

    /// Bearer token for a freshly verified `EMAIL`
    pub async fn bearer_token(&self) -> String {
        self.verified_account().await;
        self.auth()
            .login(EMAIL, PASSWORD)
            .await
            .expect("login")
            .token
            .token
    }
}

pub fn json_stores(data_dir: &Path) -> Stores {
    Stores {
        credentials: Arc::new(JsonCredentialStore::new(data_dir)),
        cases: Arc::new(JsonCaseStore::new(data_dir.join("cases.json"))),
    }
}
