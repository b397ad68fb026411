use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::models::CaseRecord;
use crate::storage::json_file::JsonFile;
use crate::storage::{CaseStore, Result, StorageError};

pub const CASES_FILE: &str = "cases.json";

/// Case store backed by a single JSON array, kept in insertion order
#[derive(Debug)]
pub struct JsonCaseStore {
    file: JsonFile<Vec<CaseRecord>>,
}

impl JsonCaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }
}

#[async_trait]
impl CaseStore for JsonCaseStore {
    async fn insert(&self, case: &CaseRecord) -> Result<()> {
        let case = case.clone();
        let inserted = self
            .file
            .update(move |cases| {
                if cases.iter().any(|c| c.id == case.id) {
                    (false, false)
                } else {
                    cases.push(case);
                    (true, true)
                }
            })
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(StorageError::ValidationError(
                "a case with this id already exists".to_string(),
            ))
        }
    }

    async fn get(&self, id: &str) -> Result<Option<CaseRecord>> {
        Ok(self.file.load().await?.into_iter().find(|c| c.id == id))
    }

    async fn update(&self, case: &CaseRecord) -> Result<bool> {
        let case = case.clone();
        self.file
            .update(move |cases| match cases.iter_mut().find(|c| c.id == case.id) {
                Some(slot) => {
                    *slot = case;
                    (true, true)
                }
                None => (false, false),
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.file
            .update(move |cases| {
                let before = cases.len();
                cases.retain(|c| c.id != id);
                let removed = cases.len() != before;
                (removed, removed)
            })
            .await
    }

    async fn list(&self) -> Result<Vec<CaseRecord>> {
        self.file.load().await
    }

    async fn search(&self, term: &str) -> Result<Vec<CaseRecord>> {
        let found: Vec<CaseRecord> = self
            .file
            .load()
            .await?
            .into_iter()
            .filter(|c| c.matches(term))
            .collect();
        debug!("Case search matched {} records", found.len());
        Ok(found)
    }
}
