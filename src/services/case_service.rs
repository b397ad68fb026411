use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{AppError, ErrorContext, Result};
use crate::models::{CaseRecord, CaseStatus};
use crate::storage::CaseStore;
use crate::utils::validator::{sanitize_filename, validate_case_number};
use crate::utils::Clock;

/// Aggregate counts over all stored cases
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseStatistics {
    pub total_cases: usize,
    pub in_custody: usize,
    pub on_probation: usize,
    pub veterans: usize,
    pub mental_health: usize,
    pub pending_charges: usize,
    pub case_types: BTreeMap<String, usize>,
    pub attorneys: BTreeMap<String, usize>,
    pub divisions: BTreeMap<String, usize>,
}

impl CaseStatistics {
    pub fn from_cases(cases: &[CaseRecord]) -> Self {
        fn bucket(map: &mut BTreeMap<String, usize>, value: &str, fallback: &str) {
            let key = if value.trim().is_empty() { fallback } else { value.trim() };
            *map.entry(key.to_string()).or_insert(0) += 1;
        }

        let mut stats = Self {
            total_cases: cases.len(),
            ..Self::default()
        };
        for case in cases {
            stats.in_custody += usize::from(case.in_custody);
            stats.on_probation += usize::from(case.on_probation);
            stats.veterans += usize::from(case.veteran);
            stats.mental_health += usize::from(case.mental_health_issues);
            stats.pending_charges += usize::from(case.pending_charges);
            bucket(&mut stats.case_types, &case.case_type, "Unknown");
            bucket(&mut stats.attorneys, &case.attorney, "Unassigned");
            bucket(&mut stats.divisions, &case.division, "Unknown");
        }
        stats
    }
}

/// Short description of one case for listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseSummary {
    pub id: String,
    pub summary: String,
    /// Defendant's age today, when a date of birth is on file
    pub age: Option<u32>,
}

/// Case record operations: validation, timestamps, filters and export
pub struct CaseService {
    store: Arc<dyn CaseStore>,
    clock: Arc<dyn Clock>,
    export_dir: PathBuf,
}

impl CaseService {
    pub fn new(store: Arc<dyn CaseStore>, clock: Arc<dyn Clock>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            clock,
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn check_required(case: &CaseRecord) -> Result<()> {
        let missing = case.missing_required_fields();
        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if !validate_case_number(&case.case_number) {
            debug!("Case number {:?} is not in YYYY-XX-NNNNNN form", case.case_number);
        }
        Ok(())
    }

    /// Store a new case with a fresh id and timestamps
    #[instrument(skip(self, case), fields(case_number = %case.case_number))]
    pub async fn create(&self, mut case: CaseRecord) -> Result<CaseRecord> {
        Self::check_required(&case)?;

        let now = self.clock.now();
        case.id = uuid::Uuid::new_v4().to_string();
        case.created_at = Some(now);
        case.updated_at = Some(now);
        self.store.insert(&case).await?;

        info!("Created case {}", case.id);
        Ok(case)
    }

    /// Replace a case's fields, keeping its id and creation time
    #[instrument(skip(self, case))]
    pub async fn update(&self, id: &str, mut case: CaseRecord) -> Result<CaseRecord> {
        Self::check_required(&case)?;

        let existing = self.get(id).await?;
        case.id = existing.id;
        case.created_at = existing.created_at;
        case.updated_at = Some(self.clock.now());

        if !self.store.update(&case).await? {
            return Err(AppError::not_found(format!("case {}", id)));
        }
        info!("Updated case {}", id);
        Ok(case)
    }

    pub async fn get(&self, id: &str) -> Result<CaseRecord> {
        self.store
            .get(id)
            .await?
            .with_context(|| format!("case {}", id))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(AppError::not_found(format!("case {}", id)));
        }
        info!("Deleted case {}", id);
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<CaseRecord>> {
        Ok(self.store.list().await?)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<CaseRecord>> {
        Ok(self.store.search(term).await?)
    }

    pub async fn by_status(&self, status: CaseStatus) -> Result<Vec<CaseRecord>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|c| c.has_status(status))
            .collect())
    }

    /// Cases with a court date in `start..=end`, earliest first
    pub async fn by_court_date(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<CaseRecord>> {
        if start > end {
            return Err(AppError::validation("start date is after end date"));
        }
        let mut cases: Vec<CaseRecord> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|c| matches!(c.court_date, Some(d) if d >= start && d <= end))
            .collect();
        cases.sort_by_key(|c| c.court_date);
        Ok(cases)
    }

    pub async fn summary(&self, id: &str) -> Result<CaseSummary> {
        let case = self.get(id).await?;
        let today = self.clock.now().date_naive();
        Ok(CaseSummary {
            summary: case.summary(),
            age: case.age_on(today),
            id: case.id,
        })
    }

    pub async fn statistics(&self) -> Result<CaseStatistics> {
        let cases = self.store.list().await?;
        Ok(CaseStatistics::from_cases(&cases))
    }

    /// Write every case to a CSV file, returning the number of rows
    #[instrument(skip(self))]
    pub async fn export_csv(&self, path: &Path) -> Result<usize> {
        let cases = self.store.list().await?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path_buf = path.to_path_buf();
        let rows = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut writer = csv::Writer::from_path(&path_buf)?;
            for case in &cases {
                writer.serialize(case)?;
            }
            writer.flush()?;
            Ok(cases.len())
        })
        .await
        .map_err(|e| AppError::internal(format!("CSV export task failed: {}", e)))??;

        info!("Exported {} cases to {}", rows, path.display());
        Ok(rows)
    }

    /// Export every case to `cases_export_<timestamp>.csv` in the export directory
    pub async fn export_csv_snapshot(&self) -> Result<(PathBuf, usize)> {
        let file_name = format!(
            "cases_export_{}.csv",
            self.clock.now().format("%Y%m%d_%H%M%S")
        );
        let path = self.export_dir.join(file_name);
        let rows = self.export_csv(&path).await?;
        Ok((path, rows))
    }

    /// Write one pretty-printed JSON file per case into `dir`
    #[instrument(skip(self))]
    pub async fn export_json(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let cases = self.store.list().await?;
        tokio::fs::create_dir_all(dir).await?;

        let mut written = Vec::with_capacity(cases.len());
        for case in &cases {
            written.push(write_case_json(dir, case).await?);
        }
        info!("Exported {} case files to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Export a single case into the configured export directory
    pub async fn export_case(&self, id: &str) -> Result<PathBuf> {
        let case = self.get(id).await?;
        tokio::fs::create_dir_all(&self.export_dir).await?;
        write_case_json(&self.export_dir, &case).await
    }
}

/// File name for a case export: case number, defendant name and case id, sanitized.
/// The id keeps two sheets with the same number and name apart.
pub fn export_file_name(case: &CaseRecord) -> String {
    let stem = sanitize_filename(&format!(
        "{}_{}_{}",
        case.case_number.trim(),
        case.last_name.trim(),
        case.first_name.trim()
    ))
    .replace(' ', "_");
    let id = sanitize_filename(&case.id);

    match (stem.is_empty(), id.is_empty()) {
        (true, _) => format!("{}.json", id),
        (false, true) => format!("{}.json", stem),
        (false, false) => format!("{}_{}.json", stem, id),
    }
}

async fn write_case_json(dir: &Path, case: &CaseRecord) -> Result<PathBuf> {
    let path = dir.join(export_file_name(case));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!("Replacing earlier export of case {} at {}", case.id, path.display());
    }
    let bytes = serde_json::to_vec_pretty(case)?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
