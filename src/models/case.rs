use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Case opening sheet record.
///
/// Every field except the identifier and timestamps is optional on the wire so
/// partially filled sheets can be saved and completed later.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaseRecord {
    pub id: String,

    // Defendant
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub dob: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_home: String,
    pub phone_cell: String,
    pub phone_other: String,

    // Status flags
    pub in_custody: bool,
    pub on_probation: bool,
    pub veteran: bool,
    pub mental_health_issues: bool,
    pub physical_disabilities: bool,
    pub pending_charges: bool,
    pub immigration_status: String,

    // Case
    pub case_number: String,
    pub case_type: String,
    pub division: String,
    pub charges: String,
    pub asa: String,
    pub attorney: String,
    pub score: String,
    pub offer: String,
    pub page_number: String,
    pub appointed_date: Option<NaiveDate>,
    pub applied_date: Option<NaiveDate>,

    // Court
    pub court_date: Option<NaiveDate>,
    pub court_time: String,
    pub cal_call: bool,
    pub status_check: bool,
    pub jury_trial: bool,
    pub non_jury_trial: bool,
    pub sentencing: bool,
    pub reset_reason: String,
    pub other_court_action: String,
    pub disposition_sentence: String,
    pub case_dispo: String,

    // Notes
    pub defendant_comments: String,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Status filters understood by the case search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    InCustody,
    OnProbation,
    Veteran,
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "in custody" => Ok(CaseStatus::InCustody),
            "on probation" => Ok(CaseStatus::OnProbation),
            "veteran" => Ok(CaseStatus::Veteran),
            other => Err(format!("Unknown case status: {}", other)),
        }
    }
}

impl CaseRecord {
    /// Fields covered by the free-text search, in match order
    pub fn searchable_fields(&self) -> [&str; 6] {
        [
            &self.first_name,
            &self.last_name,
            &self.middle_name,
            &self.case_number,
            &self.charges,
            &self.asa,
        ]
    }

    /// Case-insensitive substring match over the searchable fields
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.searchable_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn has_status(&self, status: CaseStatus) -> bool {
        match status {
            CaseStatus::InCustody => self.in_custody,
            CaseStatus::OnProbation => self.on_probation,
            CaseStatus::Veteran => self.veteran,
        }
    }

    /// Display names of required fields that are still empty
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.last_name.trim().is_empty() {
            missing.push("Last Name");
        }
        if self.first_name.trim().is_empty() {
            missing.push("First Name");
        }
        if self.case_number.trim().is_empty() {
            missing.push("Case Number");
        }
        missing
    }

    /// Defendant's age in whole years on `today`; `None` without a usable date of birth
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.dob?;
        if dob > today {
            return None;
        }
        let had_birthday = (today.month(), today.day()) >= (dob.month(), dob.day());
        let years = today.year() - dob.year() - i32::from(!had_birthday);
        u32::try_from(years).ok()
    }

    /// One-line summary, e.g. for export listings
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let name = format!("{} {}", self.first_name, self.last_name);
        if !name.trim().is_empty() {
            parts.push(format!("Defendant: {}", name.trim()));
        }
        if !self.case_number.is_empty() {
            parts.push(format!("Case #: {}", self.case_number));
        }
        if !self.charges.is_empty() {
            let charges = if self.charges.chars().count() > 50 {
                format!("{}...", self.charges.chars().take(50).collect::<String>())
            } else {
                self.charges.clone()
            };
            parts.push(format!("Charges: {}", charges));
        }
        if let Some(date) = self.court_date {
            parts.push(format!("Next: {}", date.format("%m/%d/%Y")));
        }

        parts.join(" | ")
    }
}
