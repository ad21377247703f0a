//! Job posting model.
//!
//! # Invariants
//! - `salary_min <= salary_max` when both are set; salaries are non-negative.
//! - `published_at` is stamped the first time a job opens and never moves.
//! - `application_count` and `view_count` are maintained by the repository.

use crate::model::company::CompanyId;
use crate::model::user::UserId;
use crate::model::validation::{
    optional_text, require_text, ValidationError, ValidationResult, MAX_LONG_TEXT, MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

text_enum! {
    pub enum EmploymentType {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Internship => "internship",
        Temporary => "temporary",
    }
}

text_enum! {
    pub enum Workplace {
        Onsite => "onsite",
        Remote => "remote",
        Hybrid => "hybrid",
    }
}

text_enum! {
    pub enum ExperienceLevel {
        Entry => "entry",
        Mid => "mid",
        Senior => "senior",
        Lead => "lead",
        Executive => "executive",
    }
}

text_enum! {
    pub enum JobStatus {
        /// Not visible to candidates.
        Draft => "draft",
        /// Visible and accepting applications.
        Open => "open",
        /// Visible in history, no new applications.
        Closed => "closed",
        Archived => "archived",
    }
}

text_enum! {
    /// Ordering for job search results.
    pub enum JobSort {
        Newest => "newest",
        /// Highest advertised salary first.
        Salary => "salary",
        MostApplied => "most_applied",
    }
}

impl Default for JobSort {
    fn default() -> Self {
        Self::Newest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub company_id: CompanyId,
    pub posted_by: UserId,
    pub location_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub employment_type: EmploymentType,
    pub workplace: Workplace,
    pub experience_level: ExperienceLevel,
    pub city: Option<String>,
    pub country: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    /// ISO 4217 code.
    pub salary_currency: Option<String>,
    pub status: JobStatus,
    pub view_count: i64,
    pub application_count: i64,
    pub published_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    /// Creates a full-time, on-site, mid-level draft.
    pub fn new(
        company_id: CompanyId,
        posted_by: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            posted_by,
            location_id: None,
            title: title.into(),
            description: description.into(),
            employment_type: EmploymentType::FullTime,
            workplace: Workplace::Onsite,
            experience_level: ExperienceLevel::Mid,
            city: None,
            country: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            status: JobStatus::Draft,
            view_count: 0,
            application_count: 0,
            published_at: None,
            expires_at: None,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        require_text("description", &self.description, MAX_LONG_TEXT)?;
        optional_text("city", self.city.as_deref(), MAX_SHORT_TEXT)?;
        optional_text("country", self.country.as_deref(), MAX_SHORT_TEXT)?;

        for (field, value) in [("salary_min", self.salary_min), ("salary_max", self.salary_max)] {
            if matches!(value, Some(amount) if amount < 0) {
                return Err(ValidationError::OutOfRange {
                    field,
                    min: 0,
                    max: i64::MAX,
                });
            }
        }
        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if max < min {
                return Err(ValidationError::InvertedRange {
                    start: "salary_min",
                    end: "salary_max",
                });
            }
        }
        if let Some(currency) = self.salary_currency.as_deref() {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ValidationError::Disallowed("salary_currency"));
            }
        }
        Ok(())
    }
}

/// Job joined with the display fields of its company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub job: Job,
    pub company_name: String,
    pub company_slug: String,
    pub company_logo_url: Option<String>,
    pub company_is_verified: bool,
}

/// A listing bookmarked by a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedJob {
    pub listing: JobListing,
    pub saved_at: i64,
}
