//! Candidate profile records: resumes, skills, education, experience,
//! portfolio and certifications.
//!
//! # Invariants
//! - Each user has at most one primary resume; a user with resumes has one.
//! - Skill names are unique per user, compared case-insensitively.
//! - Month ranges use `YYYY-MM`; an absent end month means "current".

use crate::model::user::UserId;
use crate::model::validation::{
    check_range, optional_text, optional_url, require_text, validate_month_range, validate_url,
    ValidationResult, MAX_LONG_TEXT, MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_RESUME_BYTES: i64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    /// Location in blob storage; upload happens elsewhere.
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub is_primary: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Resume {
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        file_url: impl Into<String>,
        file_name: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            file_url: file_url.into(),
            file_name: file_name.into(),
            file_size,
            content_type: content_type.into(),
            is_primary: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        validate_url("file_url", &self.file_url)?;
        require_text("file_name", &self.file_name, 255)?;
        check_range("file_size", self.file_size, 0, MAX_RESUME_BYTES)?;
        require_text("content_type", &self.content_type, 128)
    }
}

text_enum! {
    pub enum SkillLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub level: SkillLevel,
    pub years: Option<i64>,
    pub created_at: i64,
}

impl Skill {
    pub fn new(user_id: UserId, name: &str, level: SkillLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            level,
            years: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, 64)?;
        match self.years {
            Some(years) => check_range("years", years, 0, 70),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub id: Uuid,
    pub user_id: UserId,
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_month: String,
    pub end_month: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

impl Education {
    pub fn new(
        user_id: UserId,
        institution: impl Into<String>,
        start_month: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            institution: institution.into(),
            degree: None,
            field_of_study: None,
            start_month: start_month.into(),
            end_month: None,
            description: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("institution", &self.institution, MAX_SHORT_TEXT)?;
        optional_text("degree", self.degree.as_deref(), MAX_SHORT_TEXT)?;
        optional_text("field_of_study", self.field_of_study.as_deref(), MAX_SHORT_TEXT)?;
        optional_text("description", self.description.as_deref(), MAX_LONG_TEXT)?;
        validate_month_range(
            "start_month",
            &self.start_month,
            "end_month",
            self.end_month.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub id: Uuid,
    pub user_id: UserId,
    pub company_name: String,
    pub title: String,
    pub location: Option<String>,
    pub start_month: String,
    pub end_month: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

impl WorkExperience {
    pub fn new(
        user_id: UserId,
        company_name: impl Into<String>,
        title: impl Into<String>,
        start_month: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            company_name: company_name.into(),
            title: title.into(),
            location: None,
            start_month: start_month.into(),
            end_month: None,
            description: None,
            created_at: 0,
        }
    }

    pub fn is_current(&self) -> bool {
        self.end_month.is_none()
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("company_name", &self.company_name, MAX_SHORT_TEXT)?;
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        optional_text("location", self.location.as_deref(), MAX_SHORT_TEXT)?;
        optional_text("description", self.description.as_deref(), MAX_LONG_TEXT)?;
        validate_month_range(
            "start_month",
            &self.start_month,
            "end_month",
            self.end_month.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
}

impl PortfolioItem {
    pub fn new(user_id: UserId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            url: url.into(),
            description: None,
            image_url: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        validate_url("url", &self.url)?;
        optional_text("description", self.description.as_deref(), MAX_LONG_TEXT)?;
        optional_url("image_url", self.image_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub id: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub issuer: String,
    pub issued_month: String,
    pub expires_month: Option<String>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub created_at: i64,
}

impl Certification {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        issuer: impl Into<String>,
        issued_month: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            issuer: issuer.into(),
            issued_month: issued_month.into(),
            expires_month: None,
            credential_id: None,
            credential_url: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, MAX_SHORT_TEXT)?;
        require_text("issuer", &self.issuer, MAX_SHORT_TEXT)?;
        optional_text("credential_id", self.credential_id.as_deref(), MAX_SHORT_TEXT)?;
        optional_url("credential_url", self.credential_url.as_deref())?;
        validate_month_range(
            "issued_month",
            &self.issued_month,
            "expires_month",
            self.expires_month.as_deref(),
        )
    }
}

/// Candidate matched by a skill search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkilledCandidate {
    pub user_id: UserId,
    pub full_name: String,
    pub headline: Option<String>,
    pub skill_level: SkillLevel,
    pub years: Option<i64>,
}
