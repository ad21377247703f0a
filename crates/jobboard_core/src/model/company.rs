//! Company profile model and its satellite records.
//!
//! # Invariants
//! - `slug` is unique across companies and derived from the name.
//! - `follower_count`, `job_count`, `review_count` and `average_rating` are
//!   denormalized and maintained by repository transactions only.
//! - At most one location per company is flagged as headquarters.

use crate::model::user::UserId;
use crate::model::validation::{
    optional_text, optional_url, require_text, validate_url, ValidationResult, MAX_LONG_TEXT,
    MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CompanyId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// Free-form size bucket such as `11-50`.
    pub company_size: Option<String>,
    pub logo_url: Option<String>,
    pub is_verified: bool,
    pub follower_count: i64,
    pub job_count: i64,
    pub review_count: i64,
    pub average_rating: f64,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Company {
    /// Creates an unverified company; the slug is assigned on insert.
    pub fn new(owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            slug: String::new(),
            description: None,
            website: None,
            industry: None,
            company_size: None,
            logo_url: None,
            is_verified: false,
            follower_count: 0,
            job_count: 0,
            review_count: 0,
            average_rating: 0.0,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, MAX_SHORT_TEXT)?;
        optional_text("description", self.description.as_deref(), MAX_LONG_TEXT)?;
        optional_url("website", self.website.as_deref())?;
        optional_text("industry", self.industry.as_deref(), MAX_SHORT_TEXT)?;
        optional_text("company_size", self.company_size.as_deref(), 32)?;
        optional_url("logo_url", self.logo_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLocation {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub label: String,
    pub address: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub country: String,
    pub postal_code: Option<String>,
    pub is_headquarters: bool,
    pub created_at: i64,
}

impl CompanyLocation {
    pub fn new(
        company_id: CompanyId,
        label: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            label: label.into(),
            address: None,
            city: city.into(),
            region: None,
            country: country.into(),
            postal_code: None,
            is_headquarters: false,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("label", &self.label, MAX_SHORT_TEXT)?;
        optional_text("address", self.address.as_deref(), MAX_SHORT_TEXT)?;
        require_text("city", &self.city, MAX_SHORT_TEXT)?;
        optional_text("region", self.region.as_deref(), MAX_SHORT_TEXT)?;
        require_text("country", &self.country, MAX_SHORT_TEXT)?;
        optional_text("postal_code", self.postal_code.as_deref(), 32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    /// Grouping such as `health` or `time_off`.
    pub category: Option<String>,
    pub created_at: i64,
}

impl Benefit {
    pub fn new(company_id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into(),
            description: None,
            category: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("name", &self.name, MAX_SHORT_TEXT)?;
        optional_text("description", self.description.as_deref(), MAX_LONG_TEXT)?;
        optional_text("category", self.category.as_deref(), 64)
    }
}

text_enum! {
    pub enum MediaKind {
        Image => "image",
        Video => "video",
    }
}

/// Gallery entry shown on the company page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMedia {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub kind: MediaKind,
    pub url: String,
    pub caption: Option<String>,
    pub sort_order: i64,
    pub created_at: i64,
}

impl CompanyMedia {
    pub fn new(company_id: CompanyId, kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            kind,
            url: url.into(),
            caption: None,
            sort_order: 0,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_url("url", &self.url)?;
        optional_text("caption", self.caption.as_deref(), MAX_SHORT_TEXT)
    }
}

/// A user following a company, joined with the user's display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFollower {
    pub user_id: UserId,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub followed_at: i64,
}

/// A company followed by a user, joined with the company's display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedCompany {
    pub company_id: CompanyId,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub followed_at: i64,
}
