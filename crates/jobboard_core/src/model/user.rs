//! User account model.
//!
//! # Invariants
//! - `email` is stored normalized (trimmed, lowercase) and is unique.
//! - `password_hash` is opaque; hashing happens above this layer.
//! - `is_deleted` tombstones hide the account from default reads.

use crate::model::validation::{
    normalize_email, optional_text, optional_url, require_text, validate_email, ValidationResult,
    MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

text_enum! {
    /// What the account can do on the board.
    pub enum UserRole {
        Candidate => "candidate",
        Employer => "employer",
        Admin => "admin",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub headline: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    /// Epoch ms of the last successful login.
    pub last_login_at: Option<i64>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an active, unverified account with a fresh id.
    pub fn new(
        email: &str,
        password_hash: impl Into<String>,
        full_name: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: password_hash.into(),
            full_name: full_name.into(),
            role,
            headline: None,
            avatar_url: None,
            is_active: true,
            is_verified: false,
            last_login_at: None,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_email(&self.email)?;
        require_text("password_hash", &self.password_hash, 512)?;
        require_text("full_name", &self.full_name, MAX_SHORT_TEXT)?;
        optional_text("headline", self.headline.as_deref(), MAX_SHORT_TEXT)?;
        optional_url("avatar_url", self.avatar_url.as_deref())
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub full_name: String,
    pub headline: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfileUpdate {
    pub fn validate(&self) -> ValidationResult {
        require_text("full_name", &self.full_name, MAX_SHORT_TEXT)?;
        optional_text("headline", self.headline.as_deref(), MAX_SHORT_TEXT)?;
        optional_url("avatar_url", self.avatar_url.as_deref())
    }
}
