//! Company review model.
//!
//! # Invariants
//! - `rating` is within 1..=5.
//! - One review per author per company.
//! - Only approved reviews count toward the company's rating.

use crate::model::company::CompanyId;
use crate::model::user::UserId;
use crate::model::validation::{
    check_range, optional_text, require_text, ValidationResult, MAX_LONG_TEXT, MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub author_id: UserId,
    pub rating: u8,
    pub title: String,
    pub body: String,
    pub pros: Option<String>,
    pub cons: Option<String>,
    /// Hide the author's identity when rendering.
    pub is_anonymous: bool,
    pub is_approved: bool,
    pub helpful_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Review {
    /// Creates a pending (unapproved) review.
    pub fn new(
        company_id: CompanyId,
        author_id: UserId,
        rating: u8,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            author_id,
            rating,
            title: title.into(),
            body: body.into(),
            pros: None,
            cons: None,
            is_anonymous: false,
            is_approved: false,
            helpful_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        check_range(
            "rating",
            i64::from(self.rating),
            i64::from(MIN_RATING),
            i64::from(MAX_RATING),
        )?;
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        require_text("body", &self.body, MAX_LONG_TEXT)?;
        optional_text("pros", self.pros.as_deref(), MAX_LONG_TEXT)?;
        optional_text("cons", self.cons.as_deref(), MAX_LONG_TEXT)
    }
}

text_enum! {
    /// Ordering for review listings.
    pub enum ReviewSort {
        Newest => "newest",
        HighestRated => "highest_rated",
        LowestRated => "lowest_rated",
        MostHelpful => "most_helpful",
    }
}

impl Default for ReviewSort {
    fn default() -> Self {
        Self::Newest
    }
}

/// Aggregate over a company's approved reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub review_count: i64,
    /// `0.0` when there are no approved reviews.
    pub average_rating: f64,
    /// `histogram[n - 1]` counts reviews rated `n`.
    pub histogram: [i64; 5],
}
