//! Notifications, blog posts, LinkedIn connections and newsletter
//! subscriptions.

use crate::model::user::UserId;
use crate::model::validation::{
    normalize_email, optional_text, optional_url, require_text, validate_email, ValidationError,
    ValidationResult, MAX_LONG_TEXT, MAX_SHORT_TEXT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    /// Machine-readable category, e.g. `application_status`.
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    /// In-app path the notification points to.
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

impl Notification {
    pub fn new(user_id: UserId, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.into(),
            title: title.into(),
            body: None,
            link: None,
            is_read: false,
            read_at: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("kind", &self.kind, 64)?;
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        optional_text("body", self.body.as_deref(), MAX_LONG_TEXT)?;
        optional_text("link", self.link.as_deref(), 2048)
    }
}

text_enum! {
    pub enum BlogStatus {
        Draft => "draft",
        Published => "published",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub author_id: UserId,
    pub title: String,
    /// Assigned on insert from the title.
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub cover_image_url: Option<String>,
    pub status: BlogStatus,
    pub view_count: i64,
    pub published_at: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlogPost {
    pub fn new(author_id: UserId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: title.into(),
            slug: String::new(),
            excerpt: None,
            body: body.into(),
            cover_image_url: None,
            status: BlogStatus::Draft,
            view_count: 0,
            published_at: None,
            tags: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, MAX_SHORT_TEXT)?;
        optional_text("excerpt", self.excerpt.as_deref(), 500)?;
        require_text("body", &self.body, 200_000)?;
        optional_url("cover_image_url", self.cover_image_url.as_deref())
    }
}

/// OAuth link between a board account and a LinkedIn member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInConnection {
    pub user_id: UserId,
    pub member_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: i64,
    pub profile_url: Option<String>,
    pub connected_at: i64,
    pub last_synced_at: Option<i64>,
}

impl LinkedInConnection {
    pub fn new(
        user_id: UserId,
        member_id: impl Into<String>,
        access_token: impl Into<String>,
        token_expires_at: i64,
    ) -> Self {
        Self {
            user_id,
            member_id: member_id.into(),
            access_token: access_token.into(),
            refresh_token: None,
            token_expires_at,
            profile_url: None,
            connected_at: 0,
            last_synced_at: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("member_id", &self.member_id, 128)?;
        require_text("access_token", &self.access_token, 4096)?;
        optional_text("refresh_token", self.refresh_token.as_deref(), 4096)?;
        optional_url("profile_url", self.profile_url.as_deref())
    }
}

text_enum! {
    pub enum SubscriberStatus {
        /// Awaiting double opt-in confirmation.
        Pending => "pending",
        Subscribed => "subscribed",
        Unsubscribed => "unsubscribed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterSubscriber {
    pub id: Uuid,
    pub email: String,
    pub user_id: Option<UserId>,
    pub status: SubscriberStatus,
    /// Confirmation and unsubscribe token.
    #[serde(skip_serializing)]
    pub token: String,
    pub subscribed_at: Option<i64>,
    pub unsubscribed_at: Option<i64>,
    pub created_at: i64,
}

/// Normalizes and validates a subscription address.
pub fn subscription_email(email: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email);
    validate_email(&email)?;
    Ok(email)
}
