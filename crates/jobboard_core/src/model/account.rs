//! Account security records and board-wide admin settings.

use crate::model::user::UserId;
use crate::model::validation::{optional_text, require_text, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub succeeded: bool,
    pub failure_reason: Option<String>,
    pub created_at: i64,
}

impl LoginAttempt {
    pub fn succeeded(user_id: UserId) -> Self {
        Self::with_outcome(user_id, true, None)
    }

    pub fn failed(user_id: UserId, reason: impl Into<String>) -> Self {
        Self::with_outcome(user_id, false, Some(reason.into()))
    }

    fn with_outcome(user_id: UserId, succeeded: bool, failure_reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            ip_address: None,
            user_agent: None,
            succeeded,
            failure_reason,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        optional_text("ip_address", self.ip_address.as_deref(), 64)?;
        optional_text("user_agent", self.user_agent.as_deref(), 512)?;
        optional_text("failure_reason", self.failure_reason.as_deref(), 128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_by: Option<UserId>,
    pub updated_at: i64,
}

/// Validates a setting key: dotted lowercase identifiers such as
/// `jobs.default_ttl_days`.
pub fn validate_setting_key(key: &str) -> ValidationResult {
    require_text("key", key, 128)?;
    let well_formed = key
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    if !well_formed {
        return Err(crate::model::validation::ValidationError::Disallowed("key"));
    }
    Ok(())
}
