//! Company team membership and invitation model.
//!
//! # Invariants
//! - Exactly one `owner` member per company, matching `companies.owner_id`.
//! - Invitations never grant `owner`; ownership moves only by transfer.

use crate::model::company::CompanyId;
use crate::model::user::UserId;
use crate::model::validation::{
    normalize_email, validate_email, ValidationError, ValidationResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum TeamRole {
        Owner => "owner",
        Admin => "admin",
        Recruiter => "recruiter",
        Member => "member",
    }
}

impl TeamRole {
    /// Whether members with this role may post jobs and manage applications.
    pub fn can_manage_hiring(self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Recruiter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub role: TeamRole,
    pub joined_at: i64,
    pub full_name: String,
    pub email: String,
}

text_enum! {
    pub enum InvitationStatus {
        Pending => "pending",
        Accepted => "accepted",
        Revoked => "revoked",
        Expired => "expired",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub email: String,
    pub role: TeamRole,
    /// Opaque acceptance token delivered out of band.
    #[serde(skip_serializing)]
    pub token: String,
    pub invited_by: UserId,
    pub status: InvitationStatus,
    pub expires_at: i64,
    pub responded_at: Option<i64>,
    pub created_at: i64,
}

/// Input for creating an invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvitation {
    pub company_id: CompanyId,
    pub email: String,
    pub role: TeamRole,
    pub invited_by: UserId,
    /// Lifetime from creation in milliseconds.
    pub ttl_ms: i64,
}

impl NewInvitation {
    pub fn new(company_id: CompanyId, email: &str, role: TeamRole, invited_by: UserId) -> Self {
        Self {
            company_id,
            email: normalize_email(email),
            role,
            invited_by,
            ttl_ms: 7 * 24 * 60 * 60 * 1000,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_email(&self.email)?;
        if self.role == TeamRole::Owner {
            return Err(ValidationError::Disallowed("role"));
        }
        if self.ttl_ms <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "ttl_ms",
                min: 1,
                max: i64::MAX,
            });
        }
        Ok(())
    }
}
