//! Job application model and hiring pipeline states.
//!
//! # Invariants
//! - One application per candidate per job.
//! - Status only moves along [`ApplicationStatus::can_transition_to`].
//! - `hired`, `rejected` and `withdrawn` are terminal.

use crate::model::company::CompanyId;
use crate::model::job::JobId;
use crate::model::user::UserId;
use crate::model::validation::{optional_text, ValidationResult, MAX_LONG_TEXT};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum ApplicationStatus {
        Submitted => "submitted",
        Reviewing => "reviewing",
        Shortlisted => "shortlisted",
        Interviewing => "interviewing",
        Offered => "offered",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Hired | Self::Rejected | Self::Withdrawn)
    }

    /// Pipeline moves forward one stage at a time; any open stage may be
    /// rejected by the employer or withdrawn by the candidate.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Rejected | Self::Withdrawn => true,
            Self::Reviewing => self == Self::Submitted,
            Self::Shortlisted => self == Self::Reviewing,
            Self::Interviewing => self == Self::Shortlisted,
            Self::Offered => self == Self::Interviewing,
            Self::Hired => self == Self::Offered,
            Self::Submitted => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: JobId,
    pub candidate_id: UserId,
    pub resume_id: Option<Uuid>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    /// Private to the employer.
    pub employer_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Application {
    pub fn new(job_id: JobId, candidate_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            candidate_id,
            resume_id: None,
            cover_letter: None,
            status: ApplicationStatus::Submitted,
            employer_notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        optional_text("cover_letter", self.cover_letter.as_deref(), MAX_LONG_TEXT)?;
        optional_text("employer_notes", self.employer_notes.as_deref(), MAX_LONG_TEXT)
    }
}

/// Application as seen by the employer, with candidate contact fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub application: Application,
    pub candidate_name: String,
    pub candidate_email: String,
}

/// Application as seen by the candidate, with job and company fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateApplication {
    pub application: Application,
    pub job_title: String,
    pub company_id: CompanyId,
    pub company_name: String,
}

/// Candidate bookmarked by a company's hiring team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCandidate {
    pub company_id: CompanyId,
    pub candidate_id: UserId,
    pub saved_by: UserId,
    pub note: Option<String>,
    pub candidate_name: String,
    pub candidate_headline: Option<String>,
    pub saved_at: i64,
}

#[cfg(test)]
mod tests {
    use super::ApplicationStatus::*;

    #[test]
    fn pipeline_moves_one_stage_at_a_time() {
        assert!(Submitted.can_transition_to(Reviewing));
        assert!(Reviewing.can_transition_to(Shortlisted));
        assert!(Offered.can_transition_to(Hired));
        assert!(!Submitted.can_transition_to(Offered));
        assert!(!Reviewing.can_transition_to(Submitted));
    }

    #[test]
    fn terminal_states_are_final() {
        for status in [Hired, Rejected, Withdrawn] {
            assert!(status.is_terminal());
            assert!(!status.can_transition_to(Rejected));
            assert!(!status.can_transition_to(Reviewing));
        }
    }

    #[test]
    fn open_stages_can_be_rejected_or_withdrawn() {
        for status in [Submitted, Reviewing, Shortlisted, Interviewing, Offered] {
            assert!(status.can_transition_to(Rejected));
            assert!(status.can_transition_to(Withdrawn));
        }
    }
}
