//! Repository layer: one data-access contract per entity plus its SQLite
//! implementation.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate their input model before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Multi-row invariants (singleton flags, denormalized counters) are kept
//!   inside one immediate transaction.

pub mod admin_settings_repo;
pub mod application_repo;
pub mod benefit_repo;
pub mod blog_repo;
pub mod company_repo;
pub mod follower_repo;
pub mod invitation_repo;
pub mod job_repo;
pub mod linkedin_repo;
pub mod location_repo;
pub mod login_history_repo;
pub mod media_repo;
pub mod newsletter_repo;
pub mod notification_repo;
pub mod password_history_repo;
pub mod profile_repo;
pub mod resume_repo;
pub mod review_repo;
pub mod saved_repo;
pub mod support;
pub mod team_repo;
pub mod user_repo;
