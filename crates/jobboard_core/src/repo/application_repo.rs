//! Job application repository.
//!
//! # Invariants
//! - A candidate applies to a job at most once.
//! - Applications are only accepted while the job is `open`.
//! - `jobs.application_count` counts every submission, withdrawn included.
//! - Status changes follow [`ApplicationStatus::can_transition_to`].
//! - Only `withdraw` moves an application to `withdrawn`.

use crate::model::application::{
    Applicant, Application, ApplicationStatus, CandidateApplication,
};
use crate::model::job::{JobId, JobStatus};
use crate::model::user::UserId;
use crate::model::validation::{optional_text, ValidationError, MAX_LONG_TEXT};
use crate::repo::support::{
    conflict_on_unique, ensure_active_user, ensure_connection_ready, enum_col, exists,
    fetch_page, grouped_counts, opt_uuid_col, query_optional, uuid_col, Filter, Page,
    PageRequest, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const APPLICATION_SELECT_SQL: &str = "SELECT
    a.id,
    a.job_id,
    a.candidate_id,
    a.resume_id,
    a.cover_letter,
    a.status,
    a.employer_notes,
    a.created_at,
    a.updated_at
FROM applications a";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "applications",
        columns: &[
            "id",
            "job_id",
            "candidate_id",
            "resume_id",
            "status",
            "employer_notes",
        ],
    },
    RequiredTable {
        name: "jobs",
        columns: &["id", "status", "application_count", "is_deleted"],
    },
];

pub trait ApplicationRepository {
    fn create_application(&self, application: &Application) -> RepoResult<Application>;
    fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>>;
    fn has_applied(&self, job_id: JobId, candidate_id: UserId) -> RepoResult<bool>;
    /// Employer view, oldest submission first.
    fn list_for_job(
        &self,
        job_id: JobId,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Applicant>>;
    /// Candidate view, newest first.
    fn list_for_candidate(
        &self,
        candidate_id: UserId,
        page: PageRequest,
    ) -> RepoResult<Page<CandidateApplication>>;
    /// Moves an application along the hiring pipeline.
    ///
    /// `Withdrawn` is refused here; candidates use [`Self::withdraw`].
    fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        employer_notes: Option<&str>,
    ) -> RepoResult<Application>;
    /// Candidate-initiated withdrawal of their own application.
    fn withdraw(&self, id: Uuid, candidate_id: UserId) -> RepoResult<()>;
    /// One entry per status, in declaration order.
    fn count_by_status(&self, job_id: JobId) -> RepoResult<Vec<(ApplicationStatus, u64)>>;
}

#[derive(Debug)]
pub struct SqliteApplicationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteApplicationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ApplicationRepository for SqliteApplicationRepository<'_> {
    fn create_application(&self, application: &Application) -> RepoResult<Application> {
        application.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let job_status = query_optional(
            &tx,
            "SELECT status FROM jobs WHERE id = ?1 AND is_deleted = 0;",
            [application.job_id.to_string()],
            |row| enum_col(row, "status", JobStatus::parse),
        )?
        .ok_or(RepoError::NotFound {
            entity: "job",
            id: application.job_id,
        })?;
        if job_status != JobStatus::Open {
            return Err(RepoError::Conflict(format!(
                "job is {job_status} and not accepting applications"
            )));
        }
        ensure_active_user(&tx, application.candidate_id)?;
        if let Some(resume_id) = application.resume_id {
            let owned = exists(
                &tx,
                "SELECT EXISTS(SELECT 1 FROM resumes WHERE id = ?1 AND user_id = ?2);",
                params![resume_id.to_string(), application.candidate_id.to_string()],
            )?;
            if !owned {
                return Err(ValidationError::Disallowed("resume_id").into());
            }
        }

        tx.execute(
            "INSERT INTO applications (id, job_id, candidate_id, resume_id, cover_letter)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                application.id.to_string(),
                application.job_id.to_string(),
                application.candidate_id.to_string(),
                application.resume_id.map(|id| id.to_string()),
                application.cover_letter,
            ],
        )
        .map_err(|err| conflict_on_unique(err, || "candidate has already applied".to_string()))?;
        tx.execute(
            "UPDATE jobs SET application_count = application_count + 1 WHERE id = ?1;",
            [application.job_id.to_string()],
        )?;
        let stored = select_application(&tx, application.id)?.ok_or(RepoError::NotFound {
            entity: "application",
            id: application.id,
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>> {
        select_application(self.conn, id)
    }

    fn has_applied(&self, job_id: JobId, candidate_id: UserId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(
                SELECT 1 FROM applications WHERE job_id = ?1 AND candidate_id = ?2
            );",
            params![job_id.to_string(), candidate_id.to_string()],
        )
    }

    fn list_for_job(
        &self,
        job_id: JobId,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Applicant>> {
        let mut filter = Filter::new();
        filter.text("a.job_id = ?", &job_id.to_string());
        if let Some(status) = status {
            filter.text("a.status = ?", status.as_str());
        }

        fetch_page(
            self.conn,
            "SELECT
                a.id,
                a.job_id,
                a.candidate_id,
                a.resume_id,
                a.cover_letter,
                a.status,
                a.employer_notes,
                a.created_at,
                a.updated_at,
                u.full_name AS candidate_name,
                u.email AS candidate_email
             FROM applications a
             JOIN users u ON u.id = a.candidate_id",
            "SELECT COUNT(*) FROM applications a JOIN users u ON u.id = a.candidate_id",
            &filter,
            "a.created_at ASC, a.rowid ASC",
            page,
            |row| {
                Ok(Applicant {
                    application: parse_application_row(row)?,
                    candidate_name: row.get("candidate_name")?,
                    candidate_email: row.get("candidate_email")?,
                })
            },
        )
    }

    fn list_for_candidate(
        &self,
        candidate_id: UserId,
        page: PageRequest,
    ) -> RepoResult<Page<CandidateApplication>> {
        let mut filter = Filter::new();
        filter.text("a.candidate_id = ?", &candidate_id.to_string());

        fetch_page(
            self.conn,
            "SELECT
                a.id,
                a.job_id,
                a.candidate_id,
                a.resume_id,
                a.cover_letter,
                a.status,
                a.employer_notes,
                a.created_at,
                a.updated_at,
                j.title AS job_title,
                c.id AS company_id,
                c.name AS company_name
             FROM applications a
             JOIN jobs j ON j.id = a.job_id
             JOIN companies c ON c.id = j.company_id",
            "SELECT COUNT(*)
             FROM applications a
             JOIN jobs j ON j.id = a.job_id
             JOIN companies c ON c.id = j.company_id",
            &filter,
            "a.created_at DESC, a.rowid DESC",
            page,
            |row| {
                Ok(CandidateApplication {
                    application: parse_application_row(row)?,
                    job_title: row.get("job_title")?,
                    company_id: uuid_col(row, "company_id")?,
                    company_name: row.get("company_name")?,
                })
            },
        )
    }

    fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        employer_notes: Option<&str>,
    ) -> RepoResult<Application> {
        optional_text("employer_notes", employer_notes, MAX_LONG_TEXT)?;
        if status == ApplicationStatus::Withdrawn {
            return Err(ValidationError::Disallowed("status").into());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = select_application(&tx, id)?.ok_or(RepoError::NotFound {
            entity: "application",
            id,
        })?;
        if !current.status.can_transition_to(status) {
            return Err(RepoError::Conflict(format!(
                "application cannot move from {} to {}",
                current.status, status
            )));
        }

        tx.execute(
            "UPDATE applications
             SET status = ?2,
                 employer_notes = COALESCE(?3, employer_notes),
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            params![id.to_string(), status.as_str(), employer_notes],
        )?;
        let updated = select_application(&tx, id)?.ok_or(RepoError::NotFound {
            entity: "application",
            id,
        })?;
        tx.commit()?;

        info!(
            "event=application_status module=repo status=ok from={} to={}",
            current.status, status
        );
        Ok(updated)
    }

    fn withdraw(&self, id: Uuid, candidate_id: UserId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = select_application(&tx, id)?
            .filter(|application| application.candidate_id == candidate_id)
            .ok_or(RepoError::NotFound {
                entity: "application",
                id,
            })?;
        if !current
            .status
            .can_transition_to(ApplicationStatus::Withdrawn)
        {
            return Err(RepoError::Conflict(format!(
                "application is already {}",
                current.status
            )));
        }

        tx.execute(
            "UPDATE applications
             SET status = 'withdrawn',
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn count_by_status(&self, job_id: JobId) -> RepoResult<Vec<(ApplicationStatus, u64)>> {
        grouped_counts(
            self.conn,
            "SELECT status, COUNT(*) AS total
             FROM applications
             WHERE job_id = ?1
             GROUP BY status;",
            [job_id.to_string()],
            "status",
            ApplicationStatus::parse,
            ApplicationStatus::ALL,
        )
    }
}

fn select_application(conn: &Connection, id: Uuid) -> RepoResult<Option<Application>> {
    query_optional(
        conn,
        &format!("{APPLICATION_SELECT_SQL} WHERE a.id = ?1;"),
        [id.to_string()],
        parse_application_row,
    )
}

fn parse_application_row(row: &Row<'_>) -> RepoResult<Application> {
    Ok(Application {
        id: uuid_col(row, "id")?,
        job_id: uuid_col(row, "job_id")?,
        candidate_id: uuid_col(row, "candidate_id")?,
        resume_id: opt_uuid_col(row, "resume_id")?,
        cover_letter: row.get("cover_letter")?,
        status: enum_col(row, "status", ApplicationStatus::parse)?,
        employer_notes: row.get("employer_notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
