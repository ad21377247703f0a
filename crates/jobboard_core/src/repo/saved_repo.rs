//! Bookmarks: jobs saved by candidates and candidates saved by companies.

use crate::model::application::SavedCandidate;
use crate::model::company::CompanyId;
use crate::model::job::{JobId, SavedJob};
use crate::model::user::UserId;
use crate::model::validation::{optional_text, MAX_LONG_TEXT};
use crate::repo::job_repo::parse_listing_row;
use crate::repo::support::{
    ensure_active_company, ensure_active_user, ensure_connection_ready, exists, fetch_page,
    uuid_col, Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection};

const SAVED_JOBS_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "saved_jobs",
    columns: &["user_id", "job_id", "created_at"],
}];

const SAVED_CANDIDATES_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "saved_candidates",
    columns: &["company_id", "candidate_id", "saved_by", "note", "created_at"],
}];

pub trait SavedJobRepository {
    /// Returns `true` when the job was not saved before.
    fn save_job(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool>;
    /// Returns `true` when a saved job was removed.
    fn unsave_job(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool>;
    fn is_saved(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool>;
    /// Most recently saved first; deleted jobs are hidden.
    fn list_saved_jobs(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<SavedJob>>;
    fn count_saved_jobs(&self, user_id: UserId) -> RepoResult<u64>;
}

pub trait SavedCandidateRepository {
    /// Saves or re-notes a candidate for a company.
    fn save_candidate(
        &self,
        company_id: CompanyId,
        candidate_id: UserId,
        saved_by: UserId,
        note: Option<&str>,
    ) -> RepoResult<bool>;
    fn unsave_candidate(&self, company_id: CompanyId, candidate_id: UserId) -> RepoResult<bool>;
    fn is_candidate_saved(&self, company_id: CompanyId, candidate_id: UserId) -> RepoResult<bool>;
    fn list_saved_candidates(
        &self,
        company_id: CompanyId,
        page: PageRequest,
    ) -> RepoResult<Page<SavedCandidate>>;
    fn count_saved_candidates(&self, company_id: CompanyId) -> RepoResult<u64>;
}

#[derive(Debug)]
pub struct SqliteSavedJobRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSavedJobRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, SAVED_JOBS_TABLES)?;
        Ok(Self { conn })
    }
}

impl SavedJobRepository for SqliteSavedJobRepository<'_> {
    fn save_job(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool> {
        ensure_active_user(self.conn, user_id)?;
        let job_exists = exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1 AND is_deleted = 0);",
            [job_id.to_string()],
        )?;
        if !job_exists {
            return Err(RepoError::NotFound {
                entity: "job",
                id: job_id,
            });
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO saved_jobs (user_id, job_id) VALUES (?1, ?2);",
            params![user_id.to_string(), job_id.to_string()],
        )?;
        Ok(inserted == 1)
    }

    fn unsave_job(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM saved_jobs WHERE user_id = ?1 AND job_id = ?2;",
            params![user_id.to_string(), job_id.to_string()],
        )?;
        Ok(deleted == 1)
    }

    fn is_saved(&self, user_id: UserId, job_id: JobId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM saved_jobs WHERE user_id = ?1 AND job_id = ?2);",
            params![user_id.to_string(), job_id.to_string()],
        )
    }

    fn list_saved_jobs(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<SavedJob>> {
        let mut filter = Filter::new();
        filter.text("s.user_id = ?", &user_id.to_string());
        filter.raw("j.is_deleted = 0");
        filter.raw("c.is_deleted = 0");

        fetch_page(
            self.conn,
            "SELECT
                j.id,
                j.company_id,
                j.posted_by,
                j.location_id,
                j.title,
                j.description,
                j.employment_type,
                j.workplace,
                j.experience_level,
                j.city,
                j.country,
                j.salary_min,
                j.salary_max,
                j.salary_currency,
                j.status,
                j.view_count,
                j.application_count,
                j.published_at,
                j.expires_at,
                j.is_deleted,
                j.created_at,
                j.updated_at,
                c.name AS company_name,
                c.slug AS company_slug,
                c.logo_url AS company_logo_url,
                c.is_verified AS company_is_verified,
                s.created_at AS saved_at
             FROM saved_jobs s
             JOIN jobs j ON j.id = s.job_id
             JOIN companies c ON c.id = j.company_id",
            "SELECT COUNT(*)
             FROM saved_jobs s
             JOIN jobs j ON j.id = s.job_id
             JOIN companies c ON c.id = j.company_id",
            &filter,
            "s.created_at DESC, s.rowid DESC",
            page,
            |row| {
                Ok(SavedJob {
                    listing: parse_listing_row(row)?,
                    saved_at: row.get("saved_at")?,
                })
            },
        )
    }

    fn count_saved_jobs(&self, user_id: UserId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM saved_jobs s
             JOIN jobs j ON j.id = s.job_id
             WHERE s.user_id = ?1
               AND j.is_deleted = 0;",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

#[derive(Debug)]
pub struct SqliteSavedCandidateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSavedCandidateRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, SAVED_CANDIDATES_TABLES)?;
        Ok(Self { conn })
    }
}

impl SavedCandidateRepository for SqliteSavedCandidateRepository<'_> {
    fn save_candidate(
        &self,
        company_id: CompanyId,
        candidate_id: UserId,
        saved_by: UserId,
        note: Option<&str>,
    ) -> RepoResult<bool> {
        optional_text("note", note, MAX_LONG_TEXT)?;
        ensure_active_company(self.conn, company_id)?;
        ensure_active_user(self.conn, candidate_id)?;
        ensure_active_user(self.conn, saved_by)?;

        let already_saved = self.is_candidate_saved(company_id, candidate_id)?;
        self.conn.execute(
            "INSERT INTO saved_candidates (company_id, candidate_id, saved_by, note)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (company_id, candidate_id) DO UPDATE SET
                 saved_by = excluded.saved_by,
                 note = excluded.note;",
            params![
                company_id.to_string(),
                candidate_id.to_string(),
                saved_by.to_string(),
                note
            ],
        )?;
        Ok(!already_saved)
    }

    fn unsave_candidate(&self, company_id: CompanyId, candidate_id: UserId) -> RepoResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM saved_candidates WHERE company_id = ?1 AND candidate_id = ?2;",
            params![company_id.to_string(), candidate_id.to_string()],
        )?;
        Ok(deleted == 1)
    }

    fn is_candidate_saved(&self, company_id: CompanyId, candidate_id: UserId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(
                SELECT 1 FROM saved_candidates WHERE company_id = ?1 AND candidate_id = ?2
            );",
            params![company_id.to_string(), candidate_id.to_string()],
        )
    }

    fn list_saved_candidates(
        &self,
        company_id: CompanyId,
        page: PageRequest,
    ) -> RepoResult<Page<SavedCandidate>> {
        let mut filter = Filter::new();
        filter.text("s.company_id = ?", &company_id.to_string());
        filter.raw("u.is_deleted = 0");

        fetch_page(
            self.conn,
            "SELECT
                s.company_id,
                s.candidate_id,
                s.saved_by,
                s.note,
                s.created_at AS saved_at,
                u.full_name AS candidate_name,
                u.headline AS candidate_headline
             FROM saved_candidates s
             JOIN users u ON u.id = s.candidate_id",
            "SELECT COUNT(*) FROM saved_candidates s JOIN users u ON u.id = s.candidate_id",
            &filter,
            "s.created_at DESC, s.rowid DESC",
            page,
            |row| {
                Ok(SavedCandidate {
                    company_id: uuid_col(row, "company_id")?,
                    candidate_id: uuid_col(row, "candidate_id")?,
                    saved_by: uuid_col(row, "saved_by")?,
                    note: row.get("note")?,
                    candidate_name: row.get("candidate_name")?,
                    candidate_headline: row.get("candidate_headline")?,
                    saved_at: row.get("saved_at")?,
                })
            },
        )
    }

    fn count_saved_candidates(&self, company_id: CompanyId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM saved_candidates WHERE company_id = ?1;",
            [company_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}
