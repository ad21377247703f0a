//! Job posting repository.
//!
//! # Responsibility
//! - Persist job postings with their skill tags.
//! - Serve the public job search with company display fields joined in.
//!
//! # Invariants
//! - `companies.job_count` equals the company's non-deleted jobs.
//! - `published_at` is stamped the first time a job opens and never moves.

use crate::model::company::CompanyId;
use crate::model::job::{
    EmploymentType, ExperienceLevel, Job, JobId, JobListing, JobSort, JobStatus, Workplace,
};
use crate::model::validation::{require_text, ValidationError};
use crate::repo::support::{
    bool_col, bool_to_int, ensure_active_company, ensure_active_user, ensure_connection_ready,
    enum_col, exists, fetch_page, grouped_counts, opt_uuid_col, query_optional, query_rows,
    require_changed, uuid_col, Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

pub(crate) const JOB_SELECT_SQL: &str = "SELECT
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
    j.updated_at
FROM jobs j";

pub(crate) const JOB_LISTING_SELECT_SQL: &str = "SELECT
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
    c.is_verified AS company_is_verified
FROM jobs j
JOIN companies c ON c.id = j.company_id";

const MAX_SKILL_LEN: usize = 64;

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "jobs",
        columns: &[
            "id",
            "company_id",
            "posted_by",
            "status",
            "view_count",
            "application_count",
            "published_at",
            "expires_at",
            "is_deleted",
        ],
    },
    RequiredTable {
        name: "job_skills",
        columns: &["job_id", "name"],
    },
    RequiredTable {
        name: "companies",
        columns: &["id", "name", "slug", "logo_url", "is_verified", "job_count"],
    },
];

/// Public job search filters. Absent fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct JobSearchQuery {
    /// Case-insensitive substring over title and description.
    pub keyword: Option<String>,
    pub company_id: Option<CompanyId>,
    pub employment_type: Option<EmploymentType>,
    pub workplace: Option<Workplace>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Jobs whose advertised maximum (or minimum, without a maximum) reaches this.
    pub min_salary: Option<i64>,
    pub experience_level: Option<ExperienceLevel>,
    /// Defaults to [`JobStatus::Open`].
    pub status: Option<JobStatus>,
    /// Epoch ms lower bound on publication (creation for unpublished jobs).
    pub posted_after: Option<i64>,
    pub skill: Option<String>,
    pub sort: JobSort,
    pub page: PageRequest,
}

pub trait JobRepository {
    fn create_job(&self, job: &Job) -> RepoResult<Job>;
    fn get_job(&self, id: JobId, include_deleted: bool) -> RepoResult<Option<Job>>;
    fn get_listing(&self, id: JobId) -> RepoResult<Option<JobListing>>;
    /// Updates descriptive fields; status and counters are untouched.
    fn update_job(&self, job: &Job) -> RepoResult<()>;
    fn set_status(&self, id: JobId, status: JobStatus) -> RepoResult<()>;
    fn increment_view_count(&self, id: JobId) -> RepoResult<()>;
    /// Replaces the skill tags; duplicates (case-insensitive) collapse.
    fn set_skills(&self, id: JobId, skills: &[String]) -> RepoResult<()>;
    fn skills(&self, id: JobId) -> RepoResult<Vec<String>>;
    fn search(&self, query: &JobSearchQuery) -> RepoResult<Page<JobListing>>;
    /// Employer view over every status, newest first.
    fn list_for_company(
        &self,
        company_id: CompanyId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Job>>;
    /// One entry per status, in declaration order.
    fn count_by_status(&self, company_id: CompanyId) -> RepoResult<Vec<(JobStatus, u64)>>;
    /// Closes open jobs whose `expires_at` is at or before `now_ms`.
    fn close_expired(&self, now_ms: i64) -> RepoResult<u64>;
    fn soft_delete_job(&self, id: JobId) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteJobRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteJobRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl JobRepository for SqliteJobRepository<'_> {
    fn create_job(&self, job: &Job) -> RepoResult<Job> {
        job.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_company(&tx, job.company_id)?;
        ensure_active_user(&tx, job.posted_by)?;
        if let Some(location_id) = job.location_id {
            ensure_company_location(&tx, job.company_id, location_id)?;
        }

        tx.execute(
            "INSERT INTO jobs (
                id,
                company_id,
                posted_by,
                location_id,
                title,
                description,
                employment_type,
                workplace,
                experience_level,
                city,
                country,
                salary_min,
                salary_max,
                salary_currency,
                status,
                published_at,
                expires_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                CASE WHEN ?15 = 'open' THEN (CAST(unixepoch('subsec') * 1000 AS INTEGER)) END,
                ?16
            );",
            params![
                job.id.to_string(),
                job.company_id.to_string(),
                job.posted_by.to_string(),
                job.location_id.map(|id| id.to_string()),
                job.title.trim(),
                job.description.trim(),
                job.employment_type.as_str(),
                job.workplace.as_str(),
                job.experience_level.as_str(),
                job.city,
                job.country,
                job.salary_min,
                job.salary_max,
                job.salary_currency,
                job.status.as_str(),
                job.expires_at,
            ],
        )?;
        tx.execute(
            "UPDATE companies SET job_count = job_count + 1 WHERE id = ?1;",
            [job.company_id.to_string()],
        )?;
        tx.commit()?;

        self.get_job(job.id, false)?.ok_or(RepoError::NotFound {
            entity: "job",
            id: job.id,
        })
    }

    fn get_job(&self, id: JobId, include_deleted: bool) -> RepoResult<Option<Job>> {
        query_optional(
            self.conn,
            &format!("{JOB_SELECT_SQL} WHERE j.id = ?1 AND (?2 = 1 OR j.is_deleted = 0);"),
            params![id.to_string(), bool_to_int(include_deleted)],
            parse_job_row,
        )
    }

    fn get_listing(&self, id: JobId) -> RepoResult<Option<JobListing>> {
        query_optional(
            self.conn,
            &format!(
                "{JOB_LISTING_SELECT_SQL}
                 WHERE j.id = ?1
                   AND j.is_deleted = 0
                   AND c.is_deleted = 0;"
            ),
            [id.to_string()],
            parse_listing_row,
        )
    }

    fn update_job(&self, job: &Job) -> RepoResult<()> {
        job.validate()?;
        if let Some(location_id) = job.location_id {
            ensure_company_location(self.conn, job.company_id, location_id)?;
        }

        let changed = self.conn.execute(
            "UPDATE jobs
             SET location_id = ?2,
                 title = ?3,
                 description = ?4,
                 employment_type = ?5,
                 workplace = ?6,
                 experience_level = ?7,
                 city = ?8,
                 country = ?9,
                 salary_min = ?10,
                 salary_max = ?11,
                 salary_currency = ?12,
                 expires_at = ?13,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                job.id.to_string(),
                job.location_id.map(|id| id.to_string()),
                job.title.trim(),
                job.description.trim(),
                job.employment_type.as_str(),
                job.workplace.as_str(),
                job.experience_level.as_str(),
                job.city,
                job.country,
                job.salary_min,
                job.salary_max,
                job.salary_currency,
                job.expires_at,
            ],
        )?;
        require_changed(changed, "job", job.id)
    }

    fn set_status(&self, id: JobId, status: JobStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs
             SET status = ?2,
                 published_at = CASE
                     WHEN ?2 = 'open' AND published_at IS NULL
                         THEN (CAST(unixepoch('subsec') * 1000 AS INTEGER))
                     ELSE published_at
                 END,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![id.to_string(), status.as_str()],
        )?;
        require_changed(changed, "job", id)
    }

    fn increment_view_count(&self, id: JobId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET view_count = view_count + 1 WHERE id = ?1 AND is_deleted = 0;",
            [id.to_string()],
        )?;
        require_changed(changed, "job", id)
    }

    fn set_skills(&self, id: JobId, skills: &[String]) -> RepoResult<()> {
        for skill in skills {
            require_text("skill", skill, MAX_SKILL_LEN)?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let found = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1 AND is_deleted = 0);",
            [id.to_string()],
        )?;
        if !found {
            return Err(RepoError::NotFound { entity: "job", id });
        }

        tx.execute("DELETE FROM job_skills WHERE job_id = ?1;", [id.to_string()])?;
        for skill in skills {
            tx.execute(
                "INSERT OR IGNORE INTO job_skills (job_id, name) VALUES (?1, ?2);",
                params![id.to_string(), skill.trim()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn skills(&self, id: JobId) -> RepoResult<Vec<String>> {
        query_rows(
            self.conn,
            "SELECT name FROM job_skills WHERE job_id = ?1 ORDER BY name ASC;",
            [id.to_string()],
            |row| Ok(row.get::<_, String>("name")?),
        )
    }

    fn search(&self, query: &JobSearchQuery) -> RepoResult<Page<JobListing>> {
        let mut filter = Filter::new();
        filter.raw("j.is_deleted = 0");
        filter.raw("c.is_deleted = 0");
        filter.text(
            "j.status = ?",
            query.status.unwrap_or(JobStatus::Open).as_str(),
        );
        if let Some(keyword) = query.keyword.as_deref() {
            filter.search(&["j.title", "j.description"], keyword);
        }
        if let Some(company_id) = query.company_id {
            filter.text("j.company_id = ?", &company_id.to_string());
        }
        if let Some(employment_type) = query.employment_type {
            filter.text("j.employment_type = ?", employment_type.as_str());
        }
        if let Some(workplace) = query.workplace {
            filter.text("j.workplace = ?", workplace.as_str());
        }
        if let Some(city) = query.city.as_deref() {
            filter.text("j.city = ? COLLATE NOCASE", city.trim());
        }
        if let Some(country) = query.country.as_deref() {
            filter.text("j.country = ? COLLATE NOCASE", country.trim());
        }
        if let Some(min_salary) = query.min_salary {
            filter.int("COALESCE(j.salary_max, j.salary_min) >= ?", min_salary);
        }
        if let Some(level) = query.experience_level {
            filter.text("j.experience_level = ?", level.as_str());
        }
        if let Some(posted_after) = query.posted_after {
            filter.int("COALESCE(j.published_at, j.created_at) >= ?", posted_after);
        }
        if let Some(skill) = query.skill.as_deref() {
            filter.text(
                "EXISTS(SELECT 1 FROM job_skills s WHERE s.job_id = j.id AND s.name = ?)",
                skill.trim(),
            );
        }

        let order_by = match query.sort {
            JobSort::Newest => "COALESCE(j.published_at, j.created_at) DESC, j.id ASC",
            JobSort::Salary => {
                "COALESCE(j.salary_max, j.salary_min, -1) DESC, \
                 COALESCE(j.published_at, j.created_at) DESC, j.id ASC"
            }
            JobSort::MostApplied => {
                "j.application_count DESC, COALESCE(j.published_at, j.created_at) DESC, j.id ASC"
            }
        };

        fetch_page(
            self.conn,
            JOB_LISTING_SELECT_SQL,
            "SELECT COUNT(*) FROM jobs j JOIN companies c ON c.id = j.company_id",
            &filter,
            order_by,
            query.page,
            parse_listing_row,
        )
    }

    fn list_for_company(
        &self,
        company_id: CompanyId,
        status: Option<JobStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Job>> {
        let mut filter = Filter::new();
        filter.raw("j.is_deleted = 0");
        filter.text("j.company_id = ?", &company_id.to_string());
        if let Some(status) = status {
            filter.text("j.status = ?", status.as_str());
        }

        fetch_page(
            self.conn,
            JOB_SELECT_SQL,
            "SELECT COUNT(*) FROM jobs j",
            &filter,
            "j.created_at DESC, j.id ASC",
            page,
            parse_job_row,
        )
    }

    fn count_by_status(&self, company_id: CompanyId) -> RepoResult<Vec<(JobStatus, u64)>> {
        grouped_counts(
            self.conn,
            "SELECT status, COUNT(*) AS total
             FROM jobs
             WHERE company_id = ?1
               AND is_deleted = 0
             GROUP BY status;",
            [company_id.to_string()],
            "status",
            JobStatus::parse,
            JobStatus::ALL,
        )
    }

    fn close_expired(&self, now_ms: i64) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE jobs
             SET status = 'closed',
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE status = 'open'
               AND is_deleted = 0
               AND expires_at IS NOT NULL
               AND expires_at <= ?1;",
            [now_ms],
        )?;
        if changed > 0 {
            info!("event=job_close_expired module=repo status=ok count={}", changed);
        }
        Ok(changed as u64)
    }

    fn soft_delete_job(&self, id: JobId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let company_id = query_optional(
            &tx,
            "SELECT company_id FROM jobs WHERE id = ?1 AND is_deleted = 0;",
            [id.to_string()],
            |row| uuid_col(row, "company_id"),
        )?
        .ok_or(RepoError::NotFound { entity: "job", id })?;

        tx.execute(
            "UPDATE jobs
             SET is_deleted = 1,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        tx.execute(
            "UPDATE companies SET job_count = MAX(job_count - 1, 0) WHERE id = ?1;",
            [company_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn ensure_company_location(
    conn: &Connection,
    company_id: CompanyId,
    location_id: Uuid,
) -> RepoResult<()> {
    let found = exists(
        conn,
        "SELECT EXISTS(
            SELECT 1 FROM company_locations WHERE id = ?1 AND company_id = ?2
        );",
        params![location_id.to_string(), company_id.to_string()],
    )?;
    if !found {
        return Err(ValidationError::Disallowed("location_id").into());
    }
    Ok(())
}

pub(crate) fn parse_job_row(row: &Row<'_>) -> RepoResult<Job> {
    Ok(Job {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        posted_by: uuid_col(row, "posted_by")?,
        location_id: opt_uuid_col(row, "location_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        employment_type: enum_col(row, "employment_type", EmploymentType::parse)?,
        workplace: enum_col(row, "workplace", Workplace::parse)?,
        experience_level: enum_col(row, "experience_level", ExperienceLevel::parse)?,
        city: row.get("city")?,
        country: row.get("country")?,
        salary_min: row.get("salary_min")?,
        salary_max: row.get("salary_max")?,
        salary_currency: row.get("salary_currency")?,
        status: enum_col(row, "status", JobStatus::parse)?,
        view_count: row.get("view_count")?,
        application_count: row.get("application_count")?,
        published_at: row.get("published_at")?,
        expires_at: row.get("expires_at")?,
        is_deleted: bool_col(row, "is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_listing_row(row: &Row<'_>) -> RepoResult<JobListing> {
    Ok(JobListing {
        job: parse_job_row(row)?,
        company_name: row.get("company_name")?,
        company_slug: row.get("company_slug")?,
        company_logo_url: row.get("company_logo_url")?,
        company_is_verified: bool_col(row, "company_is_verified")?,
    })
}
