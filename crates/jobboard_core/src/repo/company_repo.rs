//! Company repository.
//!
//! # Responsibility
//! - Persist company profiles and their denormalized counters.
//! - Own the ownership-transfer transaction.
//!
//! # Invariants
//! - Creating a company also makes its owner an `owner` team member.
//! - `owner_id` and the single `owner` team member always agree.
//! - Review aggregates only count approved reviews.

use crate::model::company::{Company, CompanyId};
use crate::model::review::RatingSummary;
use crate::model::user::UserId;
use crate::repo::support::{
    bool_col, bool_to_int, ensure_active_company, ensure_active_user, ensure_connection_ready,
    fetch_page, query_optional, query_rows, require_changed, unique_slug, uuid_col, Filter, Page,
    PageRequest, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

pub(crate) const COMPANY_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    name,
    slug,
    description,
    website,
    industry,
    company_size,
    logo_url,
    is_verified,
    follower_count,
    job_count,
    review_count,
    average_rating,
    is_deleted,
    created_at,
    updated_at
FROM companies";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "companies",
        columns: &[
            "id",
            "owner_id",
            "slug",
            "follower_count",
            "job_count",
            "review_count",
            "average_rating",
            "is_deleted",
        ],
    },
    RequiredTable {
        name: "team_members",
        columns: &["company_id", "user_id", "role"],
    },
    RequiredTable {
        name: "company_reviews",
        columns: &["company_id", "rating", "is_approved"],
    },
];

/// Filter options for company directory listings.
#[derive(Debug, Clone, Default)]
pub struct CompanyListQuery {
    /// Exact match, case-insensitive.
    pub industry: Option<String>,
    pub is_verified: Option<bool>,
    /// Case-insensitive substring over name and description.
    pub search: Option<String>,
    pub page: PageRequest,
}

pub trait CompanyRepository {
    /// Inserts a company with a generated unique slug.
    fn create_company(&self, company: &Company) -> RepoResult<Company>;
    fn get_company(&self, id: CompanyId, include_deleted: bool) -> RepoResult<Option<Company>>;
    fn get_company_by_slug(&self, slug: &str) -> RepoResult<Option<Company>>;
    /// Updates editable profile fields; slug, owner and counters are untouched.
    fn update_company(&self, company: &Company) -> RepoResult<()>;
    fn set_verified(&self, id: CompanyId, is_verified: bool) -> RepoResult<()>;
    fn soft_delete_company(&self, id: CompanyId) -> RepoResult<()>;
    /// Sorted by name.
    fn list_companies(&self, query: &CompanyListQuery) -> RepoResult<Page<Company>>;
    /// Hands the company to `new_owner_id`; the previous owner stays on the
    /// team as `admin`.
    fn transfer_ownership(&self, id: CompanyId, new_owner_id: UserId) -> RepoResult<()>;
    /// Recomputes `review_count`/`average_rating` from approved reviews.
    fn refresh_review_stats(&self, id: CompanyId) -> RepoResult<RatingSummary>;
    /// Companies where `user_id` is on the team.
    fn list_for_member(&self, user_id: UserId) -> RepoResult<Vec<Company>>;
}

#[derive(Debug)]
pub struct SqliteCompanyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCompanyRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl CompanyRepository for SqliteCompanyRepository<'_> {
    fn create_company(&self, company: &Company) -> RepoResult<Company> {
        company.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_user(&tx, company.owner_id)?;
        let slug = unique_slug(&tx, "companies", &company.name, "company")?;

        tx.execute(
            "INSERT INTO companies (
                id,
                owner_id,
                name,
                slug,
                description,
                website,
                industry,
                company_size,
                logo_url,
                is_verified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                company.id.to_string(),
                company.owner_id.to_string(),
                company.name.trim(),
                slug,
                company.description,
                company.website,
                company.industry,
                company.company_size,
                company.logo_url,
                bool_to_int(company.is_verified),
            ],
        )?;
        tx.execute(
            "INSERT INTO team_members (company_id, user_id, role)
             VALUES (?1, ?2, 'owner');",
            params![company.id.to_string(), company.owner_id.to_string()],
        )?;
        tx.commit()?;

        self.get_company(company.id, false)?
            .ok_or(RepoError::NotFound {
                entity: "company",
                id: company.id,
            })
    }

    fn get_company(&self, id: CompanyId, include_deleted: bool) -> RepoResult<Option<Company>> {
        query_optional(
            self.conn,
            &format!("{COMPANY_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);"),
            params![id.to_string(), bool_to_int(include_deleted)],
            parse_company_row,
        )
    }

    fn get_company_by_slug(&self, slug: &str) -> RepoResult<Option<Company>> {
        query_optional(
            self.conn,
            &format!("{COMPANY_SELECT_SQL} WHERE slug = ?1 AND is_deleted = 0;"),
            [slug.trim().to_lowercase()],
            parse_company_row,
        )
    }

    fn update_company(&self, company: &Company) -> RepoResult<()> {
        company.validate()?;
        let changed = self.conn.execute(
            "UPDATE companies
             SET name = ?2,
                 description = ?3,
                 website = ?4,
                 industry = ?5,
                 company_size = ?6,
                 logo_url = ?7,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                company.id.to_string(),
                company.name.trim(),
                company.description,
                company.website,
                company.industry,
                company.company_size,
                company.logo_url,
            ],
        )?;
        require_changed(changed, "company", company.id)
    }

    fn set_verified(&self, id: CompanyId, is_verified: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE companies
             SET is_verified = ?2,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![id.to_string(), bool_to_int(is_verified)],
        )?;
        require_changed(changed, "company", id)
    }

    fn soft_delete_company(&self, id: CompanyId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE companies
             SET is_deleted = 1,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        require_changed(changed, "company", id)
    }

    fn list_companies(&self, query: &CompanyListQuery) -> RepoResult<Page<Company>> {
        let mut filter = Filter::new();
        filter.raw("is_deleted = 0");
        if let Some(industry) = query.industry.as_deref() {
            filter.text("industry = ? COLLATE NOCASE", industry.trim());
        }
        if let Some(is_verified) = query.is_verified {
            filter.int("is_verified = ?", bool_to_int(is_verified));
        }
        if let Some(search) = query.search.as_deref() {
            filter.search(&["name", "COALESCE(description, '')"], search);
        }

        fetch_page(
            self.conn,
            COMPANY_SELECT_SQL,
            "SELECT COUNT(*) FROM companies",
            &filter,
            "name COLLATE NOCASE ASC, id ASC",
            query.page,
            parse_company_row,
        )
    }

    fn transfer_ownership(&self, id: CompanyId, new_owner_id: UserId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current_owner: Option<String> = tx
            .query_row(
                "SELECT owner_id FROM companies WHERE id = ?1 AND is_deleted = 0;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current_owner) = current_owner else {
            return Err(RepoError::NotFound {
                entity: "company",
                id,
            });
        };
        ensure_active_user(&tx, new_owner_id)?;

        let new_owner = new_owner_id.to_string();
        if current_owner == new_owner {
            return Ok(());
        }

        tx.execute(
            "UPDATE companies
             SET owner_id = ?2,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            params![id.to_string(), new_owner],
        )?;
        tx.execute(
            "UPDATE team_members
             SET role = 'admin'
             WHERE company_id = ?1
               AND user_id = ?2;",
            params![id.to_string(), current_owner],
        )?;
        tx.execute(
            "INSERT INTO team_members (company_id, user_id, role)
             VALUES (?1, ?2, 'owner')
             ON CONFLICT (company_id, user_id) DO UPDATE SET role = 'owner';",
            params![id.to_string(), new_owner],
        )?;
        tx.commit()?;

        info!(
            "event=company_transfer_ownership module=repo status=ok company_id={}",
            id
        );
        Ok(())
    }

    fn refresh_review_stats(&self, id: CompanyId) -> RepoResult<RatingSummary> {
        ensure_active_company(self.conn, id)?;
        refresh_company_review_stats(self.conn, id)
    }

    fn list_for_member(&self, user_id: UserId) -> RepoResult<Vec<Company>> {
        query_rows(
            self.conn,
            &format!(
                "{COMPANY_SELECT_SQL}
                 WHERE is_deleted = 0
                   AND id IN (SELECT company_id FROM team_members WHERE user_id = ?1)
                 ORDER BY name COLLATE NOCASE ASC, id ASC;"
            ),
            [user_id.to_string()],
            parse_company_row,
        )
    }
}

/// Recomputes review aggregates; callers running inside a transaction pass
/// the transaction.
pub(crate) fn refresh_company_review_stats(
    conn: &Connection,
    company_id: CompanyId,
) -> RepoResult<RatingSummary> {
    let summary = rating_summary(conn, company_id)?;
    conn.execute(
        "UPDATE companies
         SET review_count = ?2,
             average_rating = ?3,
             updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
         WHERE id = ?1;",
        params![
            company_id.to_string(),
            summary.review_count,
            summary.average_rating
        ],
    )?;
    Ok(summary)
}

pub(crate) fn rating_summary(conn: &Connection, company_id: CompanyId) -> RepoResult<RatingSummary> {
    let buckets = query_rows(
        conn,
        "SELECT rating, COUNT(*) AS total
         FROM company_reviews
         WHERE company_id = ?1
           AND is_approved = 1
         GROUP BY rating;",
        [company_id.to_string()],
        |row| Ok((row.get::<_, i64>("rating")?, row.get::<_, i64>("total")?)),
    )?;

    let mut histogram = [0_i64; 5];
    let mut review_count = 0;
    let mut rating_sum = 0;
    for (rating, total) in buckets {
        let index = usize::try_from(rating - 1)
            .ok()
            .filter(|index| *index < histogram.len())
            .ok_or_else(|| {
                RepoError::InvalidData(format!("invalid rating `{rating}` in company_reviews"))
            })?;
        histogram[index] = total;
        review_count += total;
        rating_sum += rating * total;
    }

    let average_rating = if review_count == 0 {
        0.0
    } else {
        // Stored and reported with two decimals.
        ((rating_sum as f64 / review_count as f64) * 100.0).round() / 100.0
    };

    Ok(RatingSummary {
        review_count,
        average_rating,
        histogram,
    })
}

pub(crate) fn parse_company_row(row: &Row<'_>) -> RepoResult<Company> {
    Ok(Company {
        id: uuid_col(row, "id")?,
        owner_id: uuid_col(row, "owner_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        description: row.get("description")?,
        website: row.get("website")?,
        industry: row.get("industry")?,
        company_size: row.get("company_size")?,
        logo_url: row.get("logo_url")?,
        is_verified: bool_col(row, "is_verified")?,
        follower_count: row.get("follower_count")?,
        job_count: row.get("job_count")?,
        review_count: row.get("review_count")?,
        average_rating: row.get("average_rating")?,
        is_deleted: bool_col(row, "is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
