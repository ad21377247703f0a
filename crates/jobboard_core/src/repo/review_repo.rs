//! Company review repository.
//!
//! # Invariants
//! - One review per author per company.
//! - Every write recomputes the company's review aggregates in the same
//!   transaction, counting approved reviews only.

use crate::model::company::CompanyId;
use crate::model::review::{RatingSummary, Review, ReviewSort, MAX_RATING, MIN_RATING};
use crate::repo::company_repo::{rating_summary, refresh_company_review_stats};
use crate::repo::support::{
    bool_col, bool_to_int, conflict_on_unique, ensure_active_company, ensure_active_user,
    ensure_connection_ready, fetch_page, parse_uuid, query_optional, require_changed, uuid_col,
    Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const REVIEW_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    author_id,
    rating,
    title,
    body,
    pros,
    cons,
    is_anonymous,
    is_approved,
    helpful_count,
    created_at,
    updated_at
FROM company_reviews";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "company_reviews",
        columns: &[
            "id",
            "company_id",
            "author_id",
            "rating",
            "is_approved",
            "helpful_count",
        ],
    },
    RequiredTable {
        name: "companies",
        columns: &["id", "review_count", "average_rating"],
    },
];

/// Filter options for a company's review feed.
#[derive(Debug, Clone, Default)]
pub struct ReviewListQuery {
    /// Moderation views also see unapproved reviews.
    pub include_unapproved: bool,
    pub min_rating: Option<u8>,
    pub sort: ReviewSort,
    pub page: PageRequest,
}

pub trait ReviewRepository {
    fn create_review(&self, review: &Review) -> RepoResult<Review>;
    fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>>;
    /// Updates rating and text; approval and helpful votes are untouched.
    fn update_review(&self, review: &Review) -> RepoResult<()>;
    fn delete_review(&self, id: Uuid) -> RepoResult<()>;
    fn set_approved(&self, id: Uuid, is_approved: bool) -> RepoResult<()>;
    /// Returns the new helpful count.
    fn mark_helpful(&self, id: Uuid) -> RepoResult<i64>;
    fn list_for_company(
        &self,
        company_id: CompanyId,
        query: &ReviewListQuery,
    ) -> RepoResult<Page<Review>>;
    fn rating_summary(&self, company_id: CompanyId) -> RepoResult<RatingSummary>;
}

#[derive(Debug)]
pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn create_review(&self, review: &Review) -> RepoResult<Review> {
        review.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_company(&tx, review.company_id)?;
        ensure_active_user(&tx, review.author_id)?;
        tx.execute(
            "INSERT INTO company_reviews (
                id,
                company_id,
                author_id,
                rating,
                title,
                body,
                pros,
                cons,
                is_anonymous,
                is_approved
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                review.id.to_string(),
                review.company_id.to_string(),
                review.author_id.to_string(),
                review.rating,
                review.title.trim(),
                review.body.trim(),
                review.pros,
                review.cons,
                bool_to_int(review.is_anonymous),
                bool_to_int(review.is_approved),
            ],
        )
        .map_err(|err| {
            conflict_on_unique(err, || "author has already reviewed this company".to_string())
        })?;
        refresh_company_review_stats(&tx, review.company_id)?;
        let stored = query_optional(
            &tx,
            &format!("{REVIEW_SELECT_SQL} WHERE id = ?1;"),
            [review.id.to_string()],
            parse_review_row,
        )?
        .ok_or(RepoError::NotFound {
            entity: "review",
            id: review.id,
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        query_optional(
            self.conn,
            &format!("{REVIEW_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            parse_review_row,
        )
    }

    fn update_review(&self, review: &Review) -> RepoResult<()> {
        review.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let company_id = review_company(&tx, review.id)?;
        tx.execute(
            "UPDATE company_reviews
             SET rating = ?2,
                 title = ?3,
                 body = ?4,
                 pros = ?5,
                 cons = ?6,
                 is_anonymous = ?7,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            params![
                review.id.to_string(),
                review.rating,
                review.title.trim(),
                review.body.trim(),
                review.pros,
                review.cons,
                bool_to_int(review.is_anonymous),
            ],
        )?;
        refresh_company_review_stats(&tx, company_id)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_review(&self, id: Uuid) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let company_id = review_company(&tx, id)?;
        tx.execute("DELETE FROM company_reviews WHERE id = ?1;", [id.to_string()])?;
        refresh_company_review_stats(&tx, company_id)?;
        tx.commit()?;
        Ok(())
    }

    fn set_approved(&self, id: Uuid, is_approved: bool) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let company_id = review_company(&tx, id)?;
        tx.execute(
            "UPDATE company_reviews
             SET is_approved = ?2,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_approved)],
        )?;
        refresh_company_review_stats(&tx, company_id)?;
        tx.commit()?;
        Ok(())
    }

    fn mark_helpful(&self, id: Uuid) -> RepoResult<i64> {
        let changed = self.conn.execute(
            "UPDATE company_reviews SET helpful_count = helpful_count + 1 WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "review", id)?;
        let count = self.conn.query_row(
            "SELECT helpful_count FROM company_reviews WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_for_company(
        &self,
        company_id: CompanyId,
        query: &ReviewListQuery,
    ) -> RepoResult<Page<Review>> {
        let mut filter = Filter::new();
        filter.text("company_id = ?", &company_id.to_string());
        if !query.include_unapproved {
            filter.raw("is_approved = 1");
        }
        if let Some(min_rating) = query.min_rating {
            filter.int("rating >= ?", i64::from(min_rating));
        }

        let order_by = match query.sort {
            ReviewSort::Newest => "created_at DESC, id ASC",
            ReviewSort::HighestRated => "rating DESC, created_at DESC, id ASC",
            ReviewSort::LowestRated => "rating ASC, created_at DESC, id ASC",
            ReviewSort::MostHelpful => "helpful_count DESC, created_at DESC, id ASC",
        };

        fetch_page(
            self.conn,
            REVIEW_SELECT_SQL,
            "SELECT COUNT(*) FROM company_reviews",
            &filter,
            order_by,
            query.page,
            parse_review_row,
        )
    }

    fn rating_summary(&self, company_id: CompanyId) -> RepoResult<RatingSummary> {
        rating_summary(self.conn, company_id)
    }
}

fn review_company(conn: &Connection, id: Uuid) -> RepoResult<CompanyId> {
    let company_id: Option<String> = conn
        .query_row(
            "SELECT company_id FROM company_reviews WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match company_id {
        Some(text) => parse_uuid(&text, "company_id"),
        None => Err(RepoError::NotFound {
            entity: "review",
            id,
        }),
    }
}

fn parse_review_row(row: &Row<'_>) -> RepoResult<Review> {
    let rating: i64 = row.get("rating")?;
    let rating = u8::try_from(rating)
        .ok()
        .filter(|value| (MIN_RATING..=MAX_RATING).contains(value))
        .ok_or_else(|| RepoError::InvalidData(format!("invalid rating `{rating}` in rating")))?;
    Ok(Review {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        author_id: uuid_col(row, "author_id")?,
        rating,
        title: row.get("title")?,
        body: row.get("body")?,
        pros: row.get("pros")?,
        cons: row.get("cons")?,
        is_anonymous: bool_col(row, "is_anonymous")?,
        is_approved: bool_col(row, "is_approved")?,
        helpful_count: row.get("helpful_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
