//! Company follower repository.
//!
//! # Invariants
//! - `companies.follower_count` moves only when a follow row is actually
//!   inserted or deleted, in the same transaction.

use crate::model::company::{CompanyFollower, CompanyId, FollowedCompany};
use crate::model::user::UserId;
use crate::repo::support::{
    ensure_active_company, ensure_active_user, ensure_connection_ready, exists, fetch_page,
    uuid_col, Filter, Page, PageRequest, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "company_followers",
        columns: &["company_id", "user_id", "created_at"],
    },
    RequiredTable {
        name: "companies",
        columns: &["id", "follower_count"],
    },
];

pub trait FollowerRepository {
    /// Returns `true` when a new follow was recorded.
    fn follow(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool>;
    /// Returns `true` when an existing follow was removed.
    fn unfollow(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool>;
    fn is_following(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool>;
    /// Most recent followers first.
    fn list_followers(
        &self,
        company_id: CompanyId,
        page: PageRequest,
    ) -> RepoResult<Page<CompanyFollower>>;
    fn list_followed_companies(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> RepoResult<Page<FollowedCompany>>;
}

#[derive(Debug)]
pub struct SqliteFollowerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFollowerRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl FollowerRepository for SqliteFollowerRepository<'_> {
    fn follow(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_company(&tx, company_id)?;
        ensure_active_user(&tx, user_id)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO company_followers (company_id, user_id) VALUES (?1, ?2);",
            params![company_id.to_string(), user_id.to_string()],
        )?;
        if inserted == 1 {
            tx.execute(
                "UPDATE companies SET follower_count = follower_count + 1 WHERE id = ?1;",
                [company_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(inserted == 1)
    }

    fn unfollow(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let deleted = tx.execute(
            "DELETE FROM company_followers WHERE company_id = ?1 AND user_id = ?2;",
            params![company_id.to_string(), user_id.to_string()],
        )?;
        if deleted == 1 {
            tx.execute(
                "UPDATE companies
                 SET follower_count = MAX(follower_count - 1, 0)
                 WHERE id = ?1;",
                [company_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(deleted == 1)
    }

    fn is_following(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(
                SELECT 1 FROM company_followers WHERE company_id = ?1 AND user_id = ?2
            );",
            params![company_id.to_string(), user_id.to_string()],
        )
    }

    fn list_followers(
        &self,
        company_id: CompanyId,
        page: PageRequest,
    ) -> RepoResult<Page<CompanyFollower>> {
        let mut filter = Filter::new();
        filter.text("f.company_id = ?", &company_id.to_string());
        filter.raw("u.is_deleted = 0");

        fetch_page(
            self.conn,
            "SELECT f.user_id, u.full_name, u.avatar_url, f.created_at AS followed_at
             FROM company_followers f
             JOIN users u ON u.id = f.user_id",
            "SELECT COUNT(*) FROM company_followers f JOIN users u ON u.id = f.user_id",
            &filter,
            "f.created_at DESC, f.user_id ASC",
            page,
            |row| {
                Ok(CompanyFollower {
                    user_id: uuid_col(row, "user_id")?,
                    full_name: row.get("full_name")?,
                    avatar_url: row.get("avatar_url")?,
                    followed_at: row.get("followed_at")?,
                })
            },
        )
    }

    fn list_followed_companies(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> RepoResult<Page<FollowedCompany>> {
        let mut filter = Filter::new();
        filter.text("f.user_id = ?", &user_id.to_string());
        filter.raw("c.is_deleted = 0");

        fetch_page(
            self.conn,
            "SELECT f.company_id, c.name, c.slug, c.logo_url, f.created_at AS followed_at
             FROM company_followers f
             JOIN companies c ON c.id = f.company_id",
            "SELECT COUNT(*) FROM company_followers f JOIN companies c ON c.id = f.company_id",
            &filter,
            "f.created_at DESC, f.company_id ASC",
            page,
            |row| {
                Ok(FollowedCompany {
                    company_id: uuid_col(row, "company_id")?,
                    name: row.get("name")?,
                    slug: row.get("slug")?,
                    logo_url: row.get("logo_url")?,
                    followed_at: row.get("followed_at")?,
                })
            },
        )
    }
}
