//! User account repository.
//!
//! # Responsibility
//! - Persist accounts and their profile, activation and verification flags.
//! - Provide filtered, paginated account listings for admin screens.
//!
//! # Invariants
//! - Emails are stored normalized; duplicates surface as `Conflict`.
//! - Soft-deleted accounts are hidden unless explicitly requested and keep
//!   their email reserved.
//! - Soft-deleting an account drops its company follows and the matching
//!   `follower_count` increments.
//! - The `*_with_history` writes change `users` and `password_history` in
//!   one transaction.

use crate::model::user::{User, UserId, UserProfileUpdate, UserRole};
use crate::model::validation::{normalize_email, require_text};
use crate::repo::password_history_repo::append_password;
use crate::repo::support::{
    bool_col, bool_to_int, conflict_on_unique, ensure_connection_ready, enum_col, fetch_page,
    grouped_counts, query_optional, require_changed, uuid_col, Filter, Page, PageRequest,
    RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    password_hash,
    full_name,
    role,
    headline,
    avatar_url,
    is_active,
    is_verified,
    last_login_at,
    is_deleted,
    created_at,
    updated_at
FROM users";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "users",
        columns: &[
            "id",
            "email",
            "password_hash",
            "full_name",
            "role",
            "is_active",
            "is_verified",
            "last_login_at",
            "is_deleted",
        ],
    },
    RequiredTable {
        name: "password_history",
        columns: &["id", "user_id", "password_hash", "created_at"],
    },
    RequiredTable {
        name: "company_followers",
        columns: &["company_id", "user_id"],
    },
    RequiredTable {
        name: "companies",
        columns: &["id", "follower_count"],
    },
];

/// Filter options for account listings.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring over name and email.
    pub search: Option<String>,
    pub include_deleted: bool,
    pub page: PageRequest,
}

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<User>;
    /// Creates the account and seeds its password history with its hash.
    fn create_user_with_history(&self, user: &User, history_keep: u32) -> RepoResult<User>;
    fn get_user(&self, id: UserId, include_deleted: bool) -> RepoResult<Option<User>>;
    /// Looks up an active (not deleted) account by email, any casing.
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    fn update_profile(&self, id: UserId, update: &UserProfileUpdate) -> RepoResult<()>;
    fn update_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    /// Replaces the hash and appends it to the password history.
    fn update_password_hash_with_history(
        &self,
        id: UserId,
        password_hash: &str,
        history_keep: u32,
    ) -> RepoResult<()>;
    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()>;
    fn mark_verified(&self, id: UserId) -> RepoResult<()>;
    fn soft_delete_user(&self, id: UserId) -> RepoResult<()>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Page<User>>;
    /// Non-deleted accounts per role, in `UserRole::ALL` order.
    fn count_by_role(&self) -> RepoResult<Vec<(UserRole, u64)>>;
}

#[derive(Debug)]
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<User> {
        let id = insert_user(self.conn, user)?;
        self.get_user(id, false)?
            .ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn create_user_with_history(&self, user: &User, history_keep: u32) -> RepoResult<User> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id = insert_user(&tx, user)?;
        append_password(&tx, id, &user.password_hash, history_keep)?;
        tx.commit()?;

        self.get_user(id, false)?
            .ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_user(&self, id: UserId, include_deleted: bool) -> RepoResult<Option<User>> {
        query_optional(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);"),
            params![id.to_string(), bool_to_int(include_deleted)],
            parse_user_row,
        )
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        query_optional(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE email = ?1 AND is_deleted = 0;"),
            [normalize_email(email)],
            parse_user_row,
        )
    }

    fn update_profile(&self, id: UserId, update: &UserProfileUpdate) -> RepoResult<()> {
        update.validate()?;
        let changed = self.conn.execute(
            "UPDATE users
             SET full_name = ?2,
                 headline = ?3,
                 avatar_url = ?4,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id.to_string(),
                update.full_name,
                update.headline,
                update.avatar_url,
            ],
        )?;
        require_changed(changed, "user", id)
    }

    fn update_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        write_password_hash(self.conn, id, password_hash)
    }

    fn update_password_hash_with_history(
        &self,
        id: UserId,
        password_hash: &str,
        history_keep: u32,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        write_password_hash(&tx, id, password_hash)?;
        append_password(&tx, id, password_hash, history_keep)?;
        tx.commit()?;
        Ok(())
    }

    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET is_active = ?2,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            params![id.to_string(), bool_to_int(is_active)],
        )?;
        require_changed(changed, "user", id)
    }

    fn mark_verified(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET is_verified = 1,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        require_changed(changed, "user", id)
    }

    fn soft_delete_user(&self, id: UserId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE users
             SET is_deleted = 1,
                 is_active = 0,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        require_changed(changed, "user", id)?;

        tx.execute(
            "UPDATE companies
             SET follower_count = MAX(follower_count - 1, 0)
             WHERE id IN (SELECT company_id FROM company_followers WHERE user_id = ?1);",
            [id.to_string()],
        )?;
        let unfollowed = tx.execute(
            "DELETE FROM company_followers WHERE user_id = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;

        info!(
            "event=user_soft_delete module=repo status=ok unfollowed={}",
            unfollowed
        );
        Ok(())
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Page<User>> {
        let mut filter = Filter::new();
        if !query.include_deleted {
            filter.raw("is_deleted = 0");
        }
        if let Some(role) = query.role {
            filter.text("role = ?", role.as_str());
        }
        if let Some(is_active) = query.is_active {
            filter.int("is_active = ?", bool_to_int(is_active));
        }
        if let Some(search) = query.search.as_deref() {
            filter.search(&["full_name", "email"], search);
        }

        fetch_page(
            self.conn,
            USER_SELECT_SQL,
            "SELECT COUNT(*) FROM users",
            &filter,
            "created_at DESC, id ASC",
            query.page,
            parse_user_row,
        )
    }

    fn count_by_role(&self) -> RepoResult<Vec<(UserRole, u64)>> {
        grouped_counts(
            self.conn,
            "SELECT role, COUNT(*) AS total
             FROM users
             WHERE is_deleted = 0
             GROUP BY role;",
            [],
            "role",
            UserRole::parse,
            UserRole::ALL,
        )
    }
}

fn insert_user(conn: &Connection, user: &User) -> RepoResult<UserId> {
    let mut user = user.clone();
    user.email = normalize_email(&user.email);
    user.validate()?;

    conn.execute(
        "INSERT INTO users (
            id,
            email,
            password_hash,
            full_name,
            role,
            headline,
            avatar_url,
            is_active,
            is_verified,
            is_deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0);",
        params![
            user.id.to_string(),
            user.email,
            user.password_hash,
            user.full_name,
            user.role.as_str(),
            user.headline,
            user.avatar_url,
            bool_to_int(user.is_active),
            bool_to_int(user.is_verified),
        ],
    )
    .map_err(|err| conflict_on_unique(err, || "email is already registered".to_string()))?;
    Ok(user.id)
}

fn write_password_hash(conn: &Connection, id: UserId, password_hash: &str) -> RepoResult<()> {
    require_text("password_hash", password_hash, 512)?;
    let changed = conn.execute(
        "UPDATE users
         SET password_hash = ?2,
             updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
         WHERE id = ?1
           AND is_deleted = 0;",
        params![id.to_string(), password_hash],
    )?;
    require_changed(changed, "user", id)
}

pub(crate) fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: uuid_col(row, "id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        full_name: row.get("full_name")?,
        role: enum_col(row, "role", UserRole::parse)?,
        headline: row.get("headline")?,
        avatar_url: row.get("avatar_url")?,
        is_active: bool_col(row, "is_active")?,
        is_verified: bool_col(row, "is_verified")?,
        last_login_at: row.get("last_login_at")?,
        is_deleted: bool_col(row, "is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
