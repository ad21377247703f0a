//! Login attempt history.
//!
//! # Invariants
//! - Recording a successful attempt stamps `users.last_login_at` with the
//!   attempt time in the same transaction.
//! - History rows are append-only apart from age-based pruning.

use crate::model::account::LoginAttempt;
use crate::model::user::UserId;
use crate::repo::support::{
    bool_col, bool_to_int, ensure_connection_ready, exists, fetch_page, query_optional,
    require_changed, uuid_col, Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const ATTEMPT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    ip_address,
    user_agent,
    succeeded,
    failure_reason,
    created_at
FROM login_history";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "login_history",
        columns: &["id", "user_id", "succeeded", "failure_reason", "created_at"],
    },
    RequiredTable {
        name: "users",
        columns: &["id", "last_login_at"],
    },
];

pub trait LoginHistoryRepository {
    fn record_attempt(&self, attempt: &LoginAttempt) -> RepoResult<LoginAttempt>;
    /// Newest first.
    fn list_for_user(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<LoginAttempt>>;
    fn count_failures_since(&self, user_id: UserId, since_ms: i64) -> RepoResult<u64>;
    fn last_success(&self, user_id: UserId) -> RepoResult<Option<LoginAttempt>>;
    /// Deletes attempts strictly older than `cutoff_ms`; returns rows removed.
    fn prune_older_than(&self, cutoff_ms: i64) -> RepoResult<usize>;
}

#[derive(Debug)]
pub struct SqliteLoginHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLoginHistoryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn get_attempt(&self, id: Uuid) -> RepoResult<Option<LoginAttempt>> {
        query_optional(
            self.conn,
            &format!("{ATTEMPT_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            parse_attempt_row,
        )
    }
}

impl LoginHistoryRepository for SqliteLoginHistoryRepository<'_> {
    fn record_attempt(&self, attempt: &LoginAttempt) -> RepoResult<LoginAttempt> {
        attempt.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let user_exists = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND is_deleted = 0);",
            [attempt.user_id.to_string()],
        )?;
        if !user_exists {
            return Err(RepoError::NotFound {
                entity: "user",
                id: attempt.user_id,
            });
        }

        tx.execute(
            "INSERT INTO login_history (
                id,
                user_id,
                ip_address,
                user_agent,
                succeeded,
                failure_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                attempt.id.to_string(),
                attempt.user_id.to_string(),
                attempt.ip_address,
                attempt.user_agent,
                bool_to_int(attempt.succeeded),
                attempt.failure_reason,
            ],
        )?;

        if attempt.succeeded {
            let changed = tx.execute(
                "UPDATE users
                 SET last_login_at = (SELECT created_at FROM login_history WHERE id = ?2)
                 WHERE id = ?1;",
                params![attempt.user_id.to_string(), attempt.id.to_string()],
            )?;
            require_changed(changed, "user", attempt.user_id)?;
        }

        tx.commit()?;
        self.get_attempt(attempt.id)?.ok_or(RepoError::NotFound {
            entity: "login attempt",
            id: attempt.id,
        })
    }

    fn list_for_user(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<LoginAttempt>> {
        let mut filter = Filter::new();
        filter.text("user_id = ?", &user_id.to_string());
        fetch_page(
            self.conn,
            ATTEMPT_SELECT_SQL,
            "SELECT COUNT(*) FROM login_history",
            &filter,
            "created_at DESC, id ASC",
            page,
            parse_attempt_row,
        )
    }

    fn count_failures_since(&self, user_id: UserId, since_ms: i64) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM login_history
             WHERE user_id = ?1
               AND succeeded = 0
               AND created_at >= ?2;",
            params![user_id.to_string(), since_ms],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn last_success(&self, user_id: UserId) -> RepoResult<Option<LoginAttempt>> {
        query_optional(
            self.conn,
            &format!(
                "{ATTEMPT_SELECT_SQL}
                 WHERE user_id = ?1
                   AND succeeded = 1
                 ORDER BY created_at DESC, id ASC
                 LIMIT 1;"
            ),
            [user_id.to_string()],
            parse_attempt_row,
        )
    }

    fn prune_older_than(&self, cutoff_ms: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM login_history WHERE created_at < ?1;",
            [cutoff_ms],
        )?;
        info!(
            "event=login_history_prune module=repo status=ok removed={}",
            removed
        );
        Ok(removed)
    }
}

fn parse_attempt_row(row: &Row<'_>) -> RepoResult<LoginAttempt> {
    Ok(LoginAttempt {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        succeeded: bool_col(row, "succeeded")?,
        failure_reason: row.get("failure_reason")?,
        created_at: row.get("created_at")?,
    })
}
