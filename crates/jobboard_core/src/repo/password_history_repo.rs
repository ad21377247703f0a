//! Password reuse history.
//!
//! # Invariants
//! - At most `keep` entries survive per user after each `record_password`.
//! - Hashes are compared verbatim; hashing and salting happen upstream.

use crate::model::account::PasswordHistoryEntry;
use crate::model::user::UserId;
use crate::model::validation::require_text;
use crate::repo::support::{
    ensure_connection_ready, exists, query_rows, uuid_col, RepoError, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "password_history",
    columns: &["id", "user_id", "password_hash", "created_at"],
}];

pub trait PasswordHistoryRepository {
    /// Appends a hash and trims the user's history to the `keep` newest.
    fn record_password(&self, user_id: UserId, password_hash: &str, keep: u32) -> RepoResult<()>;
    /// Newest first, at most `limit` entries.
    fn recent_entries(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<PasswordHistoryEntry>>;
    fn was_recently_used(&self, user_id: UserId, password_hash: &str, depth: u32)
        -> RepoResult<bool>;
}

#[derive(Debug)]
pub struct SqlitePasswordHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePasswordHistoryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl PasswordHistoryRepository for SqlitePasswordHistoryRepository<'_> {
    fn record_password(&self, user_id: UserId, password_hash: &str, keep: u32) -> RepoResult<()> {
        require_text("password_hash", password_hash, 512)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
            [user_id.to_string()],
        )? {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user_id,
            });
        }

        append_password(&tx, user_id, password_hash, keep)?;
        tx.commit()?;
        Ok(())
    }

    fn recent_entries(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<PasswordHistoryEntry>> {
        query_rows(
            self.conn,
            "SELECT id, user_id, password_hash, created_at
             FROM password_history
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2;",
            params![user_id.to_string(), i64::from(limit)],
            parse_entry_row,
        )
    }

    fn was_recently_used(
        &self,
        user_id: UserId,
        password_hash: &str,
        depth: u32,
    ) -> RepoResult<bool> {
        Ok(self
            .recent_entries(user_id, depth)?
            .iter()
            .any(|entry| entry.password_hash == password_hash))
    }
}

/// Inserts a history row and trims the user's history to the `keep` newest.
///
/// Runs on the caller's connection so it can share the caller's transaction.
pub(crate) fn append_password(
    conn: &Connection,
    user_id: UserId,
    password_hash: &str,
    keep: u32,
) -> RepoResult<()> {
    // Entries stamped in the same millisecond keep insertion order via rowid.
    conn.execute(
        "INSERT INTO password_history (id, user_id, password_hash)
         VALUES (?1, ?2, ?3);",
        params![Uuid::new_v4().to_string(), user_id.to_string(), password_hash],
    )?;
    conn.execute(
        "DELETE FROM password_history
         WHERE user_id = ?1
           AND rowid NOT IN (
             SELECT rowid
             FROM password_history
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2
           );",
        params![user_id.to_string(), i64::from(keep.max(1))],
    )?;
    Ok(())
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<PasswordHistoryEntry> {
    Ok(PasswordHistoryEntry {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}
