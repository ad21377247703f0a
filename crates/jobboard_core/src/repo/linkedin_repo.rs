//! LinkedIn account link repository.
//!
//! One connection per user; a LinkedIn member id links to at most one user.

use crate::model::engagement::LinkedInConnection;
use crate::model::user::UserId;
use crate::model::validation::{optional_text, require_text};
use crate::repo::support::{
    conflict_on_unique, ensure_active_user, ensure_connection_ready, query_optional, query_rows,
    require_changed, uuid_col, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row};

const LINKEDIN_SELECT_SQL: &str = "SELECT
    user_id,
    member_id,
    access_token,
    refresh_token,
    token_expires_at,
    profile_url,
    connected_at,
    last_synced_at
FROM linkedin_connections";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "linkedin_connections",
    columns: &[
        "user_id",
        "member_id",
        "access_token",
        "refresh_token",
        "token_expires_at",
        "last_synced_at",
    ],
}];

pub trait LinkedInRepository {
    /// Creates or replaces the user's connection.
    fn upsert_connection(&self, connection: &LinkedInConnection)
        -> RepoResult<LinkedInConnection>;
    fn get_for_user(&self, user_id: UserId) -> RepoResult<Option<LinkedInConnection>>;
    fn get_by_member_id(&self, member_id: &str) -> RepoResult<Option<LinkedInConnection>>;
    /// A `None` refresh token keeps the stored one.
    fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: i64,
    ) -> RepoResult<()>;
    fn mark_synced(&self, user_id: UserId, synced_at: i64) -> RepoResult<()>;
    /// Returns `true` when a connection was removed.
    fn disconnect(&self, user_id: UserId) -> RepoResult<bool>;
    /// Connections whose token expires before `cutoff_ms`, soonest first.
    fn list_expiring_before(&self, cutoff_ms: i64) -> RepoResult<Vec<LinkedInConnection>>;
}

#[derive(Debug)]
pub struct SqliteLinkedInRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkedInRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl LinkedInRepository for SqliteLinkedInRepository<'_> {
    fn upsert_connection(
        &self,
        connection: &LinkedInConnection,
    ) -> RepoResult<LinkedInConnection> {
        connection.validate()?;
        ensure_active_user(self.conn, connection.user_id)?;

        self.conn
            .execute(
                "INSERT INTO linkedin_connections (
                    user_id,
                    member_id,
                    access_token,
                    refresh_token,
                    token_expires_at,
                    profile_url
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (user_id) DO UPDATE SET
                    member_id = excluded.member_id,
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    token_expires_at = excluded.token_expires_at,
                    profile_url = excluded.profile_url,
                    connected_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER));",
                params![
                    connection.user_id.to_string(),
                    connection.member_id.trim(),
                    connection.access_token,
                    connection.refresh_token,
                    connection.token_expires_at,
                    connection.profile_url,
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || {
                    "LinkedIn account is linked to another user".to_string()
                })
            })?;
        info!("event=linkedin_connect module=repo status=ok");

        self.get_for_user(connection.user_id)?
            .ok_or(RepoError::NotFound {
                entity: "linkedin connection",
                id: connection.user_id,
            })
    }

    fn get_for_user(&self, user_id: UserId) -> RepoResult<Option<LinkedInConnection>> {
        query_optional(
            self.conn,
            &format!("{LINKEDIN_SELECT_SQL} WHERE user_id = ?1;"),
            [user_id.to_string()],
            parse_connection_row,
        )
    }

    fn get_by_member_id(&self, member_id: &str) -> RepoResult<Option<LinkedInConnection>> {
        query_optional(
            self.conn,
            &format!("{LINKEDIN_SELECT_SQL} WHERE member_id = ?1;"),
            [member_id.trim()],
            parse_connection_row,
        )
    }

    fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: i64,
    ) -> RepoResult<()> {
        require_text("access_token", access_token, 4096)?;
        optional_text("refresh_token", refresh_token, 4096)?;

        let changed = self.conn.execute(
            "UPDATE linkedin_connections
             SET access_token = ?2,
                 refresh_token = COALESCE(?3, refresh_token),
                 token_expires_at = ?4
             WHERE user_id = ?1;",
            params![user_id.to_string(), access_token, refresh_token, token_expires_at],
        )?;
        require_changed(changed, "linkedin connection", user_id)
    }

    fn mark_synced(&self, user_id: UserId, synced_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE linkedin_connections SET last_synced_at = ?2 WHERE user_id = ?1;",
            params![user_id.to_string(), synced_at],
        )?;
        require_changed(changed, "linkedin connection", user_id)
    }

    fn disconnect(&self, user_id: UserId) -> RepoResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM linkedin_connections WHERE user_id = ?1;",
            [user_id.to_string()],
        )?;
        if deleted == 1 {
            info!("event=linkedin_disconnect module=repo status=ok");
        }
        Ok(deleted == 1)
    }

    fn list_expiring_before(&self, cutoff_ms: i64) -> RepoResult<Vec<LinkedInConnection>> {
        query_rows(
            self.conn,
            &format!(
                "{LINKEDIN_SELECT_SQL}
                 WHERE token_expires_at < ?1
                 ORDER BY token_expires_at ASC, user_id ASC;"
            ),
            [cutoff_ms],
            parse_connection_row,
        )
    }
}

fn parse_connection_row(row: &Row<'_>) -> RepoResult<LinkedInConnection> {
    Ok(LinkedInConnection {
        user_id: uuid_col(row, "user_id")?,
        member_id: row.get("member_id")?,
        access_token: row.get("access_token")?,
        refresh_token: row.get("refresh_token")?,
        token_expires_at: row.get("token_expires_at")?,
        profile_url: row.get("profile_url")?,
        connected_at: row.get("connected_at")?,
        last_synced_at: row.get("last_synced_at")?,
    })
}
