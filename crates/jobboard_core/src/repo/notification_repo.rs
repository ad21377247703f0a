//! In-app notification repository.

use crate::model::engagement::Notification;
use crate::model::user::UserId;
use crate::repo::support::{
    bool_col, ensure_active_user, ensure_connection_ready, fetch_page, query_optional,
    require_changed, uuid_col, Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    kind,
    title,
    body,
    link,
    is_read,
    read_at,
    created_at
FROM notifications";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "notifications",
    columns: &["id", "user_id", "kind", "title", "is_read", "read_at", "created_at"],
}];

pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<Notification>;
    /// Newest first.
    fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> RepoResult<Page<Notification>>;
    fn count_unread(&self, user_id: UserId) -> RepoResult<u64>;
    /// Marking an already-read notification keeps its original `read_at`.
    fn mark_read(&self, id: Uuid) -> RepoResult<()>;
    /// Returns how many notifications changed.
    fn mark_all_read(&self, user_id: UserId) -> RepoResult<u64>;
    fn delete_notification(&self, id: Uuid) -> RepoResult<()>;
    /// Deletes notifications created before `cutoff_ms`; returns how many.
    fn delete_older_than(&self, cutoff_ms: i64) -> RepoResult<u64>;
}

#[derive(Debug)]
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<Notification> {
        notification.validate()?;
        ensure_active_user(self.conn, notification.user_id)?;

        self.conn.execute(
            "INSERT INTO notifications (id, user_id, kind, title, body, link)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.trim(),
                notification.title.trim(),
                notification.body,
                notification.link,
            ],
        )?;

        query_optional(
            self.conn,
            &format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"),
            [notification.id.to_string()],
            parse_notification_row,
        )?
        .ok_or(RepoError::NotFound {
            entity: "notification",
            id: notification.id,
        })
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> RepoResult<Page<Notification>> {
        let mut filter = Filter::new();
        filter.text("user_id = ?", &user_id.to_string());
        if unread_only {
            filter.raw("is_read = 0");
        }

        fetch_page(
            self.conn,
            NOTIFICATION_SELECT_SQL,
            "SELECT COUNT(*) FROM notifications",
            &filter,
            "created_at DESC, rowid DESC",
            page,
            parse_notification_row,
        )
    }

    fn count_unread(&self, user_id: UserId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0;",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn mark_read(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1,
                 read_at = COALESCE(read_at, (CAST(unixepoch('subsec') * 1000 AS INTEGER)))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "notification", id)
    }

    fn mark_all_read(&self, user_id: UserId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1,
                 read_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE user_id = ?1
               AND is_read = 0;",
            [user_id.to_string()],
        )?;
        Ok(changed as u64)
    }

    fn delete_notification(&self, id: Uuid) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1;", [id.to_string()])?;
        require_changed(changed, "notification", id)
    }

    fn delete_older_than(&self, cutoff_ms: i64) -> RepoResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM notifications WHERE created_at < ?1;",
            [cutoff_ms],
        )?;
        info!(
            "event=notification_prune module=repo status=ok count={}",
            deleted
        );
        Ok(deleted as u64)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    Ok(Notification {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        kind: row.get("kind")?,
        title: row.get("title")?,
        body: row.get("body")?,
        link: row.get("link")?,
        is_read: bool_col(row, "is_read")?,
        read_at: row.get("read_at")?,
        created_at: row.get("created_at")?,
    })
}
