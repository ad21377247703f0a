//! Board-wide key/value settings edited from the admin console.

use crate::model::account::{validate_setting_key, AdminSetting};
use crate::model::user::UserId;
use crate::model::validation::optional_text;
use crate::repo::support::{
    ensure_connection_ready, opt_uuid_col, query_optional, query_rows, RepoError, RepoResult,
    RequiredTable,
};
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

const SETTING_SELECT_SQL: &str = "SELECT key, value, description, updated_by, updated_at
FROM admin_settings";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "admin_settings",
    columns: &["key", "value", "description", "updated_by", "updated_at"],
}];

pub trait AdminSettingsRepository {
    fn get_setting(&self, key: &str) -> RepoResult<Option<AdminSetting>>;
    /// Sorted by key.
    fn list_settings(&self) -> RepoResult<Vec<AdminSetting>>;
    /// Inserts or replaces a value. `description` is kept when `None`.
    fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
        updated_by: Option<UserId>,
    ) -> RepoResult<AdminSetting>;
    /// Returns whether a setting was removed.
    fn delete_setting(&self, key: &str) -> RepoResult<bool>;
}

#[derive(Debug)]
pub struct SqliteAdminSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAdminSettingsRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    /// Reads and parses a setting; `Ok(None)` when unset.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> RepoResult<Option<T>> {
        match self.get_setting(key)? {
            None => Ok(None),
            Some(setting) => setting.value.trim().parse().map(Some).map_err(|_| {
                RepoError::InvalidData(format!(
                    "setting `{key}` holds unparsable value `{}`",
                    setting.value
                ))
            }),
        }
    }

    /// Reads a setting, falling back to `default` when unset.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> RepoResult<T> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }
}

impl AdminSettingsRepository for SqliteAdminSettingsRepository<'_> {
    fn get_setting(&self, key: &str) -> RepoResult<Option<AdminSetting>> {
        query_optional(
            self.conn,
            &format!("{SETTING_SELECT_SQL} WHERE key = ?1;"),
            [key],
            parse_setting_row,
        )
    }

    fn list_settings(&self) -> RepoResult<Vec<AdminSetting>> {
        query_rows(
            self.conn,
            &format!("{SETTING_SELECT_SQL} ORDER BY key ASC;"),
            [],
            parse_setting_row,
        )
    }

    fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
        updated_by: Option<UserId>,
    ) -> RepoResult<AdminSetting> {
        validate_setting_key(key)?;
        optional_text("description", description, 500)?;

        self.conn.execute(
            "INSERT INTO admin_settings (key, value, description, updated_by)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, admin_settings.description),
                updated_by = excluded.updated_by,
                updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER));",
            params![
                key,
                value,
                description,
                updated_by.map(|id| id.to_string())
            ],
        )?;

        self.get_setting(key)?
            .ok_or_else(|| RepoError::InvalidData(format!("setting `{key}` vanished after write")))
    }

    fn delete_setting(&self, key: &str) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM admin_settings WHERE key = ?1;", [key])?;
        Ok(removed > 0)
    }
}

fn parse_setting_row(row: &Row<'_>) -> RepoResult<AdminSetting> {
    Ok(AdminSetting {
        key: row.get("key")?,
        value: row.get("value")?,
        description: row.get("description")?,
        updated_by: opt_uuid_col(row, "updated_by")?,
        updated_at: row.get("updated_at")?,
    })
}
