//! Company media gallery repository.
//!
//! # Invariants
//! - `sort_order` is dense (`0..n`) after `reorder`; `add_media` appends.

use crate::model::company::{CompanyId, CompanyMedia, MediaKind};
use crate::repo::support::{
    ensure_active_company, ensure_connection_ready, enum_col, query_optional, query_rows,
    require_changed, uuid_col, RepoError, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use uuid::Uuid;

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "company_media",
    columns: &["id", "company_id", "kind", "url", "caption", "sort_order"],
}];

pub trait MediaRepository {
    /// Appends at the end of the company gallery; returns the stored record.
    fn add_media(&self, media: &CompanyMedia) -> RepoResult<CompanyMedia>;
    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CompanyMedia>>;
    fn delete_media(&self, id: Uuid) -> RepoResult<()>;
    /// Rewrites positions from `ordered_ids`, which must list every media
    /// item of the company exactly once.
    fn reorder(&self, company_id: CompanyId, ordered_ids: &[Uuid]) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteMediaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMediaRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl MediaRepository for SqliteMediaRepository<'_> {
    fn add_media(&self, media: &CompanyMedia) -> RepoResult<CompanyMedia> {
        media.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_company(&tx, media.company_id)?;
        let next_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM company_media WHERE company_id = ?1;",
            [media.company_id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO company_media (id, company_id, kind, url, caption, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                media.id.to_string(),
                media.company_id.to_string(),
                media.kind.as_str(),
                media.url.trim(),
                media.caption,
                next_order,
            ],
        )?;
        let stored = query_optional(
            &tx,
            "SELECT id, company_id, kind, url, caption, sort_order, created_at
             FROM company_media
             WHERE id = ?1;",
            [media.id.to_string()],
            parse_media_row,
        )?
        .ok_or(RepoError::NotFound {
            entity: "media",
            id: media.id,
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CompanyMedia>> {
        query_rows(
            self.conn,
            "SELECT id, company_id, kind, url, caption, sort_order, created_at
             FROM company_media
             WHERE company_id = ?1
             ORDER BY sort_order ASC, id ASC;",
            [company_id.to_string()],
            parse_media_row,
        )
    }

    fn delete_media(&self, id: Uuid) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM company_media WHERE id = ?1;", [id.to_string()])?;
        require_changed(changed, "media", id)
    }

    fn reorder(&self, company_id: CompanyId, ordered_ids: &[Uuid]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current: HashSet<String> = query_rows(
            &tx,
            "SELECT id FROM company_media WHERE company_id = ?1;",
            [company_id.to_string()],
            |row| Ok(row.get::<_, String>("id")?),
        )?
        .into_iter()
        .collect();
        let requested: HashSet<String> = ordered_ids.iter().map(Uuid::to_string).collect();
        if requested.len() != ordered_ids.len() || requested != current {
            return Err(RepoError::Conflict(
                "reorder must list every media item of the company exactly once".to_string(),
            ));
        }

        for (position, id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE company_media SET sort_order = ?2 WHERE id = ?1;",
                params![id.to_string(), position as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_media_row(row: &Row<'_>) -> RepoResult<CompanyMedia> {
    Ok(CompanyMedia {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        kind: enum_col(row, "kind", MediaKind::parse)?,
        url: row.get("url")?,
        caption: row.get("caption")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
    })
}
