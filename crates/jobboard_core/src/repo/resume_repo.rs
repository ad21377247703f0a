//! Candidate resume repository.
//!
//! # Invariants
//! - A user with at least one resume has exactly one primary resume.
//! - The first upload becomes primary; deleting the primary promotes the
//!   newest remaining resume.

use crate::model::profile::Resume;
use crate::model::user::UserId;
use crate::repo::support::{
    bool_col, bool_to_int, ensure_active_user, ensure_connection_ready, exists, query_optional,
    query_rows, uuid_col, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const RESUME_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    file_url,
    file_name,
    file_size,
    content_type,
    is_primary,
    created_at,
    updated_at
FROM resumes";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "resumes",
    columns: &["id", "user_id", "file_url", "file_size", "is_primary"],
}];

pub trait ResumeRepository {
    fn create_resume(&self, resume: &Resume) -> RepoResult<Resume>;
    fn get_resume(&self, id: Uuid) -> RepoResult<Option<Resume>>;
    /// Primary first, then newest first.
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Resume>>;
    fn get_primary(&self, user_id: UserId) -> RepoResult<Option<Resume>>;
    fn set_primary(&self, user_id: UserId, resume_id: Uuid) -> RepoResult<()>;
    fn delete_resume(&self, user_id: UserId, resume_id: Uuid) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteResumeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteResumeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ResumeRepository for SqliteResumeRepository<'_> {
    fn create_resume(&self, resume: &Resume) -> RepoResult<Resume> {
        resume.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_user(&tx, resume.user_id)?;
        let has_resumes = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM resumes WHERE user_id = ?1);",
            [resume.user_id.to_string()],
        )?;
        let is_primary = resume.is_primary || !has_resumes;
        if is_primary {
            tx.execute(
                "UPDATE resumes SET is_primary = 0 WHERE user_id = ?1;",
                [resume.user_id.to_string()],
            )?;
        }

        tx.execute(
            "INSERT INTO resumes (
                id,
                user_id,
                title,
                file_url,
                file_name,
                file_size,
                content_type,
                is_primary
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                resume.id.to_string(),
                resume.user_id.to_string(),
                resume.title.trim(),
                resume.file_url.trim(),
                resume.file_name.trim(),
                resume.file_size,
                resume.content_type.trim(),
                bool_to_int(is_primary),
            ],
        )?;
        tx.commit()?;

        self.get_resume(resume.id)?.ok_or(RepoError::NotFound {
            entity: "resume",
            id: resume.id,
        })
    }

    fn get_resume(&self, id: Uuid) -> RepoResult<Option<Resume>> {
        query_optional(
            self.conn,
            &format!("{RESUME_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            parse_resume_row,
        )
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Resume>> {
        query_rows(
            self.conn,
            &format!(
                "{RESUME_SELECT_SQL}
                 WHERE user_id = ?1
                 ORDER BY is_primary DESC, created_at DESC, rowid DESC;"
            ),
            [user_id.to_string()],
            parse_resume_row,
        )
    }

    fn get_primary(&self, user_id: UserId) -> RepoResult<Option<Resume>> {
        query_optional(
            self.conn,
            &format!("{RESUME_SELECT_SQL} WHERE user_id = ?1 AND is_primary = 1;"),
            [user_id.to_string()],
            parse_resume_row,
        )
    }

    fn set_primary(&self, user_id: UserId, resume_id: Uuid) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let owned = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM resumes WHERE id = ?1 AND user_id = ?2);",
            params![resume_id.to_string(), user_id.to_string()],
        )?;
        if !owned {
            return Err(RepoError::NotFound {
                entity: "resume",
                id: resume_id,
            });
        }

        tx.execute(
            "UPDATE resumes
             SET is_primary = CASE WHEN id = ?2 THEN 1 ELSE 0 END,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE user_id = ?1;",
            params![user_id.to_string(), resume_id.to_string()],
        )?;
        tx.commit()?;

        info!("event=resume_set_primary module=repo status=ok");
        Ok(())
    }

    fn delete_resume(&self, user_id: UserId, resume_id: Uuid) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let was_primary: Option<i64> = tx
            .query_row(
                "SELECT is_primary FROM resumes WHERE id = ?1 AND user_id = ?2;",
                params![resume_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(was_primary) = was_primary else {
            return Err(RepoError::NotFound {
                entity: "resume",
                id: resume_id,
            });
        };

        tx.execute("DELETE FROM resumes WHERE id = ?1;", [resume_id.to_string()])?;
        if was_primary == 1 {
            tx.execute(
                "UPDATE resumes
                 SET is_primary = 1
                 WHERE id = (
                     SELECT id
                     FROM resumes
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1
                 );",
                [user_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_resume_row(row: &Row<'_>) -> RepoResult<Resume> {
    Ok(Resume {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        title: row.get("title")?,
        file_url: row.get("file_url")?,
        file_name: row.get("file_name")?,
        file_size: row.get("file_size")?,
        content_type: row.get("content_type")?,
        is_primary: bool_col(row, "is_primary")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
