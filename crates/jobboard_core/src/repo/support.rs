//! Shared repository plumbing.
//!
//! # Responsibility
//! - Define the error type every repository returns.
//! - Build filtered, paginated queries from optional filter fields.
//! - Guard repositories against unmigrated or foreign schemas.
//!
//! # Invariants
//! - Page limits are clamped to `1..=MAX_PAGE_SIZE`.
//! - List totals are counted with exactly the filter used for the page.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::validation::{slugify, ValidationError};
use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, Params, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
const MAX_SLUG_SUFFIX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Input record failed validation; nothing was written.
    Validation(ValidationError),
    Db(DbError),
    /// Target row does not exist (or is tombstoned).
    NotFound { entity: &'static str, id: Uuid },
    /// Write would violate a uniqueness or state rule.
    Conflict(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Maps unique/primary-key violations to [`RepoError::Conflict`].
pub(crate) fn conflict_on_unique(
    err: rusqlite::Error,
    message: impl FnOnce() -> String,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            RepoError::Conflict(message())
        }
        _ => err.into(),
    }
}

/// Pagination input. A missing or zero limit means [`DEFAULT_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    pub fn effective_limit(&self) -> u32 {
        normalize_page_limit(self.limit)
    }
}

pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(value) if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        Some(value) => value,
    }
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.items.len() as u64) < self.total
    }
}

/// Accumulates `AND`-joined WHERE clauses with positional (`?`) binds.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    binds: Vec<Value>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a clause with no bind parameters.
    pub(crate) fn raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    /// Adds a clause containing exactly one `?`.
    pub(crate) fn text(&mut self, clause: &str, value: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.binds.push(Value::Text(value.to_string()));
        self
    }

    /// Adds a clause containing exactly one `?`.
    pub(crate) fn int(&mut self, clause: &str, value: i64) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.binds.push(Value::Integer(value));
        self
    }

    /// Case-insensitive substring match over any of `columns`.
    /// Blank needles add nothing.
    pub(crate) fn search(&mut self, columns: &[&str], needle: &str) -> &mut Self {
        let needle = needle.trim();
        if needle.is_empty() || columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        let clause = columns
            .iter()
            .map(|column| format!("LOWER({column}) LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({clause})"));
        for _ in columns {
            self.binds.push(Value::Text(pattern.clone()));
        }
        self
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn binds(&self) -> &[Value] {
        &self.binds
    }
}

/// Runs `COUNT(*)` and a `LIMIT/OFFSET` select sharing one filter.
///
/// `select_sql` and `count_sql` must end at their FROM/JOIN part.
pub(crate) fn fetch_page<T>(
    conn: &Connection,
    select_sql: &str,
    count_sql: &str,
    filter: &Filter,
    order_by: &str,
    page: PageRequest,
    mut map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    let where_sql = filter.where_sql();
    let total: i64 = conn.query_row(
        &format!("{count_sql}{where_sql};"),
        params_from_iter(filter.binds()),
        |row| row.get(0),
    )?;

    let limit = page.effective_limit();
    let mut binds = filter.binds().to_vec();
    binds.push(Value::Integer(i64::from(limit)));
    binds.push(Value::Integer(i64::from(page.offset)));

    let mut stmt = conn.prepare(&format!(
        "{select_sql}{where_sql} ORDER BY {order_by} LIMIT ? OFFSET ?;"
    ))?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(map_row(row)?);
    }

    Ok(Page {
        items,
        total: u64::try_from(total).unwrap_or(0),
        limit,
        offset: page.offset,
    })
}

/// Collects all rows of `sql` through `map_row`.
pub(crate) fn query_rows<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    mut map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(map_row(row)?);
    }
    Ok(items)
}

/// Returns the first row of `sql` through `map_row`, if any.
pub(crate) fn query_optional<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map_row: impl FnOnce(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map_row(row)?)),
        None => Ok(None),
    }
}

/// Runs a `SELECT <column>, COUNT(*) AS total ... GROUP BY <column>` query
/// and returns one zero-filled entry per value of `all`, in `all` order.
pub(crate) fn grouped_counts<T: Copy + PartialEq, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
    all: &[T],
) -> RepoResult<Vec<(T, u64)>> {
    let counted = query_rows(conn, sql, params, |row| {
        let value = enum_col(row, column, parse)?;
        let total: i64 = row.get("total")?;
        Ok((value, u64::try_from(total).unwrap_or(0)))
    })?;

    Ok(all
        .iter()
        .map(|value| {
            let total = counted
                .iter()
                .find(|(counted_value, _)| counted_value == value)
                .map_or(0, |(_, total)| *total);
            (*value, total)
        })
        .collect())
}

/// Evaluates a `SELECT EXISTS(...)` query.
pub(crate) fn exists<P: Params>(conn: &Connection, sql: &str, params: P) -> RepoResult<bool> {
    let value: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(value == 1)
}

pub(crate) fn ensure_active_user(conn: &Connection, user_id: Uuid) -> RepoResult<()> {
    let found = exists(
        conn,
        "SELECT EXISTS(
            SELECT 1 FROM users WHERE id = ?1 AND is_deleted = 0 AND is_active = 1
        );",
        [user_id.to_string()],
    )?;
    if !found {
        return Err(RepoError::NotFound {
            entity: "user",
            id: user_id,
        });
    }
    Ok(())
}

pub(crate) fn ensure_active_company(conn: &Connection, company_id: Uuid) -> RepoResult<()> {
    let found = exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM companies WHERE id = ?1 AND is_deleted = 0);",
        [company_id.to_string()],
    )?;
    if !found {
        return Err(RepoError::NotFound {
            entity: "company",
            id: company_id,
        });
    }
    Ok(())
}

/// Fails with `NotFound` when an UPDATE/DELETE touched nothing.
pub(crate) fn require_changed(changed: usize, entity: &'static str, id: Uuid) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity, id });
    }
    Ok(())
}

pub(crate) fn uuid_col(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, column: &'static str) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_uuid(&text, column))
        .transpose()
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn bool_col(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    let text: String = row.get(column)?;
    parse(&text).ok_or_else(|| RepoError::InvalidData(format!("invalid value `{text}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Escapes `%`, `_` and the escape char itself for `LIKE ... ESCAPE '\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Picks a free slug in `table.slug` derived from `text`, appending `-2`,
/// `-3`, ... on collision.
pub(crate) fn unique_slug(
    conn: &Connection,
    table: &'static str,
    text: &str,
    fallback: &str,
) -> RepoResult<String> {
    let base = slugify(text).unwrap_or_else(|| fallback.to_string());
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE slug = ?1);");
    if !exists(conn, &sql, [base.as_str()])? {
        return Ok(base);
    }
    for suffix in 2..=MAX_SLUG_SUFFIX {
        let candidate = format!("{base}-{suffix}");
        if !exists(conn, &sql, [candidate.as_str()])? {
            return Ok(candidate);
        }
    }
    Ok(format!("{base}-{}", Uuid::new_v4().simple()))
}

/// Unguessable token for invitation and newsletter links.
pub(crate) fn new_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Current wall-clock time in epoch milliseconds.
pub fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Table a repository reads or writes, with the columns it depends on.
pub(crate) struct RequiredTable {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Rejects connections that are unmigrated or missing required schema.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[RequiredTable],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table.name)? {
            return Err(RepoError::MissingRequiredTable(table.name));
        }
        let present = table_columns(conn, table.name)?;
        for column in table.columns {
            if !present.iter().any(|name| name == column) {
                return Err(RepoError::MissingRequiredColumn {
                    table: table.name,
                    column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    exists(
        conn,
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
    )
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    query_rows(
        conn,
        &format!("PRAGMA table_info({table});"),
        [],
        |row| Ok(row.get::<_, String>(1)?),
    )
}

#[cfg(test)]
mod tests {
    use super::{escape_like, normalize_page_limit, Filter, Page, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

    #[test]
    fn page_limit_defaults_and_clamps() {
        assert_eq!(normalize_page_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(normalize_page_limit(Some(0)), DEFAULT_PAGE_SIZE);
        assert_eq!(normalize_page_limit(Some(7)), 7);
        assert_eq!(normalize_page_limit(Some(5_000)), MAX_PAGE_SIZE);
    }

    #[test]
    fn escape_like_protects_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn filter_joins_clauses_and_skips_blank_search() {
        let mut filter = Filter::new();
        filter
            .raw("is_deleted = 0")
            .text("role = ?", "candidate")
            .search(&["full_name", "email"], "   ");
        assert_eq!(filter.where_sql(), " WHERE is_deleted = 0 AND role = ?");
        assert_eq!(filter.binds().len(), 1);

        filter.search(&["full_name", "email"], "Ann");
        assert!(filter.where_sql().ends_with(
            "(LOWER(full_name) LIKE ? ESCAPE '\\' OR LOWER(email) LIKE ? ESCAPE '\\')"
        ));
        assert_eq!(filter.binds().len(), 3);
    }

    #[test]
    fn has_more_compares_against_total() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            limit: 2,
            offset: 2,
        };
        assert!(page.has_more());
        let last = Page {
            items: vec![5],
            total: 5,
            limit: 2,
            offset: 4,
        };
        assert!(!last.has_more());
    }
}
