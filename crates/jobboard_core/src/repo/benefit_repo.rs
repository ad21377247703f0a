//! Company benefit repository.

use crate::model::company::{Benefit, CompanyId};
use crate::repo::support::{
    ensure_active_company, ensure_connection_ready, query_rows, require_changed, uuid_col,
    RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "company_benefits",
    columns: &["id", "company_id", "name", "description", "category", "created_at"],
}];

pub trait BenefitRepository {
    fn add_benefit(&self, benefit: &Benefit) -> RepoResult<Uuid>;
    /// Grouped by category, then by name. `category` matches case-insensitively.
    fn list_for_company(
        &self,
        company_id: CompanyId,
        category: Option<&str>,
    ) -> RepoResult<Vec<Benefit>>;
    fn delete_benefit(&self, id: Uuid) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteBenefitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBenefitRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl BenefitRepository for SqliteBenefitRepository<'_> {
    fn add_benefit(&self, benefit: &Benefit) -> RepoResult<Uuid> {
        benefit.validate()?;
        ensure_active_company(self.conn, benefit.company_id)?;

        self.conn.execute(
            "INSERT INTO company_benefits (id, company_id, name, description, category)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                benefit.id.to_string(),
                benefit.company_id.to_string(),
                benefit.name.trim(),
                benefit.description,
                benefit.category.as_deref().map(str::trim),
            ],
        )?;
        Ok(benefit.id)
    }

    fn list_for_company(
        &self,
        company_id: CompanyId,
        category: Option<&str>,
    ) -> RepoResult<Vec<Benefit>> {
        query_rows(
            self.conn,
            "SELECT id, company_id, name, description, category, created_at
             FROM company_benefits
             WHERE company_id = ?1
               AND (?2 IS NULL OR category = ?2 COLLATE NOCASE)
             ORDER BY COALESCE(category, '') ASC, name COLLATE NOCASE ASC, id ASC;",
            params![company_id.to_string(), category.map(str::trim)],
            parse_benefit_row,
        )
    }

    fn delete_benefit(&self, id: Uuid) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM company_benefits WHERE id = ?1;", [id.to_string()])?;
        require_changed(changed, "benefit", id)
    }
}

fn parse_benefit_row(row: &Row<'_>) -> RepoResult<Benefit> {
    Ok(Benefit {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category: row.get("category")?,
        created_at: row.get("created_at")?,
    })
}
