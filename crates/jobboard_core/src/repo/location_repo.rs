//! Company location repository.
//!
//! # Invariants
//! - A company with at least one location has exactly one headquarters.
//! - The first location added becomes the headquarters.
//! - Deleting the headquarters promotes the oldest remaining location.

use crate::model::company::{CompanyId, CompanyLocation};
use crate::repo::support::{
    bool_col, bool_to_int, ensure_active_company, ensure_connection_ready, exists,
    query_optional, query_rows, require_changed, uuid_col, RepoError, RepoResult, RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const LOCATION_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    label,
    address,
    city,
    region,
    country,
    postal_code,
    is_headquarters,
    created_at
FROM company_locations";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "company_locations",
    columns: &[
        "id",
        "company_id",
        "label",
        "city",
        "country",
        "is_headquarters",
        "created_at",
    ],
}];

pub trait LocationRepository {
    /// Adds a location; `is_headquarters` on the input moves the flag to it.
    fn add_location(&self, location: &CompanyLocation) -> RepoResult<CompanyLocation>;
    fn get_location(&self, id: Uuid) -> RepoResult<Option<CompanyLocation>>;
    /// Updates address fields; the headquarters flag is untouched.
    fn update_location(&self, location: &CompanyLocation) -> RepoResult<()>;
    /// Headquarters first, then oldest first.
    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CompanyLocation>>;
    fn delete_location(&self, id: Uuid) -> RepoResult<()>;
    fn get_headquarters(&self, company_id: CompanyId) -> RepoResult<Option<CompanyLocation>>;
    fn set_headquarters(&self, company_id: CompanyId, location_id: Uuid) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn add_location(&self, location: &CompanyLocation) -> RepoResult<CompanyLocation> {
        location.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_company(&tx, location.company_id)?;
        let has_locations = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM company_locations WHERE company_id = ?1);",
            [location.company_id.to_string()],
        )?;
        let is_headquarters = location.is_headquarters || !has_locations;
        if is_headquarters {
            tx.execute(
                "UPDATE company_locations SET is_headquarters = 0 WHERE company_id = ?1;",
                [location.company_id.to_string()],
            )?;
        }

        tx.execute(
            "INSERT INTO company_locations (
                id,
                company_id,
                label,
                address,
                city,
                region,
                country,
                postal_code,
                is_headquarters
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                location.id.to_string(),
                location.company_id.to_string(),
                location.label.trim(),
                location.address,
                location.city.trim(),
                location.region,
                location.country.trim(),
                location.postal_code,
                bool_to_int(is_headquarters),
            ],
        )?;
        tx.commit()?;

        self.get_location(location.id)?.ok_or(RepoError::NotFound {
            entity: "location",
            id: location.id,
        })
    }

    fn get_location(&self, id: Uuid) -> RepoResult<Option<CompanyLocation>> {
        query_optional(
            self.conn,
            &format!("{LOCATION_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            parse_location_row,
        )
    }

    fn update_location(&self, location: &CompanyLocation) -> RepoResult<()> {
        location.validate()?;
        let changed = self.conn.execute(
            "UPDATE company_locations
             SET label = ?2,
                 address = ?3,
                 city = ?4,
                 region = ?5,
                 country = ?6,
                 postal_code = ?7
             WHERE id = ?1;",
            params![
                location.id.to_string(),
                location.label.trim(),
                location.address,
                location.city.trim(),
                location.region,
                location.country.trim(),
                location.postal_code,
            ],
        )?;
        require_changed(changed, "location", location.id)
    }

    fn list_for_company(&self, company_id: CompanyId) -> RepoResult<Vec<CompanyLocation>> {
        query_rows(
            self.conn,
            &format!(
                "{LOCATION_SELECT_SQL}
                 WHERE company_id = ?1
                 ORDER BY is_headquarters DESC, created_at ASC, rowid ASC;"
            ),
            [company_id.to_string()],
            parse_location_row,
        )
    }

    fn delete_location(&self, id: Uuid) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let target: Option<(String, i64)> = tx
            .query_row(
                "SELECT company_id, is_headquarters FROM company_locations WHERE id = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((company_id, was_headquarters)) = target else {
            return Err(RepoError::NotFound {
                entity: "location",
                id,
            });
        };

        tx.execute("DELETE FROM company_locations WHERE id = ?1;", [id.to_string()])?;
        if was_headquarters == 1 {
            tx.execute(
                "UPDATE company_locations
                 SET is_headquarters = 1
                 WHERE id = (
                     SELECT id
                     FROM company_locations
                     WHERE company_id = ?1
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT 1
                 );",
                [company_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_headquarters(&self, company_id: CompanyId) -> RepoResult<Option<CompanyLocation>> {
        query_optional(
            self.conn,
            &format!("{LOCATION_SELECT_SQL} WHERE company_id = ?1 AND is_headquarters = 1;"),
            [company_id.to_string()],
            parse_location_row,
        )
    }

    fn set_headquarters(&self, company_id: CompanyId, location_id: Uuid) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let belongs = exists(
            &tx,
            "SELECT EXISTS(
                SELECT 1 FROM company_locations WHERE id = ?1 AND company_id = ?2
            );",
            params![location_id.to_string(), company_id.to_string()],
        )?;
        if !belongs {
            return Err(RepoError::NotFound {
                entity: "location",
                id: location_id,
            });
        }

        tx.execute(
            "UPDATE company_locations
             SET is_headquarters = CASE WHEN id = ?2 THEN 1 ELSE 0 END
             WHERE company_id = ?1;",
            params![company_id.to_string(), location_id.to_string()],
        )?;
        tx.commit()?;

        info!(
            "event=location_set_headquarters module=repo status=ok company_id={}",
            company_id
        );
        Ok(())
    }
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<CompanyLocation> {
    Ok(CompanyLocation {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        label: row.get("label")?,
        address: row.get("address")?,
        city: row.get("city")?,
        region: row.get("region")?,
        country: row.get("country")?,
        postal_code: row.get("postal_code")?,
        is_headquarters: bool_col(row, "is_headquarters")?,
        created_at: row.get("created_at")?,
    })
}
