//! Company team membership repository.
//!
//! # Invariants
//! - Exactly one `owner` per company; it only changes through
//!   `CompanyRepository::transfer_ownership`.

use crate::model::company::CompanyId;
use crate::model::team::{TeamMember, TeamRole};
use crate::model::user::UserId;
use crate::model::validation::ValidationError;
use crate::repo::support::{
    conflict_on_unique, ensure_active_company, ensure_active_user, ensure_connection_ready,
    enum_col, fetch_page, query_optional, require_changed, uuid_col, Filter, Page, PageRequest,
    RepoError, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row};

pub(crate) const TEAM_MEMBER_SELECT_SQL: &str = "SELECT
    tm.company_id,
    tm.user_id,
    tm.role,
    tm.joined_at,
    u.full_name,
    u.email
FROM team_members tm
JOIN users u ON u.id = tm.user_id";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "team_members",
        columns: &["company_id", "user_id", "role", "joined_at"],
    },
    RequiredTable {
        name: "users",
        columns: &["id", "full_name", "email"],
    },
];

pub trait TeamRepository {
    /// Adds a non-owner member. Existing members yield `Conflict`.
    fn add_member(&self, company_id: CompanyId, user_id: UserId, role: TeamRole)
        -> RepoResult<()>;
    /// The owner cannot be removed.
    fn remove_member(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<()>;
    /// Changes a non-owner member to a non-owner role.
    fn update_role(&self, company_id: CompanyId, user_id: UserId, role: TeamRole)
        -> RepoResult<()>;
    fn member_role(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<Option<TeamRole>>;
    /// Owner first, then by role rank and join time.
    fn list_members(&self, company_id: CompanyId, page: PageRequest) -> RepoResult<Page<TeamMember>>;
    fn count_members(&self, company_id: CompanyId) -> RepoResult<u64>;
}

#[derive(Debug)]
pub struct SqliteTeamRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTeamRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl TeamRepository for SqliteTeamRepository<'_> {
    fn add_member(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        role: TeamRole,
    ) -> RepoResult<()> {
        if role == TeamRole::Owner {
            return Err(ValidationError::Disallowed("role").into());
        }
        ensure_active_company(self.conn, company_id)?;
        ensure_active_user(self.conn, user_id)?;

        self.conn
            .execute(
                "INSERT INTO team_members (company_id, user_id, role) VALUES (?1, ?2, ?3);",
                params![company_id.to_string(), user_id.to_string(), role.as_str()],
            )
            .map_err(|err| conflict_on_unique(err, || "user is already a team member".to_string()))?;
        Ok(())
    }

    fn remove_member(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<()> {
        match self.member_role(company_id, user_id)? {
            None => Err(RepoError::NotFound {
                entity: "team member",
                id: user_id,
            }),
            Some(TeamRole::Owner) => Err(RepoError::Conflict(
                "the company owner cannot be removed".to_string(),
            )),
            Some(_) => {
                let changed = self.conn.execute(
                    "DELETE FROM team_members WHERE company_id = ?1 AND user_id = ?2;",
                    params![company_id.to_string(), user_id.to_string()],
                )?;
                require_changed(changed, "team member", user_id)
            }
        }
    }

    fn update_role(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        role: TeamRole,
    ) -> RepoResult<()> {
        if role == TeamRole::Owner {
            return Err(ValidationError::Disallowed("role").into());
        }
        let changed = self.conn.execute(
            "UPDATE team_members
             SET role = ?3
             WHERE company_id = ?1
               AND user_id = ?2
               AND role <> 'owner';",
            params![company_id.to_string(), user_id.to_string(), role.as_str()],
        )?;
        if changed == 0 && self.member_role(company_id, user_id)? == Some(TeamRole::Owner) {
            return Err(RepoError::Conflict(
                "the owner role changes only through ownership transfer".to_string(),
            ));
        }
        require_changed(changed, "team member", user_id)
    }

    fn member_role(&self, company_id: CompanyId, user_id: UserId) -> RepoResult<Option<TeamRole>> {
        query_optional(
            self.conn,
            "SELECT role FROM team_members WHERE company_id = ?1 AND user_id = ?2;",
            params![company_id.to_string(), user_id.to_string()],
            |row| enum_col(row, "role", TeamRole::parse),
        )
    }

    fn list_members(&self, company_id: CompanyId, page: PageRequest) -> RepoResult<Page<TeamMember>> {
        let mut filter = Filter::new();
        filter.text("tm.company_id = ?", &company_id.to_string());

        fetch_page(
            self.conn,
            TEAM_MEMBER_SELECT_SQL,
            "SELECT COUNT(*) FROM team_members tm JOIN users u ON u.id = tm.user_id",
            &filter,
            "CASE tm.role
                WHEN 'owner' THEN 0
                WHEN 'admin' THEN 1
                WHEN 'recruiter' THEN 2
                ELSE 3
             END ASC, tm.joined_at ASC, tm.user_id ASC",
            page,
            parse_team_member_row,
        )
    }

    fn count_members(&self, company_id: CompanyId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team_members WHERE company_id = ?1;",
            [company_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

pub(crate) fn parse_team_member_row(row: &Row<'_>) -> RepoResult<TeamMember> {
    Ok(TeamMember {
        company_id: uuid_col(row, "company_id")?,
        user_id: uuid_col(row, "user_id")?,
        role: enum_col(row, "role", TeamRole::parse)?,
        joined_at: row.get("joined_at")?,
        full_name: row.get("full_name")?,
        email: row.get("email")?,
    })
}
