//! Team invitation repository.
//!
//! # Responsibility
//! - Issue tokenized invitations and turn accepted ones into team members.
//!
//! # Invariants
//! - Only `pending` invitations change status.
//! - An invitation is accepted at most once, by the invited email address.

use crate::model::company::CompanyId;
use crate::model::team::{Invitation, InvitationStatus, NewInvitation, TeamMember, TeamRole};
use crate::model::user::UserId;
use crate::repo::support::{
    conflict_on_unique, current_epoch_ms, ensure_active_company, ensure_active_user,
    ensure_connection_ready, enum_col, exists, fetch_page, new_token, query_optional,
    uuid_col, Filter, Page, PageRequest, RepoError, RepoResult, RequiredTable,
};
use crate::repo::team_repo::{parse_team_member_row, TEAM_MEMBER_SELECT_SQL};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const INVITATION_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    email,
    role,
    token,
    invited_by,
    status,
    expires_at,
    responded_at,
    created_at
FROM invitations";

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "invitations",
        columns: &[
            "id",
            "company_id",
            "email",
            "role",
            "token",
            "status",
            "expires_at",
            "responded_at",
        ],
    },
    RequiredTable {
        name: "team_members",
        columns: &["company_id", "user_id", "role"],
    },
];

pub trait InvitationRepository {
    /// Issues a pending invitation expiring `ttl_ms` from now.
    fn create_invitation(&self, invitation: &NewInvitation) -> RepoResult<Invitation>;
    fn get_by_token(&self, token: &str) -> RepoResult<Option<Invitation>>;
    /// Newest first.
    fn list_for_company(
        &self,
        company_id: CompanyId,
        status: Option<InvitationStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Invitation>>;
    /// Adds `user_id` to the team with the invited role.
    fn accept(&self, token: &str, user_id: UserId, now_ms: i64) -> RepoResult<TeamMember>;
    fn revoke(&self, id: Uuid) -> RepoResult<()>;
    /// Marks pending invitations past their expiry; returns how many.
    fn expire_stale(&self, now_ms: i64) -> RepoResult<u64>;
}

#[derive(Debug)]
pub struct SqliteInvitationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvitationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn get_invitation(&self, id: Uuid) -> RepoResult<Option<Invitation>> {
        query_optional(
            self.conn,
            &format!("{INVITATION_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            parse_invitation_row,
        )
    }
}

impl InvitationRepository for SqliteInvitationRepository<'_> {
    fn create_invitation(&self, invitation: &NewInvitation) -> RepoResult<Invitation> {
        invitation.validate()?;
        ensure_active_company(self.conn, invitation.company_id)?;
        ensure_active_user(self.conn, invitation.invited_by)?;

        let email = invitation.email.trim().to_lowercase();
        let already_member = exists(
            self.conn,
            "SELECT EXISTS(
                SELECT 1
                FROM team_members tm
                JOIN users u ON u.id = tm.user_id
                WHERE tm.company_id = ?1
                  AND u.email = ?2
            );",
            params![invitation.company_id.to_string(), email],
        )?;
        if already_member {
            return Err(RepoError::Conflict(
                "invited email already belongs to a team member".to_string(),
            ));
        }
        let pending = exists(
            self.conn,
            "SELECT EXISTS(
                SELECT 1
                FROM invitations
                WHERE company_id = ?1
                  AND email = ?2
                  AND status = 'pending'
                  AND expires_at > ?3
            );",
            params![invitation.company_id.to_string(), email, current_epoch_ms()],
        )?;
        if pending {
            return Err(RepoError::Conflict(
                "a pending invitation already exists for this email".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let expires_at = current_epoch_ms().saturating_add(invitation.ttl_ms);
        self.conn
            .execute(
                "INSERT INTO invitations (
                    id,
                    company_id,
                    email,
                    role,
                    token,
                    invited_by,
                    expires_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    id.to_string(),
                    invitation.company_id.to_string(),
                    email,
                    invitation.role.as_str(),
                    new_token(),
                    invitation.invited_by.to_string(),
                    expires_at,
                ],
            )
            .map_err(|err| conflict_on_unique(err, || "invitation token collision".to_string()))?;

        self.get_invitation(id)?.ok_or(RepoError::NotFound {
            entity: "invitation",
            id,
        })
    }

    fn get_by_token(&self, token: &str) -> RepoResult<Option<Invitation>> {
        query_optional(
            self.conn,
            &format!("{INVITATION_SELECT_SQL} WHERE token = ?1;"),
            [token.trim()],
            parse_invitation_row,
        )
    }

    fn list_for_company(
        &self,
        company_id: CompanyId,
        status: Option<InvitationStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Invitation>> {
        let mut filter = Filter::new();
        filter.text("company_id = ?", &company_id.to_string());
        if let Some(status) = status {
            filter.text("status = ?", status.as_str());
        }

        fetch_page(
            self.conn,
            INVITATION_SELECT_SQL,
            "SELECT COUNT(*) FROM invitations",
            &filter,
            "created_at DESC, id ASC",
            page,
            parse_invitation_row,
        )
    }

    fn accept(&self, token: &str, user_id: UserId, now_ms: i64) -> RepoResult<TeamMember> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let invitation = query_optional(
            &tx,
            &format!("{INVITATION_SELECT_SQL} WHERE token = ?1;"),
            [token.trim()],
            parse_invitation_row,
        )?
        .ok_or_else(|| RepoError::Conflict("invitation token is not valid".to_string()))?;

        if invitation.status != InvitationStatus::Pending {
            return Err(RepoError::Conflict(format!(
                "invitation is already {}",
                invitation.status
            )));
        }
        if invitation.expires_at <= now_ms {
            tx.execute(
                "UPDATE invitations SET status = 'expired' WHERE id = ?1;",
                [invitation.id.to_string()],
            )?;
            tx.commit()?;
            return Err(RepoError::Conflict("invitation has expired".to_string()));
        }

        ensure_active_company(&tx, invitation.company_id)?;
        ensure_active_user(&tx, user_id)?;
        let email_matches = exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND email = ?2);",
            params![user_id.to_string(), invitation.email],
        )?;
        if !email_matches {
            return Err(RepoError::Conflict(
                "invitation was issued to a different email".to_string(),
            ));
        }

        tx.execute(
            "INSERT INTO team_members (company_id, user_id, role) VALUES (?1, ?2, ?3);",
            params![
                invitation.company_id.to_string(),
                user_id.to_string(),
                invitation.role.as_str()
            ],
        )
        .map_err(|err| conflict_on_unique(err, || "user is already a team member".to_string()))?;
        tx.execute(
            "UPDATE invitations
             SET status = 'accepted',
                 responded_at = ?2
             WHERE id = ?1;",
            params![invitation.id.to_string(), now_ms],
        )?;
        let member = query_optional(
            &tx,
            &format!("{TEAM_MEMBER_SELECT_SQL} WHERE tm.company_id = ?1 AND tm.user_id = ?2;"),
            params![invitation.company_id.to_string(), user_id.to_string()],
            parse_team_member_row,
        )?
        .ok_or(RepoError::NotFound {
            entity: "team member",
            id: user_id,
        })?;
        tx.commit()?;

        info!(
            "event=invitation_accept module=repo status=ok company_id={} role={}",
            invitation.company_id, invitation.role
        );
        Ok(member)
    }

    fn revoke(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invitations
             SET status = 'revoked',
                 responded_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1
               AND status = 'pending';",
            [id.to_string()],
        )?;
        if changed == 1 {
            return Ok(());
        }
        match self.get_invitation(id)? {
            Some(invitation) => Err(RepoError::Conflict(format!(
                "invitation is already {}",
                invitation.status
            ))),
            None => Err(RepoError::NotFound {
                entity: "invitation",
                id,
            }),
        }
    }

    fn expire_stale(&self, now_ms: i64) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE invitations
             SET status = 'expired'
             WHERE status = 'pending'
               AND expires_at <= ?1;",
            [now_ms],
        )?;
        if changed > 0 {
            info!(
                "event=invitation_expire module=repo status=ok count={}",
                changed
            );
        }
        Ok(changed as u64)
    }
}

fn parse_invitation_row(row: &Row<'_>) -> RepoResult<Invitation> {
    let role = enum_col(row, "role", TeamRole::parse)?;
    if role == TeamRole::Owner {
        return Err(RepoError::InvalidData(
            "invitation cannot carry the owner role".to_string(),
        ));
    }
    Ok(Invitation {
        id: uuid_col(row, "id")?,
        company_id: uuid_col(row, "company_id")?,
        email: row.get("email")?,
        role,
        token: row.get("token")?,
        invited_by: uuid_col(row, "invited_by")?,
        status: enum_col(row, "status", InvitationStatus::parse)?,
        expires_at: row.get("expires_at")?,
        responded_at: row.get("responded_at")?,
        created_at: row.get("created_at")?,
    })
}
