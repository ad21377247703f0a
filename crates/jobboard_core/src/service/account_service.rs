//! Account use-case service.
//!
//! # Responsibility
//! - Register accounts and seed their password history.
//! - Enforce password reuse rules on password change.
//! - Record login attempts and report lockout state.
//!
//! # Invariants
//! - A password hash among the user's last `password_history_depth` hashes
//!   is never accepted again.
//! - Inactive or locked-out accounts never record a successful login.
//!
//! Password hashes are opaque here; reuse detection compares stored hash
//! text, so callers must hash deterministically for reuse checks to bite.

use crate::config::{
    CoreConfig, DEFAULT_FAILED_LOGIN_WINDOW_MS, DEFAULT_MAX_FAILED_LOGINS,
    DEFAULT_PASSWORD_HISTORY_DEPTH,
};
use crate::model::account::LoginAttempt;
use crate::model::user::{User, UserId};
use crate::repo::login_history_repo::LoginHistoryRepository;
use crate::repo::password_history_repo::PasswordHistoryRepository;
use crate::repo::support::{current_epoch_ms, RepoError};
use crate::repo::user_repo::UserRepository;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const REASON_INACTIVE: &str = "inactive_account";
const REASON_LOCKED_OUT: &str = "locked_out";

/// Service error for account use-cases.
#[derive(Debug)]
pub enum AccountServiceError {
    /// Email already belongs to an account.
    EmailTaken,
    UserNotFound(UserId),
    /// Account is deactivated; login was refused and recorded as failed.
    InactiveUser(UserId),
    /// Too many recent failures; login was refused and recorded as failed.
    LockedOut { user_id: UserId, recent_failures: u64 },
    /// New password hash matches a recently used one.
    PasswordReused,
    Repo(RepoError),
}

impl Display for AccountServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailTaken => write!(f, "email is already registered"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::InactiveUser(id) => write!(f, "user is inactive: {id}"),
            Self::LockedOut {
                user_id,
                recent_failures,
            } => write!(
                f,
                "user {user_id} is locked out after {recent_failures} failed logins"
            ),
            Self::PasswordReused => write!(f, "password was used recently"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccountServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "user",
                id,
            } => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Limits applied by [`AccountService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPolicy {
    pub password_history_depth: u32,
    pub max_failed_logins: u32,
    pub failed_login_window_ms: i64,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            password_history_depth: DEFAULT_PASSWORD_HISTORY_DEPTH,
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
            failed_login_window_ms: DEFAULT_FAILED_LOGIN_WINDOW_MS,
        }
    }
}

impl AccountPolicy {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            password_history_depth: config.password_history_depth,
            max_failed_logins: config.max_failed_logins,
            failed_login_window_ms: config.failed_login_window_ms,
        }
    }
}

/// Result of a recorded login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub attempt: LoginAttempt,
    /// Failed attempts inside the policy window, this one included.
    pub recent_failures: u64,
    /// `true` once `recent_failures` reaches the policy limit.
    pub locked_out: bool,
}

/// Account service facade over the user, login and password repositories.
pub struct AccountService<U, L, P>
where
    U: UserRepository,
    L: LoginHistoryRepository,
    P: PasswordHistoryRepository,
{
    users: U,
    logins: L,
    passwords: P,
    policy: AccountPolicy,
}

impl<U, L, P> AccountService<U, L, P>
where
    U: UserRepository,
    L: LoginHistoryRepository,
    P: PasswordHistoryRepository,
{
    pub fn new(users: U, logins: L, passwords: P, policy: AccountPolicy) -> Self {
        Self {
            users,
            logins,
            passwords,
            policy,
        }
    }

    pub fn policy(&self) -> AccountPolicy {
        self.policy
    }

    /// Creates the account and records its first password hash.
    pub fn register(&self, user: &User) -> Result<User, AccountServiceError> {
        let created = self
            .users
            .create_user_with_history(user, self.policy.password_history_depth)
            .map_err(|err| match err {
                RepoError::Conflict(_) => AccountServiceError::EmailTaken,
                other => other.into(),
            })?;

        info!(
            "event=account_register module=service status=ok role={}",
            created.role
        );
        Ok(created)
    }

    /// Replaces the password hash unless it was used recently.
    pub fn change_password(
        &self,
        user_id: UserId,
        new_password_hash: &str,
    ) -> Result<(), AccountServiceError> {
        self.users
            .get_user(user_id, false)?
            .ok_or(AccountServiceError::UserNotFound(user_id))?;

        let depth = self.policy.password_history_depth;
        if self
            .passwords
            .was_recently_used(user_id, new_password_hash, depth)?
        {
            warn!("event=account_password_change module=service status=rejected reason=reused");
            return Err(AccountServiceError::PasswordReused);
        }

        self.users
            .update_password_hash_with_history(user_id, new_password_hash, depth)?;

        info!("event=account_password_change module=service status=ok");
        Ok(())
    }

    /// Records `attempt` and reports the user's recent failure count.
    ///
    /// A successful attempt for an inactive or locked-out account is stored
    /// as a failure and returned as an error.
    pub fn record_login(
        &self,
        attempt: &LoginAttempt,
    ) -> Result<LoginOutcome, AccountServiceError> {
        let user = self
            .users
            .get_user(attempt.user_id, false)?
            .ok_or(AccountServiceError::UserNotFound(attempt.user_id))?;

        if attempt.succeeded && !user.is_active {
            self.record_refusal(attempt, REASON_INACTIVE)?;
            warn!("event=account_login module=service status=rejected reason=inactive");
            return Err(AccountServiceError::InactiveUser(user.id));
        }

        let since_ms = current_epoch_ms().saturating_sub(self.policy.failed_login_window_ms);
        let prior_failures = self.logins.count_failures_since(user.id, since_ms)?;
        let limit = u64::from(self.policy.max_failed_logins);

        if attempt.succeeded && limit > 0 && prior_failures >= limit {
            self.record_refusal(attempt, REASON_LOCKED_OUT)?;
            warn!(
                "event=account_login module=service status=rejected reason=locked_out failures={}",
                prior_failures
            );
            return Err(AccountServiceError::LockedOut {
                user_id: user.id,
                recent_failures: prior_failures + 1,
            });
        }

        let stored = self.logins.record_attempt(attempt)?;
        let recent_failures = if stored.succeeded {
            prior_failures
        } else {
            prior_failures + 1
        };
        let locked_out = limit > 0 && recent_failures >= limit;
        if locked_out && !stored.succeeded {
            warn!(
                "event=account_login module=service status=locked_out failures={}",
                recent_failures
            );
        }

        Ok(LoginOutcome {
            attempt: stored,
            recent_failures,
            locked_out,
        })
    }

    fn record_refusal(
        &self,
        attempt: &LoginAttempt,
        reason: &str,
    ) -> Result<LoginAttempt, AccountServiceError> {
        let mut refused = LoginAttempt::failed(attempt.user_id, reason);
        refused.ip_address = attempt.ip_address.clone();
        refused.user_agent = attempt.user_agent.clone();
        Ok(self.logins.record_attempt(&refused)?)
    }
}
