//! Newsletter subscription repository (double opt-in).
//!
//! # Invariants
//! - One row per email address.
//! - A fresh token is issued on every (re)subscription request.

use crate::model::engagement::{subscription_email, NewsletterSubscriber, SubscriberStatus};
use crate::model::user::UserId;
use crate::repo::support::{
    ensure_active_user, ensure_connection_ready, enum_col, fetch_page, grouped_counts, new_token,
    opt_uuid_col, query_optional, uuid_col, Filter, Page, PageRequest, RepoError, RepoResult,
    RequiredTable,
};
use log::info;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SUBSCRIBER_SELECT_SQL: &str = "SELECT
    id,
    email,
    user_id,
    status,
    token,
    subscribed_at,
    unsubscribed_at,
    created_at
FROM newsletter_subscribers";

const REQUIRED_TABLES: &[RequiredTable] = &[RequiredTable {
    name: "newsletter_subscribers",
    columns: &["id", "email", "user_id", "status", "token", "subscribed_at"],
}];

pub trait NewsletterRepository {
    /// Starts (or restarts) opt-in for `email`. Confirmed subscribers are
    /// returned unchanged.
    fn subscribe(&self, email: &str, user_id: Option<UserId>)
        -> RepoResult<NewsletterSubscriber>;
    /// Confirms a pending subscription; confirming twice is a no-op.
    fn confirm(&self, token: &str) -> RepoResult<NewsletterSubscriber>;
    /// Returns `true` when the subscriber changed to `unsubscribed`.
    fn unsubscribe(&self, token: &str) -> RepoResult<bool>;
    fn get_by_email(&self, email: &str) -> RepoResult<Option<NewsletterSubscriber>>;
    /// Confirmed subscribers, oldest confirmation first.
    fn list_subscribed(&self, page: PageRequest) -> RepoResult<Page<NewsletterSubscriber>>;
    /// One entry per status, in declaration order.
    fn count_by_status(&self) -> RepoResult<Vec<(SubscriberStatus, u64)>>;
}

#[derive(Debug)]
pub struct SqliteNewsletterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNewsletterRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn get_by_token(&self, token: &str) -> RepoResult<Option<NewsletterSubscriber>> {
        query_optional(
            self.conn,
            &format!("{SUBSCRIBER_SELECT_SQL} WHERE token = ?1;"),
            [token.trim()],
            parse_subscriber_row,
        )
    }
}

impl NewsletterRepository for SqliteNewsletterRepository<'_> {
    fn subscribe(
        &self,
        email: &str,
        user_id: Option<UserId>,
    ) -> RepoResult<NewsletterSubscriber> {
        let email = subscription_email(email)?;
        if let Some(user_id) = user_id {
            ensure_active_user(self.conn, user_id)?;
        }

        match self.get_by_email(&email)? {
            Some(existing) if existing.status == SubscriberStatus::Subscribed => {
                return Ok(existing);
            }
            Some(existing) => {
                self.conn.execute(
                    "UPDATE newsletter_subscribers
                     SET status = 'pending',
                         token = ?2,
                         user_id = COALESCE(?3, user_id),
                         unsubscribed_at = NULL
                     WHERE id = ?1;",
                    params![
                        existing.id.to_string(),
                        new_token(),
                        user_id.map(|id| id.to_string())
                    ],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO newsletter_subscribers (id, email, user_id, status, token)
                     VALUES (?1, ?2, ?3, 'pending', ?4);",
                    params![
                        Uuid::new_v4().to_string(),
                        email,
                        user_id.map(|id| id.to_string()),
                        new_token()
                    ],
                )?;
            }
        }
        info!("event=newsletter_subscribe module=repo status=pending");

        self.get_by_email(&email)?
            .ok_or_else(|| RepoError::InvalidData("subscriber vanished after upsert".to_string()))
    }

    fn confirm(&self, token: &str) -> RepoResult<NewsletterSubscriber> {
        let subscriber = self
            .get_by_token(token)?
            .ok_or_else(|| RepoError::Conflict("subscription token is not valid".to_string()))?;
        match subscriber.status {
            SubscriberStatus::Subscribed => return Ok(subscriber),
            SubscriberStatus::Unsubscribed => {
                return Err(RepoError::Conflict(
                    "subscription was cancelled; subscribe again".to_string(),
                ));
            }
            SubscriberStatus::Pending => {}
        }

        self.conn.execute(
            "UPDATE newsletter_subscribers
             SET status = 'subscribed',
                 subscribed_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [subscriber.id.to_string()],
        )?;
        info!("event=newsletter_confirm module=repo status=ok");

        self.get_by_token(token)?.ok_or(RepoError::NotFound {
            entity: "newsletter subscriber",
            id: subscriber.id,
        })
    }

    fn unsubscribe(&self, token: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE newsletter_subscribers
             SET status = 'unsubscribed',
                 unsubscribed_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE token = ?1
               AND status <> 'unsubscribed';",
            [token.trim()],
        )?;
        Ok(changed == 1)
    }

    fn get_by_email(&self, email: &str) -> RepoResult<Option<NewsletterSubscriber>> {
        query_optional(
            self.conn,
            &format!("{SUBSCRIBER_SELECT_SQL} WHERE email = ?1;"),
            [email.trim().to_lowercase()],
            parse_subscriber_row,
        )
    }

    fn list_subscribed(&self, page: PageRequest) -> RepoResult<Page<NewsletterSubscriber>> {
        let mut filter = Filter::new();
        filter.raw("status = 'subscribed'");

        fetch_page(
            self.conn,
            SUBSCRIBER_SELECT_SQL,
            "SELECT COUNT(*) FROM newsletter_subscribers",
            &filter,
            "subscribed_at ASC, id ASC",
            page,
            parse_subscriber_row,
        )
    }

    fn count_by_status(&self) -> RepoResult<Vec<(SubscriberStatus, u64)>> {
        grouped_counts(
            self.conn,
            "SELECT status, COUNT(*) AS total FROM newsletter_subscribers GROUP BY status;",
            [],
            "status",
            SubscriberStatus::parse,
            SubscriberStatus::ALL,
        )
    }
}

fn parse_subscriber_row(row: &Row<'_>) -> RepoResult<NewsletterSubscriber> {
    Ok(NewsletterSubscriber {
        id: uuid_col(row, "id")?,
        email: row.get("email")?,
        user_id: opt_uuid_col(row, "user_id")?,
        status: enum_col(row, "status", SubscriberStatus::parse)?,
        token: row.get("token")?,
        subscribed_at: row.get("subscribed_at")?,
        unsubscribed_at: row.get("unsubscribed_at")?,
        created_at: row.get("created_at")?,
    })
}
