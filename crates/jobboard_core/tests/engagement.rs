use jobboard_core::db::open_db_in_memory;
use jobboard_core::model::engagement::{
    BlogPost, BlogStatus, LinkedInConnection, Notification, SubscriberStatus,
};
use jobboard_core::model::user::{User, UserId, UserRole};
use jobboard_core::repo::blog_repo::{BlogListQuery, BlogRepository, SqliteBlogRepository};
use jobboard_core::repo::linkedin_repo::{LinkedInRepository, SqliteLinkedInRepository};
use jobboard_core::repo::newsletter_repo::{NewsletterRepository, SqliteNewsletterRepository};
use jobboard_core::repo::notification_repo::{
    NotificationRepository, SqliteNotificationRepository,
};
use jobboard_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use jobboard_core::{PageRequest, RepoError};
use rusqlite::Connection;

fn seed_user(conn: &Connection, email: &str, role: UserRole) -> UserId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&User::new(email, "hash", email, role))
        .unwrap()
        .id
}

#[test]
fn notifications_track_read_state() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let notifications = SqliteNotificationRepository::try_new(&conn).unwrap();

    let first = notifications
        .create_notification(&Notification::new(user, "application", "Application received"))
        .unwrap();
    notifications
        .create_notification(&Notification::new(user, "message", "New message"))
        .unwrap();
    notifications
        .create_notification(&Notification::new(user, "job_alert", "3 new jobs"))
        .unwrap();
    assert_eq!(notifications.count_unread(user).unwrap(), 3);

    notifications.mark_read(first.id).unwrap();
    let unread = notifications
        .list_for_user(user, true, PageRequest::default())
        .unwrap();
    assert_eq!(unread.total, 2);
    assert_eq!(unread.items[0].title, "3 new jobs");

    assert_eq!(notifications.mark_all_read(user).unwrap(), 2);
    assert_eq!(notifications.mark_all_read(user).unwrap(), 0);
    assert_eq!(notifications.count_unread(user).unwrap(), 0);

    notifications.delete_notification(first.id).unwrap();
    assert!(matches!(
        notifications.delete_notification(first.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn notifications_prune_by_age() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let notifications = SqliteNotificationRepository::try_new(&conn).unwrap();
    let stale = notifications
        .create_notification(&Notification::new(user, "system", "Old news"))
        .unwrap();
    notifications
        .create_notification(&Notification::new(user, "system", "Fresh news"))
        .unwrap();
    conn.execute(
        "UPDATE notifications SET created_at = 10 WHERE id = ?1;",
        [stale.id.to_string()],
    )
    .unwrap();

    assert_eq!(notifications.delete_older_than(1_000).unwrap(), 1);
    let remaining = notifications
        .list_for_user(user, false, PageRequest::default())
        .unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.items[0].title, "Fresh news");
}

#[test]
fn blog_posts_get_unique_slugs_and_publish_once() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "editor@board.test", UserRole::Admin);
    let blog = SqliteBlogRepository::try_new(&conn).unwrap();

    let mut post = BlogPost::new(author, "Hiring in 2026", "Body");
    post.tags = vec!["Hiring".to_string(), "trends".to_string()];
    let draft = blog.create_post(&post).unwrap();
    let twin = blog
        .create_post(&BlogPost::new(author, "Hiring in 2026!", "Other body"))
        .unwrap();
    assert_eq!(draft.slug, "hiring-in-2026");
    assert_eq!(twin.slug, "hiring-in-2026-2");
    assert!(blog.get_by_slug(&draft.slug).unwrap().is_none());

    blog.publish(draft.id).unwrap();
    let published = blog.get_by_slug(&draft.slug).unwrap().unwrap();
    assert_eq!(published.status, BlogStatus::Published);
    assert_eq!(published.tags.len(), 2);
    let first_published_at = published.published_at;

    blog.unpublish(draft.id).unwrap();
    blog.publish(draft.id).unwrap();
    assert_eq!(
        blog.get_post(draft.id).unwrap().unwrap().published_at,
        first_published_at
    );

    let by_author = blog.list_by_author(author, PageRequest::default()).unwrap();
    assert_eq!(by_author.total, 2);
}

#[test]
fn blog_index_filters_by_tag_and_search() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "editor@board.test", UserRole::Admin);
    let blog = SqliteBlogRepository::try_new(&conn).unwrap();

    let mut remote = BlogPost::new(author, "Remote work guide", "Body");
    remote.status = BlogStatus::Published;
    remote.tags = vec!["remote".to_string()];
    let remote = blog.create_post(&remote).unwrap();

    let mut salary = BlogPost::new(author, "Salary negotiation", "Body");
    salary.status = BlogStatus::Published;
    let salary = blog.create_post(&salary).unwrap();
    blog.set_tags(salary.id, &["Career".to_string(), "career".to_string()])
        .unwrap();
    assert_eq!(blog.tags(salary.id).unwrap().len(), 1);

    blog.create_post(&BlogPost::new(author, "Unfinished remote draft", "Body"))
        .unwrap();

    let all = blog.list_published(&BlogListQuery::default()).unwrap();
    assert_eq!(all.total, 2);

    let tagged = blog
        .list_published(&BlogListQuery {
            tag: Some("REMOTE".to_string()),
            ..BlogListQuery::default()
        })
        .unwrap();
    assert_eq!(tagged.total, 1);
    assert_eq!(tagged.items[0].id, remote.id);

    let searched = blog
        .list_published(&BlogListQuery {
            search: Some("negotiation".to_string()),
            ..BlogListQuery::default()
        })
        .unwrap();
    assert_eq!(searched.items[0].id, salary.id);

    blog.increment_view_count(salary.id).unwrap();
    assert_eq!(blog.get_post(salary.id).unwrap().unwrap().view_count, 1);

    blog.delete_post(salary.id).unwrap();
    assert!(blog.get_post(salary.id).unwrap().is_none());
    assert!(blog.tags(salary.id).unwrap().is_empty());
}

#[test]
fn linkedin_connection_is_one_per_user() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let eve = seed_user(&conn, "eve@example.com", UserRole::Candidate);
    let linkedin = SqliteLinkedInRepository::try_new(&conn).unwrap();

    let mut connection = LinkedInConnection::new(ada, "member-ada", "token-1", 5_000);
    connection.refresh_token = Some("refresh-1".to_string());
    linkedin.upsert_connection(&connection).unwrap();
    linkedin
        .upsert_connection(&LinkedInConnection::new(ada, "member-ada", "token-2", 9_000))
        .unwrap();

    let stored = linkedin.get_for_user(ada).unwrap().unwrap();
    assert_eq!(stored.access_token, "token-2");
    assert_eq!(
        linkedin.get_by_member_id("member-ada").unwrap().map(|c| c.user_id),
        Some(ada)
    );

    let err = linkedin
        .upsert_connection(&LinkedInConnection::new(eve, "member-ada", "token-3", 9_000))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    linkedin.update_tokens(ada, "token-4", None, 3_000).unwrap();
    linkedin.mark_synced(ada, 2_500).unwrap();
    let refreshed = linkedin.get_for_user(ada).unwrap().unwrap();
    assert_eq!(refreshed.access_token, "token-4");
    assert_eq!(refreshed.last_synced_at, Some(2_500));
    assert_eq!(linkedin.list_expiring_before(4_000).unwrap().len(), 1);
    assert!(linkedin.list_expiring_before(3_000).unwrap().is_empty());

    assert!(linkedin.disconnect(ada).unwrap());
    assert!(!linkedin.disconnect(ada).unwrap());
}

#[test]
fn newsletter_double_opt_in_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let newsletter = SqliteNewsletterRepository::try_new(&conn).unwrap();

    let pending = newsletter.subscribe("Reader@Example.com", None).unwrap();
    assert_eq!(pending.email, "reader@example.com");
    assert_eq!(pending.status, SubscriberStatus::Pending);

    let confirmed = newsletter.confirm(&pending.token).unwrap();
    assert_eq!(confirmed.status, SubscriberStatus::Subscribed);
    assert!(confirmed.subscribed_at.is_some());
    assert_eq!(
        newsletter.confirm(&pending.token).unwrap().status,
        SubscriberStatus::Subscribed
    );
    let again = newsletter.subscribe("reader@example.com", None).unwrap();
    assert_eq!(again.token, pending.token);

    assert!(newsletter.unsubscribe(&pending.token).unwrap());
    assert!(!newsletter.unsubscribe(&pending.token).unwrap());
    assert!(matches!(
        newsletter.confirm(&pending.token),
        Err(RepoError::Conflict(_))
    ));

    let resubscribed = newsletter.subscribe("reader@example.com", None).unwrap();
    assert_eq!(resubscribed.status, SubscriberStatus::Pending);
    assert_ne!(resubscribed.token, pending.token);

    assert!(matches!(
        newsletter.confirm("bogus"),
        Err(RepoError::Conflict(_))
    ));
    assert_eq!(
        newsletter.list_subscribed(PageRequest::default()).unwrap().total,
        0
    );
    let counts = newsletter.count_by_status().unwrap();
    assert!(counts.contains(&(SubscriberStatus::Pending, 1)));
}
