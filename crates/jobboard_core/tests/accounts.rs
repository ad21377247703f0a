use jobboard_core::db::open_db_in_memory;
use jobboard_core::model::account::LoginAttempt;
use jobboard_core::model::user::{User, UserProfileUpdate, UserRole};
use jobboard_core::repo::admin_settings_repo::{
    AdminSettingsRepository, SqliteAdminSettingsRepository,
};
use jobboard_core::repo::login_history_repo::{
    LoginHistoryRepository, SqliteLoginHistoryRepository,
};
use jobboard_core::repo::password_history_repo::{
    PasswordHistoryRepository, SqlitePasswordHistoryRepository,
};
use jobboard_core::repo::user_repo::{SqliteUserRepository, UserListQuery, UserRepository};
use jobboard_core::{PageRequest, RepoError};

fn candidate(email: &str, name: &str) -> User {
    User::new(email, "hash-1", name, UserRole::Candidate)
}

#[test]
fn create_normalizes_email_and_rejects_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let created = repo
        .create_user(&candidate("  Ada@Example.COM ", "Ada Lovelace"))
        .unwrap();
    assert_eq!(created.email, "ada@example.com");
    assert!(created.is_active);
    assert!(created.created_at > 0);

    let found = repo.get_user_by_email("ADA@example.com").unwrap().unwrap();
    assert_eq!(found.id, created.id);

    let err = repo
        .create_user(&candidate("ada@example.com", "Someone Else"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[test]
fn create_rejects_invalid_email() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let err = repo.create_user(&candidate("not-an-email", "Nobody")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn soft_deleted_user_is_hidden_by_default() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    let user = repo.create_user(&candidate("grace@example.com", "Grace")).unwrap();

    repo.soft_delete_user(user.id).unwrap();

    assert!(repo.get_user(user.id, false).unwrap().is_none());
    let tombstone = repo.get_user(user.id, true).unwrap().unwrap();
    assert!(tombstone.is_deleted);
    assert!(repo.get_user_by_email("grace@example.com").unwrap().is_none());
}

#[test]
fn soft_delete_twice_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    let user = repo.create_user(&candidate("grace@example.com", "Grace")).unwrap();

    repo.soft_delete_user(user.id).unwrap();
    let stamped = repo.get_user(user.id, true).unwrap().unwrap().updated_at;

    assert!(matches!(
        repo.soft_delete_user(user.id),
        Err(RepoError::NotFound { entity: "user", .. })
    ));
    assert_eq!(
        repo.get_user(user.id, true).unwrap().unwrap().updated_at,
        stamped
    );
}

#[test]
fn update_missing_user_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    let ghost = uuid::Uuid::new_v4();

    let update = UserProfileUpdate {
        full_name: "Ghost".to_string(),
        headline: None,
        avatar_url: None,
    };
    let err = repo.update_profile(ghost, &update).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "user", id } if id == ghost));
}

#[test]
fn list_filters_by_role_and_search() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    repo.create_user(&candidate("ada@example.com", "Ada Lovelace")).unwrap();
    repo.create_user(&candidate("alan@example.com", "Alan Turing")).unwrap();
    repo.create_user(&User::new(
        "boss@acme.test",
        "hash",
        "Acme Boss",
        UserRole::Employer,
    ))
    .unwrap();

    let candidates = repo
        .list_users(&UserListQuery {
            role: Some(UserRole::Candidate),
            ..UserListQuery::default()
        })
        .unwrap();
    assert_eq!(candidates.total, 2);

    let searched = repo
        .list_users(&UserListQuery {
            search: Some("turing".to_string()),
            ..UserListQuery::default()
        })
        .unwrap();
    assert_eq!(searched.total, 1);
    assert_eq!(searched.items[0].full_name, "Alan Turing");

    let paged = repo
        .list_users(&UserListQuery {
            page: PageRequest::new(1, 0),
            ..UserListQuery::default()
        })
        .unwrap();
    assert_eq!(paged.items.len(), 1);
    assert_eq!(paged.total, 3);
    assert!(paged.has_more());

    let counts = repo.count_by_role().unwrap();
    assert_eq!(
        counts,
        vec![
            (UserRole::Candidate, 2),
            (UserRole::Employer, 1),
            (UserRole::Admin, 0)
        ]
    );
}

#[test]
fn successful_login_stamps_last_login() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let logins = SqliteLoginHistoryRepository::try_new(&conn).unwrap();
    let user = users.create_user(&candidate("ada@example.com", "Ada")).unwrap();

    logins
        .record_attempt(&LoginAttempt::failed(user.id, "bad_password"))
        .unwrap();
    let stored = logins
        .record_attempt(&LoginAttempt::succeeded(user.id))
        .unwrap();

    let reloaded = users.get_user(user.id, false).unwrap().unwrap();
    assert_eq!(reloaded.last_login_at, Some(stored.created_at));
    assert_eq!(logins.count_failures_since(user.id, 0).unwrap(), 1);
    assert_eq!(
        logins.last_success(user.id).unwrap().map(|attempt| attempt.id),
        Some(stored.id)
    );

    let history = logins.list_for_user(user.id, PageRequest::default()).unwrap();
    assert_eq!(history.total, 2);
}

#[test]
fn prune_removes_only_older_attempts() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let logins = SqliteLoginHistoryRepository::try_new(&conn).unwrap();
    let user = users.create_user(&candidate("ada@example.com", "Ada")).unwrap();
    let old = logins
        .record_attempt(&LoginAttempt::failed(user.id, "bad_password"))
        .unwrap();
    conn.execute(
        "UPDATE login_history SET created_at = 1000 WHERE id = ?1;",
        [old.id.to_string()],
    )
    .unwrap();
    logins
        .record_attempt(&LoginAttempt::succeeded(user.id))
        .unwrap();

    assert_eq!(logins.prune_older_than(2000).unwrap(), 1);
    assert_eq!(
        logins
            .list_for_user(user.id, PageRequest::default())
            .unwrap()
            .total,
        1
    );
}

#[test]
fn password_history_keeps_most_recent_entries() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let history = SqlitePasswordHistoryRepository::try_new(&conn).unwrap();
    let user = users.create_user(&candidate("ada@example.com", "Ada")).unwrap();

    for hash in ["h1", "h2", "h3", "h4"] {
        history.record_password(user.id, hash, 3).unwrap();
    }

    let entries = history.recent_entries(user.id, 10).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(!history.was_recently_used(user.id, "h1", 3).unwrap());
    assert!(history.was_recently_used(user.id, "h4", 3).unwrap());
    assert!(!history.was_recently_used(user.id, "h2", 1).unwrap());
}

#[test]
fn admin_settings_upsert_and_parse() {
    let conn = open_db_in_memory().unwrap();
    let settings = SqliteAdminSettingsRepository::try_new(&conn).unwrap();

    settings
        .set_setting("jobs.default_ttl_days", "30", Some("listing lifetime"), None)
        .unwrap();
    let updated = settings
        .set_setting("jobs.default_ttl_days", "45", None, None)
        .unwrap();
    assert_eq!(updated.value, "45");

    assert_eq!(
        settings.get_parsed::<u32>("jobs.default_ttl_days").unwrap(),
        Some(45)
    );
    assert!(!settings.get_or("reviews.auto_approve", false).unwrap());
    assert_eq!(settings.list_settings().unwrap().len(), 1);

    settings
        .set_setting("site.name", "Board", None, None)
        .unwrap();
    assert!(matches!(
        settings.get_parsed::<u32>("site.name"),
        Err(RepoError::InvalidData(_))
    ));

    assert!(settings.delete_setting("site.name").unwrap());
    assert!(!settings.delete_setting("site.name").unwrap());
}

#[test]
fn admin_settings_reject_malformed_key() {
    let conn = open_db_in_memory().unwrap();
    let settings = SqliteAdminSettingsRepository::try_new(&conn).unwrap();

    let err = settings
        .set_setting("Bad Key", "1", None, None)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
