use jobboard_core::db::open_db_in_memory;
use jobboard_core::model::profile::{
    Certification, Education, PortfolioItem, Resume, Skill, SkillLevel, WorkExperience,
};
use jobboard_core::model::user::{User, UserId, UserRole};
use jobboard_core::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use jobboard_core::repo::resume_repo::{ResumeRepository, SqliteResumeRepository};
use jobboard_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use jobboard_core::{PageRequest, RepoError};
use rusqlite::Connection;

fn seed_user(conn: &Connection, email: &str) -> UserId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&User::new(email, "hash", email, UserRole::Candidate))
        .unwrap()
        .id
}

fn resume(user_id: UserId, title: &str) -> Resume {
    Resume::new(
        user_id,
        title,
        "https://files.test/cv.pdf",
        "cv.pdf",
        2048,
        "application/pdf",
    )
}

#[test]
fn first_resume_is_primary_and_set_primary_moves_flag() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com");
    let resumes = SqliteResumeRepository::try_new(&conn).unwrap();

    let first = resumes.create_resume(&resume(user, "General")).unwrap();
    let second = resumes.create_resume(&resume(user, "Backend")).unwrap();
    assert!(first.is_primary);
    assert!(!second.is_primary);

    resumes.set_primary(user, second.id).unwrap();

    let listed = resumes.list_for_user(user).unwrap();
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed.iter().filter(|item| item.is_primary).count(), 1);
    assert_eq!(
        resumes.get_primary(user).unwrap().map(|item| item.id),
        Some(second.id)
    );
}

#[test]
fn set_primary_rejects_resume_of_other_user() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_user(&conn, "ada@example.com");
    let eve = seed_user(&conn, "eve@example.com");
    let resumes = SqliteResumeRepository::try_new(&conn).unwrap();
    let ada_cv = resumes.create_resume(&resume(ada, "Ada")).unwrap();
    let eve_cv = resumes.create_resume(&resume(eve, "Eve")).unwrap();

    let err = resumes.set_primary(ada, eve_cv.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
    assert_eq!(
        resumes.get_primary(ada).unwrap().map(|item| item.id),
        Some(ada_cv.id)
    );
    assert!(resumes.get_resume(eve_cv.id).unwrap().unwrap().is_primary);
}

#[test]
fn deleting_primary_promotes_newest_remaining() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com");
    let resumes = SqliteResumeRepository::try_new(&conn).unwrap();
    let primary = resumes.create_resume(&resume(user, "One")).unwrap();
    resumes.create_resume(&resume(user, "Two")).unwrap();
    let newest = resumes.create_resume(&resume(user, "Three")).unwrap();

    resumes.delete_resume(user, primary.id).unwrap();

    assert_eq!(
        resumes.get_primary(user).unwrap().map(|item| item.id),
        Some(newest.id)
    );
    assert!(matches!(
        resumes.delete_resume(user, primary.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn skills_are_unique_per_user_ignoring_case() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com");
    let profile = SqliteProfileRepository::try_new(&conn).unwrap();

    let rust = profile
        .add_skill(&Skill::new(user, "Rust", SkillLevel::Advanced))
        .unwrap();
    let err = profile
        .add_skill(&Skill::new(user, "rust", SkillLevel::Beginner))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    let mut updated = Skill::new(user, "Rust", SkillLevel::Expert);
    updated.id = rust;
    updated.years = Some(6);
    profile.update_skill(&updated).unwrap();

    let skills = profile.list_skills(user).unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].level, SkillLevel::Expert);

    profile.remove_skill(user, rust).unwrap();
    assert!(profile.list_skills(user).unwrap().is_empty());
}

#[test]
fn skill_search_ranks_by_level() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_user(&conn, "ada@example.com");
    let bob = seed_user(&conn, "bob@example.com");
    let profile = SqliteProfileRepository::try_new(&conn).unwrap();
    profile
        .add_skill(&Skill::new(ada, "Rust", SkillLevel::Intermediate))
        .unwrap();
    profile
        .add_skill(&Skill::new(bob, "rust", SkillLevel::Expert))
        .unwrap();

    let found = profile
        .list_users_with_skill("RUST", PageRequest::default())
        .unwrap();
    assert_eq!(found.total, 2);
    assert_eq!(found.items[0].user_id, bob);
    assert_eq!(found.items[1].skill_level, SkillLevel::Intermediate);
}

#[test]
fn experience_lists_current_role_first() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "ada@example.com");
    let profile = SqliteProfileRepository::try_new(&conn).unwrap();

    let mut old = WorkExperience::new(user, "Initech", "Developer", "2015-01");
    old.end_month = Some("2018-06".to_string());
    profile.add_experience(&old).unwrap();
    let current = profile
        .add_experience(&WorkExperience::new(user, "Acme", "Lead", "2018-07"))
        .unwrap();

    let listed = profile.list_experience(user).unwrap();
    assert_eq!(listed[0].id, current);

    let mut inverted = WorkExperience::new(user, "Globex", "Intern", "2020-05");
    inverted.end_month = Some("2019-01".to_string());
    assert!(matches!(
        profile.add_experience(&inverted),
        Err(RepoError::Validation(_))
    ));
}

#[test]
fn education_portfolio_and_certifications_are_owned() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_user(&conn, "ada@example.com");
    let eve = seed_user(&conn, "eve@example.com");
    let profile = SqliteProfileRepository::try_new(&conn).unwrap();

    let mut degree = Education::new(ada, "University of London", "2010-09");
    degree.end_month = Some("2013-06".to_string());
    let degree_id = profile.add_education(&degree).unwrap();
    degree.id = degree_id;
    degree.degree = Some("BSc".to_string());
    profile.update_education(&degree).unwrap();
    assert_eq!(
        profile.list_education(ada).unwrap()[0].degree.as_deref(),
        Some("BSc")
    );

    let item = profile
        .add_portfolio_item(&PortfolioItem::new(ada, "Engine", "https://ada.dev/engine"))
        .unwrap();
    let cert = profile
        .add_certification(&Certification::new(ada, "CKA", "CNCF", "2022-03"))
        .unwrap();
    assert_eq!(profile.list_portfolio(ada).unwrap().len(), 1);
    assert_eq!(profile.list_certifications(ada).unwrap().len(), 1);

    assert!(matches!(
        profile.delete_portfolio_item(eve, item),
        Err(RepoError::NotFound { .. })
    ));
    profile.delete_portfolio_item(ada, item).unwrap();
    profile.delete_certification(ada, cert).unwrap();
    profile.delete_education(ada, degree_id).unwrap();
    assert!(profile.list_portfolio(ada).unwrap().is_empty());
    assert!(profile.list_certifications(ada).unwrap().is_empty());
    assert!(profile.list_education(ada).unwrap().is_empty());
}
