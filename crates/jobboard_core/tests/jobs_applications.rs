use jobboard_core::db::open_db_in_memory;
use jobboard_core::model::application::{Application, ApplicationStatus};
use jobboard_core::model::company::{Company, CompanyLocation};
use jobboard_core::model::job::{Job, JobSort, JobStatus, Workplace};
use jobboard_core::model::profile::Resume;
use jobboard_core::model::user::{User, UserId, UserRole};
use jobboard_core::model::validation::ValidationError;
use jobboard_core::repo::application_repo::{ApplicationRepository, SqliteApplicationRepository};
use jobboard_core::repo::company_repo::{CompanyRepository, SqliteCompanyRepository};
use jobboard_core::repo::job_repo::{JobRepository, JobSearchQuery, SqliteJobRepository};
use jobboard_core::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use jobboard_core::repo::resume_repo::{ResumeRepository, SqliteResumeRepository};
use jobboard_core::repo::saved_repo::{
    SavedCandidateRepository, SavedJobRepository, SqliteSavedCandidateRepository,
    SqliteSavedJobRepository,
};
use jobboard_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use jobboard_core::{PageRequest, RepoError};
use rusqlite::Connection;

struct Board {
    employer: UserId,
    company: Company,
}

fn seed_user(conn: &Connection, email: &str, role: UserRole) -> UserId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&User::new(email, "hash", email, role))
        .unwrap()
        .id
}

fn seed_board(conn: &Connection) -> Board {
    let employer = seed_user(conn, "hr@acme.test", UserRole::Employer);
    let companies = SqliteCompanyRepository::try_new(conn).unwrap();
    let company = companies
        .create_company(&Company::new(employer, "Acme"))
        .unwrap();
    Board { employer, company }
}

fn open_job(board: &Board, title: &str) -> Job {
    let mut job = Job::new(board.company.id, board.employer, title, "Build things.");
    job.status = JobStatus::Open;
    job
}

fn job_count(conn: &Connection, board: &Board) -> i64 {
    SqliteCompanyRepository::try_new(conn)
        .unwrap()
        .get_company(board.company.id, false)
        .unwrap()
        .unwrap()
        .job_count
}

#[test]
fn create_job_stamps_publication_and_counts_company_jobs() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();

    let draft = jobs
        .create_job(&Job::new(board.company.id, board.employer, "Draft", "Later."))
        .unwrap();
    let open = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    assert!(draft.published_at.is_none());
    assert!(open.published_at.is_some());
    assert_eq!(job_count(&conn, &board), 2);

    jobs.set_status(draft.id, JobStatus::Open).unwrap();
    let published = jobs.get_job(draft.id, false).unwrap().unwrap();
    let first_publication = published.published_at;
    assert!(first_publication.is_some());
    jobs.set_status(draft.id, JobStatus::Closed).unwrap();
    jobs.set_status(draft.id, JobStatus::Open).unwrap();
    assert_eq!(
        jobs.get_job(draft.id, false).unwrap().unwrap().published_at,
        first_publication
    );

    jobs.soft_delete_job(open.id).unwrap();
    assert_eq!(job_count(&conn, &board), 1);
    assert!(jobs.get_job(open.id, false).unwrap().is_none());
    assert!(matches!(
        jobs.soft_delete_job(open.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn create_job_rejects_foreign_location() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let other = companies
        .create_company(&Company::new(board.employer, "Globex"))
        .unwrap();
    let locations = SqliteLocationRepository::try_new(&conn).unwrap();
    let foreign = locations
        .add_location(&CompanyLocation::new(other.id, "HQ", "Austin", "US"))
        .unwrap();
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();

    let mut job = open_job(&board, "Misplaced");
    job.location_id = Some(foreign.id);
    let err = jobs.create_job(&job).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(job_count(&conn, &board), 0);
}

#[test]
fn search_applies_filters_and_sorts() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();

    let mut rust = open_job(&board, "Senior Rust Engineer");
    rust.workplace = Workplace::Remote;
    rust.salary_min = Some(90_000);
    rust.salary_max = Some(140_000);
    rust.city = Some("Berlin".to_string());
    let rust = jobs.create_job(&rust).unwrap();
    jobs.set_skills(rust.id, &["Rust".to_string(), "SQLite".to_string()])
        .unwrap();

    let mut go = open_job(&board, "Go Developer");
    go.salary_min = Some(70_000);
    let go = jobs.create_job(&go).unwrap();

    jobs.create_job(&Job::new(board.company.id, board.employer, "Rust Draft", "x"))
        .unwrap();

    let keyword = jobs
        .search(&JobSearchQuery {
            keyword: Some("rust".to_string()),
            ..JobSearchQuery::default()
        })
        .unwrap();
    assert_eq!(keyword.total, 1);
    assert_eq!(keyword.items[0].job.id, rust.id);
    assert_eq!(keyword.items[0].company_name, "Acme");

    let remote = jobs
        .search(&JobSearchQuery {
            workplace: Some(Workplace::Remote),
            city: Some("berlin".to_string()),
            ..JobSearchQuery::default()
        })
        .unwrap();
    assert_eq!(remote.total, 1);

    let well_paid = jobs
        .search(&JobSearchQuery {
            min_salary: Some(100_000),
            ..JobSearchQuery::default()
        })
        .unwrap();
    assert_eq!(well_paid.total, 1);

    let by_skill = jobs
        .search(&JobSearchQuery {
            skill: Some("sqlite".to_string()),
            ..JobSearchQuery::default()
        })
        .unwrap();
    assert_eq!(by_skill.items[0].job.id, rust.id);

    let by_salary = jobs
        .search(&JobSearchQuery {
            sort: JobSort::Salary,
            ..JobSearchQuery::default()
        })
        .unwrap();
    let ids: Vec<_> = by_salary.items.iter().map(|listing| listing.job.id).collect();
    assert_eq!(ids, vec![rust.id, go.id]);

    let drafts = jobs
        .search(&JobSearchQuery {
            status: Some(JobStatus::Draft),
            ..JobSearchQuery::default()
        })
        .unwrap();
    assert_eq!(drafts.total, 1);

    assert_eq!(jobs.skills(rust.id).unwrap(), vec!["Rust", "SQLite"]);
}

#[test]
fn close_expired_and_count_by_status() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let mut expiring = open_job(&board, "Seasonal");
    expiring.expires_at = Some(1_000);
    jobs.create_job(&expiring).unwrap();
    jobs.create_job(&open_job(&board, "Permanent")).unwrap();

    assert_eq!(jobs.close_expired(2_000).unwrap(), 1);
    let counts = jobs.count_by_status(board.company.id).unwrap();
    assert!(counts.contains(&(JobStatus::Open, 1)));
    assert!(counts.contains(&(JobStatus::Closed, 1)));
    assert!(counts.contains(&(JobStatus::Draft, 0)));

    let closed = jobs
        .list_for_company(board.company.id, Some(JobStatus::Closed), PageRequest::default())
        .unwrap();
    assert_eq!(closed.items[0].title, "Seasonal");
}

#[test]
fn view_counter_increments() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Popular")).unwrap();

    jobs.increment_view_count(job.id).unwrap();
    jobs.increment_view_count(job.id).unwrap();

    assert_eq!(jobs.get_job(job.id, false).unwrap().unwrap().view_count, 2);
}

#[test]
fn apply_once_per_open_job() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let applications = SqliteApplicationRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let draft = jobs
        .create_job(&Job::new(board.company.id, board.employer, "Draft", "x"))
        .unwrap();

    let application = applications
        .create_application(&Application::new(job.id, candidate))
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert!(applications.has_applied(job.id, candidate).unwrap());
    assert!(matches!(
        applications.create_application(&Application::new(job.id, candidate)),
        Err(RepoError::Conflict(_))
    ));
    assert!(matches!(
        applications.create_application(&Application::new(draft.id, candidate)),
        Err(RepoError::Conflict(_))
    ));
    assert_eq!(
        jobs.get_job(job.id, false).unwrap().unwrap().application_count,
        1
    );
}

#[test]
fn application_resume_must_belong_to_candidate() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let stranger = seed_user(&conn, "eve@example.com", UserRole::Candidate);
    let resumes = SqliteResumeRepository::try_new(&conn).unwrap();
    let foreign_resume = resumes
        .create_resume(&Resume::new(
            stranger,
            "CV",
            "https://files.test/eve.pdf",
            "eve.pdf",
            1024,
            "application/pdf",
        ))
        .unwrap();
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let applications = SqliteApplicationRepository::try_new(&conn).unwrap();

    let mut application = Application::new(job.id, candidate);
    application.resume_id = Some(foreign_resume.id);
    let err = applications.create_application(&application).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn status_changes_follow_the_pipeline() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let applications = SqliteApplicationRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let application = applications
        .create_application(&Application::new(job.id, candidate))
        .unwrap();

    assert!(matches!(
        applications.update_status(application.id, ApplicationStatus::Hired, None),
        Err(RepoError::Conflict(_))
    ));
    let reviewing = applications
        .update_status(
            application.id,
            ApplicationStatus::Reviewing,
            Some("strong profile"),
        )
        .unwrap();
    assert_eq!(reviewing.status, ApplicationStatus::Reviewing);
    assert_eq!(reviewing.employer_notes.as_deref(), Some("strong profile"));

    let applicants = applications
        .list_for_job(job.id, Some(ApplicationStatus::Reviewing), PageRequest::default())
        .unwrap();
    assert_eq!(applicants.total, 1);
    assert_eq!(applicants.items[0].candidate_email, "ada@example.com");

    let counts = applications.count_by_status(job.id).unwrap();
    assert!(counts.contains(&(ApplicationStatus::Reviewing, 1)));
    assert!(counts.contains(&(ApplicationStatus::Submitted, 0)));
}

#[test]
fn employer_status_update_cannot_withdraw() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let applications = SqliteApplicationRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let application = applications
        .create_application(&Application::new(job.id, candidate))
        .unwrap();

    assert!(matches!(
        applications.update_status(application.id, ApplicationStatus::Withdrawn, None),
        Err(RepoError::Validation(ValidationError::Disallowed("status")))
    ));
    let stored = applications
        .get_application(application.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ApplicationStatus::Submitted);

    applications.withdraw(application.id, candidate).unwrap();
    let stored = applications
        .get_application(application.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ApplicationStatus::Withdrawn);
}

#[test]
fn withdraw_is_limited_to_the_candidate() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let applications = SqliteApplicationRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let application = applications
        .create_application(&Application::new(job.id, candidate))
        .unwrap();

    assert!(matches!(
        applications.withdraw(application.id, board.employer),
        Err(RepoError::NotFound { .. })
    ));
    applications.withdraw(application.id, candidate).unwrap();

    let mine = applications
        .list_for_candidate(candidate, PageRequest::default())
        .unwrap();
    assert_eq!(mine.items[0].application.status, ApplicationStatus::Withdrawn);
    assert_eq!(mine.items[0].job_title, "Rust Engineer");
    assert_eq!(mine.items[0].company_name, "Acme");
    assert!(matches!(
        applications.withdraw(application.id, candidate),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn saved_jobs_and_candidates() {
    let conn = open_db_in_memory().unwrap();
    let board = seed_board(&conn);
    let candidate = seed_user(&conn, "ada@example.com", UserRole::Candidate);
    let jobs = SqliteJobRepository::try_new(&conn).unwrap();
    let job = jobs.create_job(&open_job(&board, "Rust Engineer")).unwrap();
    let saved_jobs = SqliteSavedJobRepository::try_new(&conn).unwrap();
    let saved_candidates = SqliteSavedCandidateRepository::try_new(&conn).unwrap();

    assert!(saved_jobs.save_job(candidate, job.id).unwrap());
    assert!(!saved_jobs.save_job(candidate, job.id).unwrap());
    assert!(saved_jobs.is_saved(candidate, job.id).unwrap());
    let listed = saved_jobs
        .list_saved_jobs(candidate, PageRequest::default())
        .unwrap();
    assert_eq!(listed.items[0].listing.job.id, job.id);
    assert_eq!(saved_jobs.count_saved_jobs(candidate).unwrap(), 1);
    assert!(saved_jobs.unsave_job(candidate, job.id).unwrap());
    assert!(!saved_jobs.unsave_job(candidate, job.id).unwrap());

    assert!(saved_candidates
        .save_candidate(board.company.id, candidate, board.employer, Some("call back"))
        .unwrap());
    assert!(!saved_candidates
        .save_candidate(board.company.id, candidate, board.employer, Some("hired elsewhere?"))
        .unwrap());
    let shortlist = saved_candidates
        .list_saved_candidates(board.company.id, PageRequest::default())
        .unwrap();
    assert_eq!(shortlist.total, 1);
    assert_eq!(shortlist.items[0].note.as_deref(), Some("hired elsewhere?"));
    assert!(saved_candidates
        .is_candidate_saved(board.company.id, candidate)
        .unwrap());
    assert!(saved_candidates
        .unsave_candidate(board.company.id, candidate)
        .unwrap());
    assert_eq!(
        saved_candidates
            .count_saved_candidates(board.company.id)
            .unwrap(),
        0
    );
}
