use jobboard_core::db::open_db_in_memory;
use jobboard_core::model::company::{Benefit, Company, CompanyLocation, CompanyMedia, MediaKind};
use jobboard_core::model::team::{InvitationStatus, NewInvitation, TeamRole};
use jobboard_core::model::user::{User, UserId, UserRole};
use jobboard_core::repo::benefit_repo::{BenefitRepository, SqliteBenefitRepository};
use jobboard_core::repo::company_repo::{
    CompanyListQuery, CompanyRepository, SqliteCompanyRepository,
};
use jobboard_core::repo::follower_repo::{FollowerRepository, SqliteFollowerRepository};
use jobboard_core::repo::invitation_repo::{InvitationRepository, SqliteInvitationRepository};
use jobboard_core::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use jobboard_core::repo::media_repo::{MediaRepository, SqliteMediaRepository};
use jobboard_core::repo::team_repo::{SqliteTeamRepository, TeamRepository};
use jobboard_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use jobboard_core::{PageRequest, RepoError};
use rusqlite::Connection;

fn seed_user(conn: &Connection, email: &str, role: UserRole) -> UserId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&User::new(email, "hash", email, role))
        .unwrap()
        .id
}

fn seed_company(conn: &Connection, owner: UserId, name: &str) -> Company {
    let repo = SqliteCompanyRepository::try_new(conn).unwrap();
    repo.create_company(&Company::new(owner, name)).unwrap()
}

#[test]
fn create_assigns_unique_slugs_and_owner_membership() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let team = SqliteTeamRepository::try_new(&conn).unwrap();

    let first = seed_company(&conn, owner, "Acme & Sons");
    let second = seed_company(&conn, owner, "Acme  Sons!");
    assert_eq!(first.slug, "acme-sons");
    assert_eq!(second.slug, "acme-sons-2");

    let by_slug = companies.get_company_by_slug("acme-sons-2").unwrap().unwrap();
    assert_eq!(by_slug.id, second.id);
    assert_eq!(
        team.member_role(first.id, owner).unwrap(),
        Some(TeamRole::Owner)
    );
    assert_eq!(companies.list_for_member(owner).unwrap().len(), 2);
}

#[test]
fn create_requires_active_owner() {
    let conn = open_db_in_memory().unwrap();
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let ghost = uuid::Uuid::new_v4();

    let err = companies
        .create_company(&Company::new(ghost, "Ghost Corp"))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "user", .. }));
}

#[test]
fn list_filters_verified_and_search() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let acme = seed_company(&conn, owner, "Acme");
    seed_company(&conn, owner, "Globex");
    let initech = seed_company(&conn, owner, "Initech");
    companies.set_verified(acme.id, true).unwrap();
    companies.soft_delete_company(initech.id).unwrap();

    let all = companies.list_companies(&CompanyListQuery::default()).unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.items[0].name, "Acme");

    let verified = companies
        .list_companies(&CompanyListQuery {
            is_verified: Some(true),
            ..CompanyListQuery::default()
        })
        .unwrap();
    assert_eq!(verified.total, 1);

    let searched = companies
        .list_companies(&CompanyListQuery {
            search: Some("glob".to_string()),
            ..CompanyListQuery::default()
        })
        .unwrap();
    assert_eq!(searched.items[0].name, "Globex");

    assert!(companies.get_company(initech.id, false).unwrap().is_none());
    assert!(companies.get_company(initech.id, true).unwrap().unwrap().is_deleted);
}

#[test]
fn transfer_ownership_swaps_owner_and_demotes_previous_owner() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let heir = seed_user(&conn, "heir@acme.test", UserRole::Employer);
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let team = SqliteTeamRepository::try_new(&conn).unwrap();
    let company = seed_company(&conn, owner, "Acme");

    companies.transfer_ownership(company.id, heir).unwrap();

    let reloaded = companies.get_company(company.id, false).unwrap().unwrap();
    assert_eq!(reloaded.owner_id, heir);
    assert_eq!(team.member_role(company.id, heir).unwrap(), Some(TeamRole::Owner));
    assert_eq!(team.member_role(company.id, owner).unwrap(), Some(TeamRole::Admin));
    let owners: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM team_members WHERE company_id = ?1 AND role = 'owner';",
            [company.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(owners, 1);
}

#[test]
fn transfer_ownership_to_inactive_user_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let dormant = seed_user(&conn, "dormant@acme.test", UserRole::Employer);
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    users.set_active(dormant, false).unwrap();
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let company = seed_company(&conn, owner, "Acme");

    assert!(companies.transfer_ownership(company.id, dormant).is_err());

    let reloaded = companies.get_company(company.id, false).unwrap().unwrap();
    assert_eq!(reloaded.owner_id, owner);
}

#[test]
fn first_location_becomes_headquarters_and_set_headquarters_moves_it() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let locations = SqliteLocationRepository::try_new(&conn).unwrap();

    let berlin = locations
        .add_location(&CompanyLocation::new(company.id, "Berlin", "Berlin", "DE"))
        .unwrap();
    let paris = locations
        .add_location(&CompanyLocation::new(company.id, "Paris", "Paris", "FR"))
        .unwrap();
    assert!(berlin.is_headquarters);
    assert!(!paris.is_headquarters);

    locations.set_headquarters(company.id, paris.id).unwrap();

    let listed = locations.list_for_company(company.id).unwrap();
    assert_eq!(listed[0].id, paris.id);
    assert_eq!(listed.iter().filter(|loc| loc.is_headquarters).count(), 1);
    assert_eq!(
        locations.get_headquarters(company.id).unwrap().map(|loc| loc.id),
        Some(paris.id)
    );
}

#[test]
fn set_headquarters_rejects_location_of_other_company() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let acme = seed_company(&conn, owner, "Acme");
    let globex = seed_company(&conn, owner, "Globex");
    let locations = SqliteLocationRepository::try_new(&conn).unwrap();
    let acme_hq = locations
        .add_location(&CompanyLocation::new(acme.id, "HQ", "Berlin", "DE"))
        .unwrap();
    let globex_hq = locations
        .add_location(&CompanyLocation::new(globex.id, "HQ", "Austin", "US"))
        .unwrap();

    let err = locations.set_headquarters(acme.id, globex_hq.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
    assert_eq!(
        locations.get_headquarters(acme.id).unwrap().map(|loc| loc.id),
        Some(acme_hq.id)
    );
}

#[test]
fn deleting_headquarters_promotes_oldest_remaining_location() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let locations = SqliteLocationRepository::try_new(&conn).unwrap();
    let hq = locations
        .add_location(&CompanyLocation::new(company.id, "HQ", "Berlin", "DE"))
        .unwrap();
    let second = locations
        .add_location(&CompanyLocation::new(company.id, "Paris", "Paris", "FR"))
        .unwrap();
    locations
        .add_location(&CompanyLocation::new(company.id, "Rome", "Rome", "IT"))
        .unwrap();

    locations.delete_location(hq.id).unwrap();

    assert_eq!(
        locations.get_headquarters(company.id).unwrap().map(|loc| loc.id),
        Some(second.id)
    );
    assert!(matches!(
        locations.delete_location(hq.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn benefits_filter_by_category() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let benefits = SqliteBenefitRepository::try_new(&conn).unwrap();

    let mut dental = Benefit::new(company.id, "Dental");
    dental.category = Some("Health".to_string());
    let dental_id = benefits.add_benefit(&dental).unwrap();
    benefits.add_benefit(&Benefit::new(company.id, "Bike lease")).unwrap();

    assert_eq!(benefits.list_for_company(company.id, None).unwrap().len(), 2);
    let health = benefits.list_for_company(company.id, Some("health")).unwrap();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].id, dental_id);

    benefits.delete_benefit(dental_id).unwrap();
    assert!(benefits
        .list_for_company(company.id, Some("health"))
        .unwrap()
        .is_empty());
}

#[test]
fn media_appends_and_reorders() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let media = SqliteMediaRepository::try_new(&conn).unwrap();

    let a = media
        .add_media(&CompanyMedia::new(company.id, MediaKind::Image, "https://cdn.test/a.png"))
        .unwrap();
    let b = media
        .add_media(&CompanyMedia::new(company.id, MediaKind::Video, "https://cdn.test/b.mp4"))
        .unwrap();
    assert_eq!(a.sort_order + 1, b.sort_order);

    media.reorder(company.id, &[b.id, a.id]).unwrap();
    let ids: Vec<_> = media
        .list_for_company(company.id)
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec![b.id, a.id]);

    let err = media.reorder(company.id, &[b.id]).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
    let err = media.reorder(company.id, &[a.id, a.id]).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[test]
fn team_rules_protect_the_owner() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let recruiter = seed_user(&conn, "rec@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let team = SqliteTeamRepository::try_new(&conn).unwrap();

    team.add_member(company.id, recruiter, TeamRole::Recruiter).unwrap();
    assert!(matches!(
        team.add_member(company.id, recruiter, TeamRole::Member),
        Err(RepoError::Conflict(_))
    ));
    assert!(matches!(
        team.remove_member(company.id, owner),
        Err(RepoError::Conflict(_))
    ));
    assert!(team
        .update_role(company.id, recruiter, TeamRole::Owner)
        .is_err());
    assert!(matches!(
        team.update_role(company.id, owner, TeamRole::Admin),
        Err(RepoError::Conflict(_))
    ));

    team.update_role(company.id, recruiter, TeamRole::Admin).unwrap();
    let members = team.list_members(company.id, PageRequest::default()).unwrap();
    assert_eq!(members.total, 2);
    assert_eq!(members.items[0].role, TeamRole::Owner);
    assert_eq!(members.items[1].role, TeamRole::Admin);

    team.remove_member(company.id, recruiter).unwrap();
    assert_eq!(team.count_members(company.id).unwrap(), 1);
}

#[test]
fn invitation_accept_adds_member_once() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let invitee = seed_user(&conn, "new.hire@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();

    let invitation = invitations
        .create_invitation(&NewInvitation::new(
            company.id,
            "New.Hire@acme.test",
            TeamRole::Recruiter,
            owner,
        ))
        .unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert!(matches!(
        invitations.create_invitation(&NewInvitation::new(
            company.id,
            "new.hire@acme.test",
            TeamRole::Member,
            owner,
        )),
        Err(RepoError::Conflict(_))
    ));

    let member = invitations
        .accept(&invitation.token, invitee, invitation.created_at)
        .unwrap();
    assert_eq!(member.role, TeamRole::Recruiter);
    assert_eq!(member.user_id, invitee);

    let stored = invitations.get_by_token(&invitation.token).unwrap().unwrap();
    assert_eq!(stored.status, InvitationStatus::Accepted);
    assert!(matches!(
        invitations.accept(&invitation.token, invitee, invitation.created_at),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn expired_invitation_is_marked_and_rejected() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let invitee = seed_user(&conn, "late@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let invitation = invitations
        .create_invitation(&NewInvitation::new(
            company.id,
            "late@acme.test",
            TeamRole::Member,
            owner,
        ))
        .unwrap();

    let err = invitations
        .accept(&invitation.token, invitee, invitation.expires_at + 1)
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    let stored = invitations.get_by_token(&invitation.token).unwrap().unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
    let team = SqliteTeamRepository::try_new(&conn).unwrap();
    assert_eq!(team.member_role(company.id, invitee).unwrap(), None);
}

#[test]
fn invitation_revoke_and_expire_stale() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let company = seed_company(&conn, owner, "Acme");
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let first = invitations
        .create_invitation(&NewInvitation::new(company.id, "a@x.test", TeamRole::Member, owner))
        .unwrap();
    let second = invitations
        .create_invitation(&NewInvitation::new(company.id, "b@x.test", TeamRole::Member, owner))
        .unwrap();

    invitations.revoke(first.id).unwrap();
    assert!(matches!(invitations.revoke(first.id), Err(RepoError::Conflict(_))));
    assert!(matches!(
        invitations.accept("no-such-token", owner, second.created_at),
        Err(RepoError::Conflict(_))
    ));

    assert_eq!(invitations.expire_stale(second.expires_at).unwrap(), 1);
    let expired = invitations
        .list_for_company(company.id, Some(InvitationStatus::Expired), PageRequest::default())
        .unwrap();
    assert_eq!(expired.total, 1);
    assert_eq!(expired.items[0].id, second.id);
}

#[test]
fn follow_is_idempotent_and_keeps_counter_in_sync() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let fan = seed_user(&conn, "fan@example.com", UserRole::Candidate);
    let company = seed_company(&conn, owner, "Acme");
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let followers = SqliteFollowerRepository::try_new(&conn).unwrap();

    assert!(followers.follow(company.id, fan).unwrap());
    assert!(!followers.follow(company.id, fan).unwrap());
    assert!(followers.is_following(company.id, fan).unwrap());
    assert_eq!(
        companies.get_company(company.id, false).unwrap().unwrap().follower_count,
        1
    );

    let listed = followers
        .list_followers(company.id, PageRequest::default())
        .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].user_id, fan);
    let followed = followers
        .list_followed_companies(fan, PageRequest::default())
        .unwrap();
    assert_eq!(followed.items[0].slug, company.slug);

    assert!(followers.unfollow(company.id, fan).unwrap());
    assert!(!followers.unfollow(company.id, fan).unwrap());
    assert_eq!(
        companies.get_company(company.id, false).unwrap().unwrap().follower_count,
        0
    );
}

#[test]
fn deleted_follower_leaves_counter_and_listing_in_agreement() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "owner@acme.test", UserRole::Employer);
    let fan = seed_user(&conn, "fan@example.com", UserRole::Candidate);
    let leaver = seed_user(&conn, "leaver@example.com", UserRole::Candidate);
    let company = seed_company(&conn, owner, "Acme");
    let companies = SqliteCompanyRepository::try_new(&conn).unwrap();
    let followers = SqliteFollowerRepository::try_new(&conn).unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    followers.follow(company.id, fan).unwrap();
    followers.follow(company.id, leaver).unwrap();

    users.soft_delete_user(leaver).unwrap();

    let listed = followers
        .list_followers(company.id, PageRequest::default())
        .unwrap();
    let stored = companies.get_company(company.id, false).unwrap().unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(stored.follower_count, 1);
    assert_eq!(listed.items[0].user_id, fan);
    assert!(!followers.is_following(company.id, leaver).unwrap());
}
