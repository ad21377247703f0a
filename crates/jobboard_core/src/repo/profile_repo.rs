//! Candidate profile sections: skills, education, work experience,
//! portfolio and certifications.
//!
//! Every section row belongs to one user; updates and deletes are scoped to
//! that owner, so a foreign id behaves like a missing one.

use crate::model::profile::{
    Certification, Education, PortfolioItem, Skill, SkillLevel, SkilledCandidate, WorkExperience,
};
use crate::model::user::UserId;
use crate::model::validation::require_text;
use crate::repo::support::{
    conflict_on_unique, ensure_active_user, ensure_connection_ready, enum_col, fetch_page,
    query_rows, require_changed, uuid_col, Filter, Page, PageRequest, RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "user_skills",
        columns: &["id", "user_id", "name", "level", "years"],
    },
    RequiredTable {
        name: "education",
        columns: &["id", "user_id", "institution", "start_month", "end_month"],
    },
    RequiredTable {
        name: "work_experience",
        columns: &["id", "user_id", "company_name", "title", "start_month", "end_month"],
    },
    RequiredTable {
        name: "portfolio_items",
        columns: &["id", "user_id", "title", "url"],
    },
    RequiredTable {
        name: "certifications",
        columns: &["id", "user_id", "name", "issuer", "issued_month"],
    },
];

// Ongoing entries (no end month) sort ahead of finished ones.
const MOST_RECENT_FIRST: &str =
    "COALESCE(end_month, '9999-12') DESC, start_month DESC, created_at DESC, id ASC";

pub trait ProfileRepository {
    /// Skill names are unique per user, ignoring case.
    fn add_skill(&self, skill: &Skill) -> RepoResult<Uuid>;
    fn update_skill(&self, skill: &Skill) -> RepoResult<()>;
    /// Sorted by name.
    fn list_skills(&self, user_id: UserId) -> RepoResult<Vec<Skill>>;
    fn remove_skill(&self, user_id: UserId, skill_id: Uuid) -> RepoResult<()>;
    /// Active users listing `skill`, strongest level first.
    fn list_users_with_skill(
        &self,
        skill: &str,
        page: PageRequest,
    ) -> RepoResult<Page<SkilledCandidate>>;

    fn add_education(&self, education: &Education) -> RepoResult<Uuid>;
    fn update_education(&self, education: &Education) -> RepoResult<()>;
    fn list_education(&self, user_id: UserId) -> RepoResult<Vec<Education>>;
    fn delete_education(&self, user_id: UserId, id: Uuid) -> RepoResult<()>;

    fn add_experience(&self, experience: &WorkExperience) -> RepoResult<Uuid>;
    fn update_experience(&self, experience: &WorkExperience) -> RepoResult<()>;
    fn list_experience(&self, user_id: UserId) -> RepoResult<Vec<WorkExperience>>;
    fn delete_experience(&self, user_id: UserId, id: Uuid) -> RepoResult<()>;

    fn add_portfolio_item(&self, item: &PortfolioItem) -> RepoResult<Uuid>;
    fn update_portfolio_item(&self, item: &PortfolioItem) -> RepoResult<()>;
    /// Newest first.
    fn list_portfolio(&self, user_id: UserId) -> RepoResult<Vec<PortfolioItem>>;
    fn delete_portfolio_item(&self, user_id: UserId, id: Uuid) -> RepoResult<()>;

    fn add_certification(&self, certification: &Certification) -> RepoResult<Uuid>;
    fn update_certification(&self, certification: &Certification) -> RepoResult<()>;
    /// Most recently issued first.
    fn list_certifications(&self, user_id: UserId) -> RepoResult<Vec<Certification>>;
    fn delete_certification(&self, user_id: UserId, id: Uuid) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn delete_owned(
        &self,
        table: &'static str,
        entity: &'static str,
        user_id: UserId,
        id: Uuid,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?1 AND user_id = ?2;"),
            params![id.to_string(), user_id.to_string()],
        )?;
        require_changed(changed, entity, id)
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn add_skill(&self, skill: &Skill) -> RepoResult<Uuid> {
        skill.validate()?;
        ensure_active_user(self.conn, skill.user_id)?;

        self.conn
            .execute(
                "INSERT INTO user_skills (id, user_id, name, level, years)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    skill.id.to_string(),
                    skill.user_id.to_string(),
                    skill.name.trim(),
                    skill.level.as_str(),
                    skill.years,
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || format!("skill `{}` is already listed", skill.name))
            })?;
        Ok(skill.id)
    }

    fn update_skill(&self, skill: &Skill) -> RepoResult<()> {
        skill.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE user_skills
                 SET name = ?3,
                     level = ?4,
                     years = ?5
                 WHERE id = ?1
                   AND user_id = ?2;",
                params![
                    skill.id.to_string(),
                    skill.user_id.to_string(),
                    skill.name.trim(),
                    skill.level.as_str(),
                    skill.years,
                ],
            )
            .map_err(|err| {
                conflict_on_unique(err, || format!("skill `{}` is already listed", skill.name))
            })?;
        require_changed(changed, "skill", skill.id)
    }

    fn list_skills(&self, user_id: UserId) -> RepoResult<Vec<Skill>> {
        query_rows(
            self.conn,
            "SELECT id, user_id, name, level, years, created_at
             FROM user_skills
             WHERE user_id = ?1
             ORDER BY name ASC, id ASC;",
            [user_id.to_string()],
            parse_skill_row,
        )
    }

    fn remove_skill(&self, user_id: UserId, skill_id: Uuid) -> RepoResult<()> {
        self.delete_owned("user_skills", "skill", user_id, skill_id)
    }

    fn list_users_with_skill(
        &self,
        skill: &str,
        page: PageRequest,
    ) -> RepoResult<Page<SkilledCandidate>> {
        require_text("skill", skill, 64)?;
        let mut filter = Filter::new();
        filter.text("s.name = ?", skill.trim());
        filter.raw("u.is_deleted = 0");
        filter.raw("u.is_active = 1");

        fetch_page(
            self.conn,
            "SELECT s.user_id, u.full_name, u.headline, s.level, s.years
             FROM user_skills s
             JOIN users u ON u.id = s.user_id",
            "SELECT COUNT(*) FROM user_skills s JOIN users u ON u.id = s.user_id",
            &filter,
            "CASE s.level
                WHEN 'expert' THEN 0
                WHEN 'advanced' THEN 1
                WHEN 'intermediate' THEN 2
                ELSE 3
             END ASC, COALESCE(s.years, 0) DESC, s.user_id ASC",
            page,
            |row| {
                Ok(SkilledCandidate {
                    user_id: uuid_col(row, "user_id")?,
                    full_name: row.get("full_name")?,
                    headline: row.get("headline")?,
                    skill_level: enum_col(row, "level", SkillLevel::parse)?,
                    years: row.get("years")?,
                })
            },
        )
    }

    fn add_education(&self, education: &Education) -> RepoResult<Uuid> {
        education.validate()?;
        ensure_active_user(self.conn, education.user_id)?;

        self.conn.execute(
            "INSERT INTO education (
                id,
                user_id,
                institution,
                degree,
                field_of_study,
                start_month,
                end_month,
                description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                education.id.to_string(),
                education.user_id.to_string(),
                education.institution.trim(),
                education.degree,
                education.field_of_study,
                education.start_month,
                education.end_month,
                education.description,
            ],
        )?;
        Ok(education.id)
    }

    fn update_education(&self, education: &Education) -> RepoResult<()> {
        education.validate()?;
        let changed = self.conn.execute(
            "UPDATE education
             SET institution = ?3,
                 degree = ?4,
                 field_of_study = ?5,
                 start_month = ?6,
                 end_month = ?7,
                 description = ?8
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                education.id.to_string(),
                education.user_id.to_string(),
                education.institution.trim(),
                education.degree,
                education.field_of_study,
                education.start_month,
                education.end_month,
                education.description,
            ],
        )?;
        require_changed(changed, "education", education.id)
    }

    fn list_education(&self, user_id: UserId) -> RepoResult<Vec<Education>> {
        query_rows(
            self.conn,
            &format!(
                "SELECT
                    id,
                    user_id,
                    institution,
                    degree,
                    field_of_study,
                    start_month,
                    end_month,
                    description,
                    created_at
                 FROM education
                 WHERE user_id = ?1
                 ORDER BY {MOST_RECENT_FIRST};"
            ),
            [user_id.to_string()],
            parse_education_row,
        )
    }

    fn delete_education(&self, user_id: UserId, id: Uuid) -> RepoResult<()> {
        self.delete_owned("education", "education", user_id, id)
    }

    fn add_experience(&self, experience: &WorkExperience) -> RepoResult<Uuid> {
        experience.validate()?;
        ensure_active_user(self.conn, experience.user_id)?;

        self.conn.execute(
            "INSERT INTO work_experience (
                id,
                user_id,
                company_name,
                title,
                location,
                start_month,
                end_month,
                description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                experience.id.to_string(),
                experience.user_id.to_string(),
                experience.company_name.trim(),
                experience.title.trim(),
                experience.location,
                experience.start_month,
                experience.end_month,
                experience.description,
            ],
        )?;
        Ok(experience.id)
    }

    fn update_experience(&self, experience: &WorkExperience) -> RepoResult<()> {
        experience.validate()?;
        let changed = self.conn.execute(
            "UPDATE work_experience
             SET company_name = ?3,
                 title = ?4,
                 location = ?5,
                 start_month = ?6,
                 end_month = ?7,
                 description = ?8
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                experience.id.to_string(),
                experience.user_id.to_string(),
                experience.company_name.trim(),
                experience.title.trim(),
                experience.location,
                experience.start_month,
                experience.end_month,
                experience.description,
            ],
        )?;
        require_changed(changed, "work experience", experience.id)
    }

    fn list_experience(&self, user_id: UserId) -> RepoResult<Vec<WorkExperience>> {
        query_rows(
            self.conn,
            &format!(
                "SELECT
                    id,
                    user_id,
                    company_name,
                    title,
                    location,
                    start_month,
                    end_month,
                    description,
                    created_at
                 FROM work_experience
                 WHERE user_id = ?1
                 ORDER BY {MOST_RECENT_FIRST};"
            ),
            [user_id.to_string()],
            parse_experience_row,
        )
    }

    fn delete_experience(&self, user_id: UserId, id: Uuid) -> RepoResult<()> {
        self.delete_owned("work_experience", "work experience", user_id, id)
    }

    fn add_portfolio_item(&self, item: &PortfolioItem) -> RepoResult<Uuid> {
        item.validate()?;
        ensure_active_user(self.conn, item.user_id)?;

        self.conn.execute(
            "INSERT INTO portfolio_items (id, user_id, title, url, description, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                item.id.to_string(),
                item.user_id.to_string(),
                item.title.trim(),
                item.url.trim(),
                item.description,
                item.image_url,
            ],
        )?;
        Ok(item.id)
    }

    fn update_portfolio_item(&self, item: &PortfolioItem) -> RepoResult<()> {
        item.validate()?;
        let changed = self.conn.execute(
            "UPDATE portfolio_items
             SET title = ?3,
                 url = ?4,
                 description = ?5,
                 image_url = ?6
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                item.id.to_string(),
                item.user_id.to_string(),
                item.title.trim(),
                item.url.trim(),
                item.description,
                item.image_url,
            ],
        )?;
        require_changed(changed, "portfolio item", item.id)
    }

    fn list_portfolio(&self, user_id: UserId) -> RepoResult<Vec<PortfolioItem>> {
        query_rows(
            self.conn,
            "SELECT id, user_id, title, url, description, image_url, created_at
             FROM portfolio_items
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC;",
            [user_id.to_string()],
            |row| {
                Ok(PortfolioItem {
                    id: uuid_col(row, "id")?,
                    user_id: uuid_col(row, "user_id")?,
                    title: row.get("title")?,
                    url: row.get("url")?,
                    description: row.get("description")?,
                    image_url: row.get("image_url")?,
                    created_at: row.get("created_at")?,
                })
            },
        )
    }

    fn delete_portfolio_item(&self, user_id: UserId, id: Uuid) -> RepoResult<()> {
        self.delete_owned("portfolio_items", "portfolio item", user_id, id)
    }

    fn add_certification(&self, certification: &Certification) -> RepoResult<Uuid> {
        certification.validate()?;
        ensure_active_user(self.conn, certification.user_id)?;

        self.conn.execute(
            "INSERT INTO certifications (
                id,
                user_id,
                name,
                issuer,
                issued_month,
                expires_month,
                credential_id,
                credential_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                certification.id.to_string(),
                certification.user_id.to_string(),
                certification.name.trim(),
                certification.issuer.trim(),
                certification.issued_month,
                certification.expires_month,
                certification.credential_id,
                certification.credential_url,
            ],
        )?;
        Ok(certification.id)
    }

    fn update_certification(&self, certification: &Certification) -> RepoResult<()> {
        certification.validate()?;
        let changed = self.conn.execute(
            "UPDATE certifications
             SET name = ?3,
                 issuer = ?4,
                 issued_month = ?5,
                 expires_month = ?6,
                 credential_id = ?7,
                 credential_url = ?8
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                certification.id.to_string(),
                certification.user_id.to_string(),
                certification.name.trim(),
                certification.issuer.trim(),
                certification.issued_month,
                certification.expires_month,
                certification.credential_id,
                certification.credential_url,
            ],
        )?;
        require_changed(changed, "certification", certification.id)
    }

    fn list_certifications(&self, user_id: UserId) -> RepoResult<Vec<Certification>> {
        query_rows(
            self.conn,
            "SELECT
                id,
                user_id,
                name,
                issuer,
                issued_month,
                expires_month,
                credential_id,
                credential_url,
                created_at
             FROM certifications
             WHERE user_id = ?1
             ORDER BY issued_month DESC, created_at DESC, id ASC;",
            [user_id.to_string()],
            |row| {
                Ok(Certification {
                    id: uuid_col(row, "id")?,
                    user_id: uuid_col(row, "user_id")?,
                    name: row.get("name")?,
                    issuer: row.get("issuer")?,
                    issued_month: row.get("issued_month")?,
                    expires_month: row.get("expires_month")?,
                    credential_id: row.get("credential_id")?,
                    credential_url: row.get("credential_url")?,
                    created_at: row.get("created_at")?,
                })
            },
        )
    }

    fn delete_certification(&self, user_id: UserId, id: Uuid) -> RepoResult<()> {
        self.delete_owned("certifications", "certification", user_id, id)
    }
}

fn parse_skill_row(row: &Row<'_>) -> RepoResult<Skill> {
    Ok(Skill {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        name: row.get("name")?,
        level: enum_col(row, "level", SkillLevel::parse)?,
        years: row.get("years")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_education_row(row: &Row<'_>) -> RepoResult<Education> {
    Ok(Education {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        institution: row.get("institution")?,
        degree: row.get("degree")?,
        field_of_study: row.get("field_of_study")?,
        start_month: row.get("start_month")?,
        end_month: row.get("end_month")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_experience_row(row: &Row<'_>) -> RepoResult<WorkExperience> {
    Ok(WorkExperience {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        company_name: row.get("company_name")?,
        title: row.get("title")?,
        location: row.get("location")?,
        start_month: row.get("start_month")?,
        end_month: row.get("end_month")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}
