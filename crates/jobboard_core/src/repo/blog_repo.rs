//! Blog post repository.
//!
//! # Invariants
//! - `slug` is unique and fixed at creation.
//! - `published_at` is stamped on first publish and kept across unpublish.

use crate::model::engagement::{BlogPost, BlogStatus};
use crate::model::user::UserId;
use crate::model::validation::require_text;
use crate::repo::support::{
    ensure_active_user, ensure_connection_ready, enum_col, fetch_page, query_optional,
    query_rows, require_changed, unique_slug, uuid_col, Filter, Page, PageRequest, RepoError,
    RepoResult, RequiredTable,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const BLOG_SELECT_SQL: &str = "SELECT
    p.id,
    p.author_id,
    p.title,
    p.slug,
    p.excerpt,
    p.body,
    p.cover_image_url,
    p.status,
    p.view_count,
    p.published_at,
    p.created_at,
    p.updated_at
FROM blog_posts p";

const MAX_TAG_LEN: usize = 48;

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "blog_posts",
        columns: &["id", "author_id", "slug", "status", "view_count", "published_at"],
    },
    RequiredTable {
        name: "blog_post_tags",
        columns: &["post_id", "tag"],
    },
];

/// Filter options for the public blog index.
#[derive(Debug, Clone, Default)]
pub struct BlogListQuery {
    pub tag: Option<String>,
    /// Case-insensitive substring over title and excerpt.
    pub search: Option<String>,
    pub page: PageRequest,
}

pub trait BlogRepository {
    /// Inserts a post and its tags with a slug generated from the title.
    fn create_post(&self, post: &BlogPost) -> RepoResult<BlogPost>;
    fn get_post(&self, id: Uuid) -> RepoResult<Option<BlogPost>>;
    /// Published posts only.
    fn get_by_slug(&self, slug: &str) -> RepoResult<Option<BlogPost>>;
    /// Updates title and content; slug, status and tags are untouched.
    fn update_post(&self, post: &BlogPost) -> RepoResult<()>;
    fn publish(&self, id: Uuid) -> RepoResult<()>;
    fn unpublish(&self, id: Uuid) -> RepoResult<()>;
    fn set_tags(&self, id: Uuid, tags: &[String]) -> RepoResult<()>;
    fn tags(&self, id: Uuid) -> RepoResult<Vec<String>>;
    /// Newest publication first.
    fn list_published(&self, query: &BlogListQuery) -> RepoResult<Page<BlogPost>>;
    /// Every status, newest first.
    fn list_by_author(&self, author_id: UserId, page: PageRequest) -> RepoResult<Page<BlogPost>>;
    fn increment_view_count(&self, id: Uuid) -> RepoResult<()>;
    fn delete_post(&self, id: Uuid) -> RepoResult<()>;
}

#[derive(Debug)]
pub struct SqliteBlogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlogRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn with_tags(&self, mut post: BlogPost) -> RepoResult<BlogPost> {
        post.tags = self.tags(post.id)?;
        Ok(post)
    }

    fn with_tags_page(&self, page: Page<BlogPost>) -> RepoResult<Page<BlogPost>> {
        let items = page
            .items
            .into_iter()
            .map(|post| self.with_tags(post))
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(Page { items, ..page })
    }
}

impl BlogRepository for SqliteBlogRepository<'_> {
    fn create_post(&self, post: &BlogPost) -> RepoResult<BlogPost> {
        post.validate()?;
        validate_tags(&post.tags)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_active_user(&tx, post.author_id)?;
        let slug = unique_slug(&tx, "blog_posts", &post.title, "post")?;
        tx.execute(
            "INSERT INTO blog_posts (
                id,
                author_id,
                title,
                slug,
                excerpt,
                body,
                cover_image_url,
                status,
                published_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                CASE WHEN ?8 = 'published' THEN (CAST(unixepoch('subsec') * 1000 AS INTEGER)) END
            );",
            params![
                post.id.to_string(),
                post.author_id.to_string(),
                post.title.trim(),
                slug,
                post.excerpt,
                post.body,
                post.cover_image_url,
                post.status.as_str(),
            ],
        )?;
        replace_tags(&tx, post.id, &post.tags)?;
        tx.commit()?;

        self.get_post(post.id)?.ok_or(RepoError::NotFound {
            entity: "blog post",
            id: post.id,
        })
    }

    fn get_post(&self, id: Uuid) -> RepoResult<Option<BlogPost>> {
        query_optional(
            self.conn,
            &format!("{BLOG_SELECT_SQL} WHERE p.id = ?1;"),
            [id.to_string()],
            parse_post_row,
        )?
        .map(|post| self.with_tags(post))
        .transpose()
    }

    fn get_by_slug(&self, slug: &str) -> RepoResult<Option<BlogPost>> {
        query_optional(
            self.conn,
            &format!("{BLOG_SELECT_SQL} WHERE p.slug = ?1 AND p.status = 'published';"),
            [slug.trim().to_lowercase()],
            parse_post_row,
        )?
        .map(|post| self.with_tags(post))
        .transpose()
    }

    fn update_post(&self, post: &BlogPost) -> RepoResult<()> {
        post.validate()?;
        let changed = self.conn.execute(
            "UPDATE blog_posts
             SET title = ?2,
                 excerpt = ?3,
                 body = ?4,
                 cover_image_url = ?5,
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            params![
                post.id.to_string(),
                post.title.trim(),
                post.excerpt,
                post.body,
                post.cover_image_url,
            ],
        )?;
        require_changed(changed, "blog post", post.id)
    }

    fn publish(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE blog_posts
             SET status = 'published',
                 published_at = COALESCE(published_at, (CAST(unixepoch('subsec') * 1000 AS INTEGER))),
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "blog post", id)
    }

    fn unpublish(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE blog_posts
             SET status = 'draft',
                 updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "blog post", id)
    }

    fn set_tags(&self, id: Uuid, tags: &[String]) -> RepoResult<()> {
        validate_tags(tags)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE blog_posts
             SET updated_at = (CAST(unixepoch('subsec') * 1000 AS INTEGER))
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "blog post", id)?;
        replace_tags(&tx, id, tags)?;
        tx.commit()?;
        Ok(())
    }

    fn tags(&self, id: Uuid) -> RepoResult<Vec<String>> {
        query_rows(
            self.conn,
            "SELECT tag FROM blog_post_tags WHERE post_id = ?1 ORDER BY tag ASC;",
            [id.to_string()],
            |row| Ok(row.get::<_, String>("tag")?),
        )
    }

    fn list_published(&self, query: &BlogListQuery) -> RepoResult<Page<BlogPost>> {
        let mut filter = Filter::new();
        filter.raw("p.status = 'published'");
        if let Some(tag) = query.tag.as_deref() {
            filter.text(
                "EXISTS(SELECT 1 FROM blog_post_tags t WHERE t.post_id = p.id AND t.tag = ?)",
                tag.trim(),
            );
        }
        if let Some(search) = query.search.as_deref() {
            filter.search(&["p.title", "COALESCE(p.excerpt, '')"], search);
        }

        let page = fetch_page(
            self.conn,
            BLOG_SELECT_SQL,
            "SELECT COUNT(*) FROM blog_posts p",
            &filter,
            "p.published_at DESC, p.id ASC",
            query.page,
            parse_post_row,
        )?;
        self.with_tags_page(page)
    }

    fn list_by_author(&self, author_id: UserId, page: PageRequest) -> RepoResult<Page<BlogPost>> {
        let mut filter = Filter::new();
        filter.text("p.author_id = ?", &author_id.to_string());

        let page = fetch_page(
            self.conn,
            BLOG_SELECT_SQL,
            "SELECT COUNT(*) FROM blog_posts p",
            &filter,
            "p.created_at DESC, p.rowid DESC",
            page,
            parse_post_row,
        )?;
        self.with_tags_page(page)
    }

    fn increment_view_count(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE blog_posts SET view_count = view_count + 1 WHERE id = ?1;",
            [id.to_string()],
        )?;
        require_changed(changed, "blog post", id)
    }

    fn delete_post(&self, id: Uuid) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM blog_posts WHERE id = ?1;", [id.to_string()])?;
        require_changed(changed, "blog post", id)
    }
}

fn validate_tags(tags: &[String]) -> RepoResult<()> {
    for tag in tags {
        require_text("tag", tag, MAX_TAG_LEN)?;
    }
    Ok(())
}

fn replace_tags(conn: &Connection, id: Uuid, tags: &[String]) -> RepoResult<()> {
    conn.execute("DELETE FROM blog_post_tags WHERE post_id = ?1;", [id.to_string()])?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO blog_post_tags (post_id, tag) VALUES (?1, ?2);",
            params![id.to_string(), tag.trim()],
        )?;
    }
    Ok(())
}

fn parse_post_row(row: &Row<'_>) -> RepoResult<BlogPost> {
    Ok(BlogPost {
        id: uuid_col(row, "id")?,
        author_id: uuid_col(row, "author_id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        excerpt: row.get("excerpt")?,
        body: row.get("body")?,
        cover_image_url: row.get("cover_image_url")?,
        status: enum_col(row, "status", BlogStatus::parse)?,
        view_count: row.get("view_count")?,
        published_at: row.get("published_at")?,
        tags: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
