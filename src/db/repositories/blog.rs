//! Blog repository
//!
//! Marketing blog posts with comments and votes. Vote counters are stored
//! denormalized on the post row and adjusted together with the vote rows.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BlogComment, BlogPost, BlogVote, VoteKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a blog post
    async fn create_post(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Update a blog post
    async fn update_post(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Get by ID (any publish state)
    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>>;

    /// Get by slug (any publish state)
    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>>;

    /// Published posts, newest first
    async fn list_published(&self) -> Result<Vec<BlogPost>>;

    /// All posts including drafts (admin)
    async fn list_all(&self) -> Result<Vec<BlogPost>>;

    /// Delete a post
    async fn delete_post(&self, id: i64) -> Result<()>;

    /// Add a comment
    async fn add_comment(&self, comment: &BlogComment) -> Result<BlogComment>;

    /// Comments on a post, oldest first
    async fn list_comments(&self, blog_post_id: i64) -> Result<Vec<BlogComment>>;

    /// A user's vote on a post, if any
    async fn get_vote(&self, blog_post_id: i64, user_id: i64) -> Result<Option<BlogVote>>;

    /// Insert a vote row
    async fn insert_vote(&self, vote: &BlogVote) -> Result<()>;

    /// Flip an existing vote's direction
    async fn update_vote_kind(&self, id: i64, kind: VoteKind) -> Result<()>;

    /// Remove a vote row
    async fn delete_vote(&self, id: i64) -> Result<()>;

    /// Adjust the denormalized counters by the given deltas
    async fn adjust_counters(&self, blog_post_id: i64, up_delta: i64, down_delta: i64)
        -> Result<()>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! dispatch {
    ($self:ident, $sqlite_fn:ident, $mysql_fn:ident $(, $arg:expr)*) => {
        match $self.pool.driver() {
            DatabaseDriver::Sqlite => $sqlite_fn($self.pool.as_sqlite().unwrap() $(, $arg)*).await,
            DatabaseDriver::Mysql => $mysql_fn($self.pool.as_mysql().unwrap() $(, $arg)*).await,
        }
    };
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create_post(&self, post: &BlogPost) -> Result<BlogPost> {
        dispatch!(self, create_post_sqlite, create_post_mysql, post)
    }

    async fn update_post(&self, post: &BlogPost) -> Result<BlogPost> {
        dispatch!(self, update_post_sqlite, update_post_mysql, post)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        dispatch!(self, get_by_id_sqlite, get_by_id_mysql, id)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        dispatch!(self, get_by_slug_sqlite, get_by_slug_mysql, slug)
    }

    async fn list_published(&self) -> Result<Vec<BlogPost>> {
        dispatch!(self, list_published_sqlite, list_published_mysql)
    }

    async fn list_all(&self) -> Result<Vec<BlogPost>> {
        dispatch!(self, list_all_sqlite, list_all_mysql)
    }

    async fn delete_post(&self, id: i64) -> Result<()> {
        dispatch!(self, delete_post_sqlite, delete_post_mysql, id)
    }

    async fn add_comment(&self, comment: &BlogComment) -> Result<BlogComment> {
        dispatch!(self, add_comment_sqlite, add_comment_mysql, comment)
    }

    async fn list_comments(&self, blog_post_id: i64) -> Result<Vec<BlogComment>> {
        dispatch!(self, list_comments_sqlite, list_comments_mysql, blog_post_id)
    }

    async fn get_vote(&self, blog_post_id: i64, user_id: i64) -> Result<Option<BlogVote>> {
        dispatch!(self, get_vote_sqlite, get_vote_mysql, blog_post_id, user_id)
    }

    async fn insert_vote(&self, vote: &BlogVote) -> Result<()> {
        dispatch!(self, insert_vote_sqlite, insert_vote_mysql, vote)
    }

    async fn update_vote_kind(&self, id: i64, kind: VoteKind) -> Result<()> {
        dispatch!(self, update_vote_kind_sqlite, update_vote_kind_mysql, id, kind)
    }

    async fn delete_vote(&self, id: i64) -> Result<()> {
        dispatch!(self, delete_vote_sqlite, delete_vote_mysql, id)
    }

    async fn adjust_counters(
        &self,
        blog_post_id: i64,
        up_delta: i64,
        down_delta: i64,
    ) -> Result<()> {
        dispatch!(
            self,
            adjust_counters_sqlite,
            adjust_counters_mysql,
            blog_post_id,
            up_delta,
            down_delta
        )
    }
}

const BLOG_COLUMNS: &str = "id, slug, title, content, rendered_html, published, author_id, \
     upvotes, downvotes, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blog_posts (slug, title, content, rendered_html, published, author_id,
                                upvotes, downvotes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.rendered_html)
    .bind(post.published)
    .bind(post.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: result.last_insert_rowid(),
        upvotes: 0,
        downvotes: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn update_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<BlogPost> {
    sqlx::query(
        r#"
        UPDATE blog_posts
        SET slug = ?, title = ?, content = ?, rendered_html = ?, published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.rendered_html)
    .bind(post.published)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;

    get_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Blog post not found after update"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM blog_posts WHERE id = ?", BLOG_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog post")?;
    Ok(row.map(|row| sqlite_row_to_post(&row)))
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM blog_posts WHERE slug = ?",
        BLOG_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get blog post by slug")?;
    Ok(row.map(|row| sqlite_row_to_post(&row)))
}

async fn list_published_sqlite(pool: &SqlitePool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blog_posts WHERE published = 1 ORDER BY created_at DESC",
        BLOG_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list published blog posts")?;
    Ok(rows.iter().map(sqlite_row_to_post).collect())
}

async fn list_all_sqlite(pool: &SqlitePool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blog_posts ORDER BY created_at DESC",
        BLOG_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list blog posts")?;
    Ok(rows.iter().map(sqlite_row_to_post).collect())
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blog_posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog post")?;
    Ok(())
}

async fn add_comment_sqlite(pool: &SqlitePool, comment: &BlogComment) -> Result<BlogComment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO blog_comments (blog_post_id, user_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(comment.blog_post_id)
    .bind(comment.user_id)
    .bind(&comment.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add blog comment")?;

    Ok(BlogComment {
        id: result.last_insert_rowid(),
        created_at: now,
        ..comment.clone()
    })
}

async fn list_comments_sqlite(pool: &SqlitePool, blog_post_id: i64) -> Result<Vec<BlogComment>> {
    let rows = sqlx::query(
        "SELECT id, blog_post_id, user_id, content, created_at \
         FROM blog_comments WHERE blog_post_id = ? ORDER BY created_at",
    )
    .bind(blog_post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list blog comments")?;

    Ok(rows
        .iter()
        .map(|row| BlogComment {
            id: row.get("id"),
            blog_post_id: row.get("blog_post_id"),
            user_id: row.get("user_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn get_vote_sqlite(
    pool: &SqlitePool,
    blog_post_id: i64,
    user_id: i64,
) -> Result<Option<BlogVote>> {
    let row = sqlx::query(
        "SELECT id, blog_post_id, user_id, kind, created_at \
         FROM blog_votes WHERE blog_post_id = ? AND user_id = ?",
    )
    .bind(blog_post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get blog vote")?;

    match row {
        Some(row) => {
            let kind_str: String = row.get("kind");
            let kind = VoteKind::from_str(&kind_str)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid vote kind in database: {}", kind_str))?;
            Ok(Some(BlogVote {
                id: row.get("id"),
                blog_post_id: row.get("blog_post_id"),
                user_id: row.get("user_id"),
                kind,
                created_at: row.get("created_at"),
            }))
        }
        None => Ok(None),
    }
}

async fn insert_vote_sqlite(pool: &SqlitePool, vote: &BlogVote) -> Result<()> {
    sqlx::query(
        "INSERT INTO blog_votes (blog_post_id, user_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(vote.blog_post_id)
    .bind(vote.user_id)
    .bind(vote.kind.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert blog vote")?;
    Ok(())
}

async fn update_vote_kind_sqlite(pool: &SqlitePool, id: i64, kind: VoteKind) -> Result<()> {
    sqlx::query("UPDATE blog_votes SET kind = ? WHERE id = ?")
        .bind(kind.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update blog vote")?;
    Ok(())
}

async fn delete_vote_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blog_votes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog vote")?;
    Ok(())
}

async fn adjust_counters_sqlite(
    pool: &SqlitePool,
    blog_post_id: i64,
    up_delta: i64,
    down_delta: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE blog_posts SET upvotes = MAX(0, upvotes + ?), \
         downvotes = MAX(0, downvotes + ?) WHERE id = ?",
    )
    .bind(up_delta)
    .bind(down_delta)
    .bind(blog_post_id)
    .execute(pool)
    .await
    .context("Failed to adjust vote counters")?;
    Ok(())
}

fn sqlite_row_to_post(row: &sqlx::sqlite::SqliteRow) -> BlogPost {
    BlogPost {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        rendered_html: row.get("rendered_html"),
        published: row.get("published"),
        author_id: row.get("author_id"),
        upvotes: row.get("upvotes"),
        downvotes: row.get("downvotes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blog_posts (slug, title, content, rendered_html, published, author_id,
                                upvotes, downvotes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.rendered_html)
    .bind(post.published)
    .bind(post.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: result.last_insert_id() as i64,
        upvotes: 0,
        downvotes: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn update_post_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<BlogPost> {
    sqlx::query(
        r#"
        UPDATE blog_posts
        SET slug = ?, title = ?, content = ?, rendered_html = ?, published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.rendered_html)
    .bind(post.published)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;

    get_by_id_mysql(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Blog post not found after update"))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM blog_posts WHERE id = ?", BLOG_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog post")?;
    Ok(row.map(|row| mysql_row_to_post(&row)))
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM blog_posts WHERE slug = ?",
        BLOG_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get blog post by slug")?;
    Ok(row.map(|row| mysql_row_to_post(&row)))
}

async fn list_published_mysql(pool: &MySqlPool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blog_posts WHERE published = 1 ORDER BY created_at DESC",
        BLOG_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list published blog posts")?;
    Ok(rows.iter().map(mysql_row_to_post).collect())
}

async fn list_all_mysql(pool: &MySqlPool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM blog_posts ORDER BY created_at DESC",
        BLOG_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list blog posts")?;
    Ok(rows.iter().map(mysql_row_to_post).collect())
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blog_posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog post")?;
    Ok(())
}

async fn add_comment_mysql(pool: &MySqlPool, comment: &BlogComment) -> Result<BlogComment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO blog_comments (blog_post_id, user_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(comment.blog_post_id)
    .bind(comment.user_id)
    .bind(&comment.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add blog comment")?;

    Ok(BlogComment {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..comment.clone()
    })
}

async fn list_comments_mysql(pool: &MySqlPool, blog_post_id: i64) -> Result<Vec<BlogComment>> {
    let rows = sqlx::query(
        "SELECT id, blog_post_id, user_id, content, created_at \
         FROM blog_comments WHERE blog_post_id = ? ORDER BY created_at",
    )
    .bind(blog_post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list blog comments")?;

    Ok(rows
        .iter()
        .map(|row| BlogComment {
            id: row.get("id"),
            blog_post_id: row.get("blog_post_id"),
            user_id: row.get("user_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn get_vote_mysql(
    pool: &MySqlPool,
    blog_post_id: i64,
    user_id: i64,
) -> Result<Option<BlogVote>> {
    let row = sqlx::query(
        "SELECT id, blog_post_id, user_id, kind, created_at \
         FROM blog_votes WHERE blog_post_id = ? AND user_id = ?",
    )
    .bind(blog_post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get blog vote")?;

    match row {
        Some(row) => {
            let kind_str: String = row.get("kind");
            let kind = VoteKind::from_str(&kind_str)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid vote kind in database: {}", kind_str))?;
            Ok(Some(BlogVote {
                id: row.get("id"),
                blog_post_id: row.get("blog_post_id"),
                user_id: row.get("user_id"),
                kind,
                created_at: row.get("created_at"),
            }))
        }
        None => Ok(None),
    }
}

async fn insert_vote_mysql(pool: &MySqlPool, vote: &BlogVote) -> Result<()> {
    sqlx::query(
        "INSERT INTO blog_votes (blog_post_id, user_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(vote.blog_post_id)
    .bind(vote.user_id)
    .bind(vote.kind.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert blog vote")?;
    Ok(())
}

async fn update_vote_kind_mysql(pool: &MySqlPool, id: i64, kind: VoteKind) -> Result<()> {
    sqlx::query("UPDATE blog_votes SET kind = ? WHERE id = ?")
        .bind(kind.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update blog vote")?;
    Ok(())
}

async fn delete_vote_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM blog_votes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog vote")?;
    Ok(())
}

async fn adjust_counters_mysql(
    pool: &MySqlPool,
    blog_post_id: i64,
    up_delta: i64,
    down_delta: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE blog_posts SET upvotes = GREATEST(0, upvotes + ?), \
         downvotes = GREATEST(0, downvotes + ?) WHERE id = ?",
    )
    .bind(up_delta)
    .bind(down_delta)
    .bind(blog_post_id)
    .execute(pool)
    .await
    .context("Failed to adjust vote counters")?;
    Ok(())
}

fn mysql_row_to_post(row: &sqlx::mysql::MySqlRow) -> BlogPost {
    let published: i8 = row.get("published");
    BlogPost {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        rendered_html: row.get("rendered_html"),
        published: published != 0,
        author_id: row.get("author_id"),
        upvotes: row.get("upvotes"),
        downvotes: row.get("downvotes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxBlogRepository, i64) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let admin = users
            .create(&User::new(
                "admin".to_string(),
                "admin@example.com".to_string(),
                "hash".to_string(),
                UserRole::Admin,
            ))
            .await
            .expect("create user");

        (SqlxBlogRepository::new(pool), admin.id)
    }

    fn post(author_id: i64, slug: &str, published: bool) -> BlogPost {
        BlogPost {
            id: 0,
            slug: slug.to_string(),
            title: "Title".to_string(),
            content: "# Hello".to_string(),
            rendered_html: "<h1>Hello</h1>".to_string(),
            published,
            author_id,
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let (repo, author) = setup().await;
        repo.create_post(&post(author, "hello-world", true))
            .await
            .expect("create");

        let found = repo
            .get_by_slug("hello-world")
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.title, "Title");
        assert!(found.published);
    }

    #[tokio::test]
    async fn test_list_published_excludes_drafts() {
        let (repo, author) = setup().await;
        repo.create_post(&post(author, "live", true)).await.expect("create");
        repo.create_post(&post(author, "draft", false))
            .await
            .expect("create");

        assert_eq!(repo.list_published().await.expect("list").len(), 1);
        assert_eq!(repo.list_all().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn test_comments() {
        let (repo, author) = setup().await;
        let p = repo.create_post(&post(author, "p", true)).await.expect("create");

        repo.add_comment(&BlogComment {
            id: 0,
            blog_post_id: p.id,
            user_id: author,
            content: "nice".to_string(),
            created_at: Utc::now(),
        })
        .await
        .expect("comment");

        let comments = repo.list_comments(p.id).await.expect("list");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "nice");
    }

    #[tokio::test]
    async fn test_vote_rows_and_counters() {
        let (repo, author) = setup().await;
        let p = repo.create_post(&post(author, "p", true)).await.expect("create");

        repo.insert_vote(&BlogVote {
            id: 0,
            blog_post_id: p.id,
            user_id: author,
            kind: VoteKind::Up,
            created_at: Utc::now(),
        })
        .await
        .expect("vote");
        repo.adjust_counters(p.id, 1, 0).await.expect("adjust");

        let found = repo.get_by_id(p.id).await.expect("get").expect("found");
        assert_eq!(found.upvotes, 1);

        let vote = repo
            .get_vote(p.id, author)
            .await
            .expect("get_vote")
            .expect("found");
        assert_eq!(vote.kind, VoteKind::Up);

        // Flip direction
        repo.update_vote_kind(vote.id, VoteKind::Down)
            .await
            .expect("flip");
        repo.adjust_counters(p.id, -1, 1).await.expect("adjust");

        let found = repo.get_by_id(p.id).await.expect("get").expect("found");
        assert_eq!(found.upvotes, 0);
        assert_eq!(found.downvotes, 1);
    }

    #[tokio::test]
    async fn test_counters_never_go_negative() {
        let (repo, author) = setup().await;
        let p = repo.create_post(&post(author, "p", true)).await.expect("create");

        repo.adjust_counters(p.id, -5, -5).await.expect("adjust");
        let found = repo.get_by_id(p.id).await.expect("get").expect("found");
        assert_eq!(found.upvotes, 0);
        assert_eq!(found.downvotes, 0);
    }
}
