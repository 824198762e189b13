//! Blog service
//!
//! Admin-authored marketing blog. Markdown is rendered to HTML on save,
//! comments require an account, and votes toggle: voting the same
//! direction twice removes the vote, switching direction moves it.

use crate::db::repositories::BlogRepository;
use crate::models::{BlogComment, BlogPost, BlogVote, User, VoteKind};
use anyhow::Context;
use chrono::Utc;
use pulldown_cmark::{html, Options, Parser};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Blog post not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("A post with that slug already exists")]
    SlugTaken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for creating or updating a blog post
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BlogPostInput {
    pub title: String,
    /// Markdown source
    pub content: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub published: bool,
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    /// Create a post. The slug defaults to a slugified title.
    pub async fn create_post(
        &self,
        author: &User,
        input: BlogPostInput,
    ) -> Result<BlogPost, BlogServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let slug = match input.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => slugify(s),
            _ => slugify(title),
        };
        if slug.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Slug must contain at least one letter or digit".to_string(),
            ));
        }

        if self
            .repo
            .get_by_slug(&slug)
            .await
            .context("Failed to check slug")?
            .is_some()
        {
            return Err(BlogServiceError::SlugTaken);
        }

        let now = Utc::now();
        let post = self
            .repo
            .create_post(&BlogPost {
                id: 0,
                slug,
                title: title.to_string(),
                content: input.content.clone(),
                rendered_html: render_markdown(&input.content),
                published: input.published,
                author_id: author.id,
                upvotes: 0,
                downvotes: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .context("Failed to create blog post")?;

        Ok(post)
    }

    /// Update a post, re-rendering the HTML. The slug is immutable.
    pub async fn update_post(
        &self,
        id: i64,
        input: BlogPostInput,
    ) -> Result<BlogPost, BlogServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get blog post")?
            .ok_or(BlogServiceError::NotFound)?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let updated = self
            .repo
            .update_post(&BlogPost {
                title: title.to_string(),
                content: input.content.clone(),
                rendered_html: render_markdown(&input.content),
                published: input.published,
                updated_at: Utc::now(),
                ..existing
            })
            .await
            .context("Failed to update blog post")?;

        Ok(updated)
    }

    /// Published post by slug, for the public blog.
    pub async fn get_published(&self, slug: &str) -> Result<BlogPost, BlogServiceError> {
        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get blog post")?
            .ok_or(BlogServiceError::NotFound)?;
        if !post.published {
            return Err(BlogServiceError::NotFound);
        }
        Ok(post)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<BlogPost, BlogServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get blog post")?
            .ok_or(BlogServiceError::NotFound)
    }

    pub async fn list_published(&self) -> Result<Vec<BlogPost>, BlogServiceError> {
        Ok(self
            .repo
            .list_published()
            .await
            .context("Failed to list blog posts")?)
    }

    /// All posts including drafts, for the admin back-office.
    pub async fn list_all(&self) -> Result<Vec<BlogPost>, BlogServiceError> {
        Ok(self
            .repo
            .list_all()
            .await
            .context("Failed to list blog posts")?)
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), BlogServiceError> {
        self.get_by_id(id).await?;
        self.repo
            .delete_post(id)
            .await
            .context("Failed to delete blog post")?;
        Ok(())
    }

    /// Comment on a published post.
    pub async fn add_comment(
        &self,
        user: &User,
        blog_post_id: i64,
        content: &str,
    ) -> Result<BlogComment, BlogServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Comment cannot be empty".to_string(),
            ));
        }

        let post = self.get_by_id(blog_post_id).await?;
        if !post.published {
            return Err(BlogServiceError::NotFound);
        }

        let comment = self
            .repo
            .add_comment(&BlogComment {
                id: 0,
                blog_post_id,
                user_id: user.id,
                content: content.to_string(),
                created_at: Utc::now(),
            })
            .await
            .context("Failed to add comment")?;

        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        blog_post_id: i64,
    ) -> Result<Vec<BlogComment>, BlogServiceError> {
        self.get_by_id(blog_post_id).await?;
        Ok(self
            .repo
            .list_comments(blog_post_id)
            .await
            .context("Failed to list comments")?)
    }

    /// Toggle a vote. Returns the post with fresh counters.
    ///
    /// Same direction twice removes the vote. Opposite direction moves
    /// it, adjusting both counters in one step.
    pub async fn vote(
        &self,
        user: &User,
        blog_post_id: i64,
        kind: VoteKind,
    ) -> Result<BlogPost, BlogServiceError> {
        let post = self.get_by_id(blog_post_id).await?;
        if !post.published {
            return Err(BlogServiceError::NotFound);
        }

        let existing = self
            .repo
            .get_vote(blog_post_id, user.id)
            .await
            .context("Failed to get vote")?;

        match existing {
            None => {
                self.repo
                    .insert_vote(&BlogVote {
                        id: 0,
                        blog_post_id,
                        user_id: user.id,
                        kind,
                        created_at: Utc::now(),
                    })
                    .await
                    .context("Failed to insert vote")?;
                let (up, down) = deltas(kind, 1);
                self.repo
                    .adjust_counters(blog_post_id, up, down)
                    .await
                    .context("Failed to adjust counters")?;
            }
            Some(vote) if vote.kind == kind => {
                self.repo
                    .delete_vote(vote.id)
                    .await
                    .context("Failed to delete vote")?;
                let (up, down) = deltas(kind, -1);
                self.repo
                    .adjust_counters(blog_post_id, up, down)
                    .await
                    .context("Failed to adjust counters")?;
            }
            Some(vote) => {
                self.repo
                    .update_vote_kind(vote.id, kind)
                    .await
                    .context("Failed to flip vote")?;
                let (add_up, add_down) = deltas(kind, 1);
                let (rm_up, rm_down) = deltas(vote.kind, -1);
                self.repo
                    .adjust_counters(blog_post_id, add_up + rm_up, add_down + rm_down)
                    .await
                    .context("Failed to adjust counters")?;
            }
        }

        self.get_by_id(blog_post_id).await
    }
}

fn deltas(kind: VoteKind, sign: i64) -> (i64, i64) {
    match kind {
        VoteKind::Up => (sign, 0),
        VoteKind::Down => (0, sign),
    }
}

/// Render markdown to HTML with tables and strikethrough enabled.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Lowercase, alphanumeric runs joined by single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
