use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::pagination::{Page, PageWindow};
use crate::domain::post::{GroupRef, Post};
use crate::infra::db::Db;

const POST_COLUMNS: &str = "p.id, p.text, p.pub_date, p.author_id, u.username AS author_username, \
     p.group_id, g.slug AS group_slug, g.title AS group_title, p.image_key \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum PostScope {
    All,
    Author(Uuid),
    Group(Uuid),
}

/// Changes to apply to a post. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    pub group_id: Option<Option<Uuid>>,
    pub image_key: Option<Option<String>>,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image_key: Option<String>,
    ) -> Result<Post> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (author_id, text, group_id, image_key) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(author_id)
        .bind(text)
        .bind(group_id)
        .bind(image_key)
        .fetch_one(self.db.pool())
        .await?;

        self.get_post(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", id))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} WHERE p.id = $1", POST_COLUMNS))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| post_from_row(&row)))
    }

    /// Applies `changes` when `author_id` owns the post. `None` means the
    /// post does not exist or belongs to someone else.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts \
             SET text = COALESCE($3, text), \
                 group_id = CASE WHEN $4 THEN $5 ELSE group_id END, \
                 image_key = CASE WHEN $6 THEN $7 ELSE image_key END \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(changes.text)
        .bind(changes.group_id.is_some())
        .bind(changes.group_id.flatten())
        .bind(changes.image_key.is_some())
        .bind(changes.image_key.flatten())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_post(post_id).await
    }

    pub async fn delete_post(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self, scope: PostScope) -> Result<i64> {
        let count: i64 = match scope {
            PostScope::All => {
                sqlx::query_scalar("SELECT COUNT(*) FROM posts")
                    .fetch_one(self.db.pool())
                    .await?
            }
            PostScope::Author(author_id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
                    .bind(author_id)
                    .fetch_one(self.db.pool())
                    .await?
            }
            PostScope::Group(group_id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE group_id = $1")
                    .bind(group_id)
                    .fetch_one(self.db.pool())
                    .await?
            }
        };
        Ok(count)
    }

    /// Newest first.
    pub async fn list(&self, scope: PostScope, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let rows = match scope {
            PostScope::All => {
                sqlx::query(&format!(
                    "SELECT {} ORDER BY p.pub_date DESC, p.id DESC LIMIT $1 OFFSET $2",
                    POST_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?
            }
            PostScope::Author(author_id) => {
                sqlx::query(&format!(
                    "SELECT {} WHERE p.author_id = $1 \
                     ORDER BY p.pub_date DESC, p.id DESC LIMIT $2 OFFSET $3",
                    POST_COLUMNS
                ))
                .bind(author_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?
            }
            PostScope::Group(group_id) => {
                sqlx::query(&format!(
                    "SELECT {} WHERE p.group_id = $1 \
                     ORDER BY p.pub_date DESC, p.id DESC LIMIT $2 OFFSET $3",
                    POST_COLUMNS
                ))
                .bind(group_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn page(&self, scope: PostScope, page: Option<&str>, per_page: i64) -> Result<Page<Post>> {
        let total = self.count(scope).await?;
        let window = PageWindow::resolve(page, total, per_page);
        let posts = self.list(scope, window.offset(), window.limit()).await?;
        Ok(window.into_page(posts))
    }

    /// Every post, newest first, optionally limited to one group.
    pub async fn list_all(&self, group_id: Option<Uuid>) -> Result<Vec<Post>> {
        let rows = match group_id {
            Some(group_id) => {
                sqlx::query(&format!(
                    "SELECT {} WHERE p.group_id = $1 ORDER BY p.pub_date DESC, p.id DESC",
                    POST_COLUMNS
                ))
                .bind(group_id)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} ORDER BY p.pub_date DESC, p.id DESC",
                    POST_COLUMNS
                ))
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(post_from_row).collect())
    }
}

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<Uuid> = row.get("group_id");
    let group = match (group_id, row.get::<Option<String>, _>("group_slug")) {
        (Some(id), Some(slug)) => Some(GroupRef {
            id,
            slug,
            title: row.get::<Option<String>, _>("group_title").unwrap_or_default(),
        }),
        _ => None,
    };

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        group,
        image_key: row.get("image_key"),
    }
}

pub(crate) fn post_select() -> &'static str {
    POST_COLUMNS
}
