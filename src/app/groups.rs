use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::forms::ValidGroup;
use crate::app::pagination::{Page, PageWindow};
use crate::domain::group::Group;
use crate::infra::db::Db;

const GROUP_COLUMNS: &str = "g.id, g.title, g.slug, g.description, g.author_id, \
     u.username AS author_username \
     FROM groups g \
     LEFT JOIN users u ON u.id = g.author_id";

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_group(&self, author_id: Uuid, group: ValidGroup) -> Result<Group> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO groups (title, slug, description, author_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        self.get_group(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("group {} vanished after insert", id))
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {} WHERE g.id = $1", GROUP_COLUMNS))
            .bind(group_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| group_from_row(&row)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {} WHERE g.slug = $1", GROUP_COLUMNS))
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| group_from_row(&row)))
    }

    pub async fn exists(&self, group_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM groups WHERE id = $1)")
            .bind(group_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    /// Whether `slug` is used by a group other than `except`.
    pub async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM groups WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(self.db.pool())
        .await?;
        Ok(taken)
    }

    /// Rewrites a group owned by `author_id`. `None` when the group does not
    /// exist or belongs to someone else.
    pub async fn update_group(
        &self,
        group_id: Uuid,
        author_id: Uuid,
        group: ValidGroup,
    ) -> Result<Option<Group>> {
        let result = sqlx::query(
            "UPDATE groups \
             SET title = $3, slug = $4, description = $5 \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(group_id)
        .bind(author_id)
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_group(group_id).await
    }

    /// Posts in the group survive with their group reference cleared.
    pub async fn delete_group(&self, group_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1 AND author_id = $2")
            .bind(group_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ordered by title.
    pub async fn list_all(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(&format!("SELECT {} ORDER BY g.title, g.slug", GROUP_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    pub async fn page(&self, page: Option<&str>, per_page: i64) -> Result<Page<Group>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
            .fetch_one(self.db.pool())
            .await?;
        let window = PageWindow::resolve(page, total, per_page);

        let rows = sqlx::query(&format!(
            "SELECT {} ORDER BY g.title, g.slug LIMIT $1 OFFSET $2",
            GROUP_COLUMNS
        ))
        .bind(window.limit())
        .bind(window.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(window.into_page(rows.iter().map(group_from_row).collect()))
    }
}

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
    }
}
