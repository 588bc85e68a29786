use anyhow::Result;
use uuid::Uuid;

use crate::app::pagination::{Page, PageWindow, POSTS_PER_PAGE};
use crate::app::posts::{post_from_row, post_select};
use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Posts by every author `user_id` follows, newest first. The reader's
    /// own posts are not included.
    pub async fn follow_feed(&self, user_id: Uuid, page: Option<&str>) -> Result<Page<Post>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts \
             WHERE author_id IN (SELECT following_id FROM follows WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let window = PageWindow::resolve(page, total, POSTS_PER_PAGE);

        let rows = sqlx::query(&format!(
            "SELECT {} \
             WHERE p.author_id IN (SELECT following_id FROM follows WHERE user_id = $1) \
             ORDER BY p.pub_date DESC, p.id DESC \
             LIMIT $2 OFFSET $3",
            post_select()
        ))
        .bind(user_id)
        .bind(window.limit())
        .bind(window.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(window.into_page(rows.iter().map(post_from_row).collect()))
    }
}
