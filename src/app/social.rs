use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::social_graph::Follow;
use crate::infra::db::{is_unique_violation, Db};

const FOLLOW_COLUMNS: &str = "f.id, f.user_id, fu.username AS user_username, \
     f.following_id, tu.username AS following_username, f.created_at \
     FROM follows f \
     JOIN users fu ON fu.id = f.user_id \
     JOIN users tu ON tu.id = f.following_id";

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("cannot follow yourself")]
    SelfFollow,
    #[error("already following this user")]
    AlreadyFollowing,
    #[error("user not found")]
    UnknownUser,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for FollowError {
    fn from(err: sqlx::Error) -> Self {
        let err = anyhow::Error::from(err);
        if is_unique_violation(&err, "follows_user_following_key") {
            return Self::AlreadyFollowing;
        }
        Self::Storage(err)
    }
}

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates the edge `follower_id -> followee_id`. A duplicate is an
    /// error, never a silent success.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<Follow, FollowError> {
        if follower_id == followee_id {
            return Err(FollowError::SelfFollow);
        }

        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO follows (user_id, following_id) \
             SELECT $1, $2 \
             WHERE EXISTS (SELECT 1 FROM users WHERE id = $2) \
             ON CONFLICT (user_id, following_id) DO NOTHING \
             RETURNING id",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(self.db.pool())
        .await?;

        let follow_id = match inserted {
            Some(id) => id,
            None => {
                if self.is_following(follower_id, followee_id).await? {
                    return Err(FollowError::AlreadyFollowing);
                }
                return Err(FollowError::UnknownUser);
            }
        };

        let follow = self
            .get_follow(follow_id)
            .await?
            .ok_or(FollowError::UnknownUser)?;
        tracing::info!(follower_id = %follower_id, followee_id = %followee_id, "follow created");
        Ok(follow)
    }

    /// Returns whether an edge was removed.
    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    pub async fn followers_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn following_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn get_follow(&self, follow_id: Uuid) -> Result<Option<Follow>> {
        let row = sqlx::query(&format!("SELECT {} WHERE f.id = $1", FOLLOW_COLUMNS))
            .bind(follow_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| follow_from_row(&row)))
    }

    /// All follow records, oldest first. `search` matches either username
    /// exactly.
    pub async fn list_follows(&self, search: Option<&str>) -> Result<Vec<Follow>> {
        let rows = match search {
            Some(username) => {
                sqlx::query(&format!(
                    "SELECT {} WHERE fu.username = $1 OR tu.username = $1 \
                     ORDER BY f.created_at, f.id",
                    FOLLOW_COLUMNS
                ))
                .bind(username)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} ORDER BY f.created_at, f.id", FOLLOW_COLUMNS))
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        Ok(rows.iter().map(follow_from_row).collect())
    }

    /// Points an existing record owned by `user_id` at another user, under
    /// the same rules as `follow`. `Ok(None)` when no such record exists.
    pub async fn retarget_follow(
        &self,
        follow_id: Uuid,
        user_id: Uuid,
        followee_id: Uuid,
    ) -> Result<Option<Follow>, FollowError> {
        if user_id == followee_id {
            return Err(FollowError::SelfFollow);
        }
        if self.is_following(user_id, followee_id).await? {
            return Err(FollowError::AlreadyFollowing);
        }

        let result = sqlx::query(
            "UPDATE follows SET following_id = $3 \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(follow_id)
        .bind(user_id)
        .bind(followee_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(self.get_follow(follow_id).await?)
    }

    pub async fn delete_follow(&self, follow_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE id = $1 AND user_id = $2")
            .bind(follow_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn follow_from_row(row: &PgRow) -> Follow {
    Follow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_username: row.get("user_username"),
        following_id: row.get("following_id"),
        following_username: row.get("following_username"),
        created_at: row.get("created_at"),
    }
}
