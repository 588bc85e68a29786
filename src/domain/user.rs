use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Counters shown next to a user's profile and on their post pages.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProfileStats {
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}
