use anyhow::Result;
use redis::{AsyncCommands, Client};

const PAGE_PREFIX: &str = "page:";

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn get_page(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let page = conn.get::<_, Option<String>>(page_key(key)).await?;
        Ok(page)
    }

    pub async fn put_page(&self, key: &str, body: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(page_key(key), body, ttl_seconds)
            .await?;
        Ok(())
    }

    /// Drops every cached page. Returns the number of keys removed.
    pub async fn clear_pages(&self) -> Result<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = format!("{}*", PAGE_PREFIX);
        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await?;
        }

        Ok(keys.len())
    }
}

fn page_key(key: &str) -> String {
    format!("{}{}", PAGE_PREFIX, key)
}
