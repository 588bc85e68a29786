use anyhow::Result;

use crate::app::images::ValidImage;
use crate::infra::storage::ObjectStorage;

/// Post images in object storage.
#[derive(Clone)]
pub struct MediaService {
    storage: ObjectStorage,
}

impl MediaService {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    /// Uploads the image and returns its object key.
    pub async fn store_post_image(&self, image: &ValidImage) -> Result<String> {
        let key = image.object_key();
        self.storage
            .put_object(&key, image.content_type(), image.bytes())
            .await?;
        tracing::info!(key = %key, bucket = %self.storage.bucket(), "stored post image");
        Ok(key)
    }

    /// Best effort; a leftover object is harmless.
    pub async fn discard(&self, key: &str) {
        if let Err(err) = self.storage.delete_object(key).await {
            tracing::warn!(error = ?err, key, "failed to delete post image");
        }
    }

    pub fn url(&self, key: &str) -> String {
        self.storage.public_url(key)
    }
}
