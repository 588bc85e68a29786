use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use url::Url;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_base: Url,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);
        let public_endpoint = config
            .s3_public_endpoint
            .as_deref()
            .unwrap_or(&config.s3_endpoint);

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_base: public_base_url(public_endpoint, &config.s3_bucket)?,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| anyhow!("failed to create bucket {}: {}", self.bucket, err))?;
        tracing::info!(bucket = %self.bucket, "created media bucket");
        Ok(())
    }

    pub async fn put_object(&self, key: &str, content_type: &str, body: bytes::Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    /// Public URL for an object key, as rendered in pages and API payloads.
    pub fn public_url(&self, key: &str) -> String {
        object_url(&self.public_base, key)
    }
}

fn public_base_url(endpoint: &str, bucket: &str) -> Result<Url> {
    let endpoint = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let mut base = Url::parse(&endpoint)?;
    let path = format!("{}/{}/", base.path().trim_end_matches('/'), bucket);
    base.set_path(&path);
    Ok(base)
}

fn object_url(base: &Url, key: &str) -> String {
    match base.join(key.trim_start_matches('/')) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_path_style_urls() {
        let base = public_base_url("http://localhost:4566", "media").unwrap();
        assert_eq!(
            object_url(&base, "posts/abc.png"),
            "http://localhost:4566/media/posts/abc.png"
        );
    }

    #[test]
    fn accepts_endpoint_without_scheme() {
        let base = public_base_url("cdn.example.com/static", "media").unwrap();
        assert_eq!(
            object_url(&base, "/posts/abc.jpg"),
            "http://cdn.example.com/static/media/posts/abc.jpg"
        );
    }
}
