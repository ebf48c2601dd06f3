use async_trait::async_trait;

use kindred_shared::clients::minio::MinioClient;

/// Blob store for profile photos.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the bytes under `key` and returns the public URL.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl ObjectStorage for MinioClient {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        Ok(MinioClient::upload(self, key, bytes, content_type).await?)
    }
}
