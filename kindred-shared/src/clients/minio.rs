use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("bucket setup failed: {0}")]
    Bucket(String),
}

/// S3-compatible object store client (MinIO in development).
#[derive(Clone)]
pub struct MinioClient {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl MinioClient {
    pub async fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Result<Self, ObjectStoreError> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "minio");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Self {
            client: S3Client::from_conf(config),
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        };
        client.ensure_bucket().await?;

        tracing::info!(endpoint = %endpoint, bucket = %bucket, "object store client initialized");
        Ok(client)
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Bucket(e.to_string()))?;
        tracing::info!(bucket = %self.bucket, "bucket created");
        Ok(())
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_url, self.bucket, key)
    }

    /// Stores the object and returns its public URL.
    pub async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Upload(e.to_string()))?;

        tracing::debug!(key = %key, size, "object uploaded");
        Ok(self.object_url(key))
    }
}
