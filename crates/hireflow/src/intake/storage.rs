use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::StorageConfig;

/// Byte access to uploaded objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object {bucket}/{path} not found")]
    NotFound { bucket: String, path: String },
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("storage returned HTTP {status} for {bucket}/{path}")]
    Status {
        status: u16,
        bucket: String,
        path: String,
    },
}

/// Object store speaking the `/storage/v1/object/<bucket>/<path>` download API.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    service_key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>, service_key: Option<String>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        })
    }

    /// Returns `None` when no storage URL is configured.
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>, StorageError> {
        config
            .base_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.service_key.clone()))
            .transpose()
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{bucket}/{path}", self.base_url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut request = self.client.get(self.object_url(bucket, path));
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| StorageError::Transport(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
