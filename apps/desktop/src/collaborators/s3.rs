//! S3/R2 object store holding the backup document.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client, Config,
};
use thiserror::Error;
use wordcard_core::failure::ProviderError;

use super::{AuthToken, RemoteObject, RemoteStore};
use crate::config::RemoteConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ProviderError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ProviderError::with_status(404, e.to_string()),
            _ => ProviderError::new(e.to_string()),
        }
    }
}

/// S3-compatible [`RemoteStore`].
///
/// Credentials come from [`RemoteConfig`] or the AWS default chain, so the
/// session token handed in by the sync engine is not used here.
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3RemoteStore {
    /// Build a client from configuration.
    ///
    /// Explicit keys win; without them the default credential chain is used.
    pub async fn new(config: &RemoteConfig) -> Result<Self, StorageError> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(
                    access_key, secret_key, None,  // session token
                    None,  // expiry
                    "env", // provider name
                );
                Config::builder()
                    .region(region)
                    .credentials_provider(credentials)
                    .behavior_version_latest()
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
            _ => {
                return Err(StorageError::Config(
                    "S3_ACCESS_KEY and S3_SECRET_KEY must be set together".to_string(),
                ))
            }
        };

        // Custom endpoint for R2 or other S3-compatible services
        if let Some(endpoint_url) = &config.endpoint {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    /// Object key for a backup name.
    ///
    /// Format: `{prefix}/{name}`, or just `{name}` without a prefix.
    pub fn make_key(prefix: &str, name: &str) -> String {
        let name = name.trim_start_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    fn name_of<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.prefix)
            .unwrap_or(key)
            .trim_start_matches('/')
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        tracing::info!("Uploaded backup to S3: {}", key);
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn list(&self, _token: &AuthToken) -> Result<Vec<RemoteObject>, ProviderError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|obj| obj.key())
            .map(|key| RemoteObject {
                id: key.to_string(),
                name: self.name_of(key).to_string(),
            })
            .collect())
    }

    async fn get(&self, _token: &AuthToken, id: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("NoSuchKey") || err_str.contains("not found") {
                    StorageError::NotFound(id.to_string())
                } else {
                    StorageError::S3(err_str)
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn create(
        &self,
        _token: &AuthToken,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ProviderError> {
        let key = Self::make_key(&self.prefix, name);
        self.put(&key, bytes).await?;
        Ok(key)
    }

    async fn update(
        &self,
        _token: &AuthToken,
        id: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.put(id, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_key_joins_prefix() {
        assert_eq!(S3RemoteStore::make_key("user-1", "backup.json"), "user-1/backup.json");
        assert_eq!(S3RemoteStore::make_key("", "/backup.json"), "backup.json");
    }

    #[tokio::test]
    async fn half_configured_credentials_are_rejected() {
        let config = RemoteConfig {
            bucket: "cards".into(),
            region: "auto".into(),
            endpoint: None,
            access_key: Some("key".into()),
            secret_key: None,
            prefix: String::new(),
        };
        assert!(matches!(
            S3RemoteStore::new(&config).await,
            Err(StorageError::Config(_))
        ));
    }
}
