//! Object-store gateway built on Apache OpenDAL.

use std::time::Duration;

use opendal::{ErrorKind, Operator, services};
use tracing::debug;

use daybook_shared::{StorageConfig, StorageProvider};

use super::error::StorageError;
use super::gateway::{
    MediaPayload, StorageGateway, StoredObject, bounded, check_payload, fresh_object_key,
};

/// Storage gateway for S3-compatible buckets, Azure Blob containers and the local filesystem.
///
/// Objects are written under `{folder}/{uuid}.{ext}` and served from `{public_url}/{key}`.
pub struct BucketGateway {
    operator: Operator,
    config: StorageConfig,
    public_url: String,
}

impl BucketGateway {
    /// Create a new bucket gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not a bucket provider or cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let (operator, public_url) = Self::create_operator(&config.provider)?;
        Ok(Self {
            operator,
            public_url: public_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<(Operator, String), StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
                public_url,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                let operator = Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish();
                Ok((operator, public_url.clone()))
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
                public_url,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                let operator = Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish();
                Ok((operator, public_url.clone()))
            }
            StorageProvider::LocalFs { root, public_url } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                let operator = Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish();
                Ok((operator, public_url.clone()))
            }
            StorageProvider::Cloudinary { .. } => Err(StorageError::configuration(
                "cloudinary is not a bucket provider",
            )),
        }
    }

    /// Public URL an object key is served from.
    #[must_use]
    pub fn public_url_for(&self, object_key: &str) -> String {
        format!("{}/{object_key}", self.public_url)
    }

    /// Check if an object exists in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    pub async fn exists(&self, object_key: &str) -> Result<bool, StorageError> {
        bounded(self.limit(), "stat", async {
            match self.operator.stat(object_key).await {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::from(e)),
            }
        })
        .await
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn limit(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

impl StorageGateway for BucketGateway {
    async fn upload(
        &self,
        payload: MediaPayload,
        folder: &str,
    ) -> Result<StoredObject, StorageError> {
        check_payload(&self.config, &payload)?;

        let object_key = fresh_object_key(folder, Some(payload.extension()));
        let size = payload.size();

        bounded(self.limit(), "upload", async {
            self.operator
                .write_with(&object_key, payload.bytes)
                .content_type(&payload.content_type)
                .await
                .map_err(StorageError::from)
        })
        .await?;

        debug!(object_key = %object_key, size, provider = self.provider_name(), "Stored object");

        Ok(StoredObject {
            url: self.public_url_for(&object_key),
            object_key,
        })
    }

    async fn delete(&self, object_key: &str) -> Result<bool, StorageError> {
        // Bucket deletes are idempotent, so look first to report whether anything was removed.
        if !self.exists(object_key).await? {
            return Ok(false);
        }

        bounded(self.limit(), "delete", async {
            self.operator
                .delete(object_key)
                .await
                .map_err(StorageError::from)
        })
        .await?;

        debug!(object_key = %object_key, provider = self.provider_name(), "Deleted object");
        Ok(true)
    }
}
