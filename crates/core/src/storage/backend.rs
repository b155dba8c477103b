//! Provider selection from configuration.

use daybook_shared::{StorageConfig, StorageProvider};
use tracing::info;

use super::bucket::BucketGateway;
use super::cloudinary::CloudinaryGateway;
use super::error::StorageError;
use super::gateway::{MediaPayload, StorageGateway, StoredObject};

/// The storage gateway chosen at start-up.
pub enum StorageBackend {
    /// Image CDN.
    Cloudinary(CloudinaryGateway),
    /// S3-compatible bucket, Azure Blob container or local directory.
    Bucket(BucketGateway),
}

impl StorageBackend {
    /// Build the gateway matching `config.provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let backend = match config.provider {
            StorageProvider::Cloudinary { .. } => {
                Self::Cloudinary(CloudinaryGateway::from_config(config)?)
            }
            StorageProvider::S3 { .. }
            | StorageProvider::AzureBlob { .. }
            | StorageProvider::LocalFs { .. } => Self::Bucket(BucketGateway::from_config(config)?),
        };

        info!(provider = backend.provider_name(), "Storage backend ready");
        Ok(backend)
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Cloudinary(_) => "cloudinary",
            Self::Bucket(gateway) => gateway.provider_name(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        match self {
            Self::Cloudinary(gateway) => gateway.config(),
            Self::Bucket(gateway) => gateway.config(),
        }
    }
}

impl StorageGateway for StorageBackend {
    async fn upload(
        &self,
        payload: MediaPayload,
        folder: &str,
    ) -> Result<StoredObject, StorageError> {
        match self {
            Self::Cloudinary(gateway) => gateway.upload(payload, folder).await,
            Self::Bucket(gateway) => gateway.upload(payload, folder).await,
        }
    }

    async fn delete(&self, object_key: &str) -> Result<bool, StorageError> {
        match self {
            Self::Cloudinary(gateway) => gateway.delete(object_key).await,
            Self::Bucket(gateway) => gateway.delete(object_key).await,
        }
    }
}
