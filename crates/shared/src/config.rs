//! Application configuration management.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Background cleanup of orphaned storage objects.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a whole request, uploads included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Apply pending migrations before serving.
    #[serde(default)]
    pub migrate_on_start: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key used to verify (and, for tooling, sign) tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[hidden]")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .finish()
    }
}

/// Object storage provider configuration.
///
/// Selected with the `type` key, e.g. `DAYBOOK__STORAGE__PROVIDER__TYPE=s3`.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// Cloudinary image CDN.
    Cloudinary {
        /// Cloud name (account identifier).
        cloud_name: String,
        /// API key.
        api_key: String,
        /// API secret used to sign requests.
        api_secret: String,
        /// Base URL of the upload API.
        #[serde(default = "default_cloudinary_api_base")]
        api_base: String,
    },
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, MinIO.
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
        /// Public base URL objects are served from.
        public_url: String,
    },
    /// Azure Blob Storage.
    AzureBlob {
        /// Storage account name.
        account: String,
        /// Storage access key.
        access_key: String,
        /// Container name.
        container: String,
        /// Public base URL objects are served from.
        public_url: String,
    },
    /// Local filesystem (development only).
    LocalFs {
        /// Root directory path.
        root: PathBuf,
        /// Public base URL objects are served from.
        public_url: String,
    },
}

fn default_cloudinary_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}

impl StorageProvider {
    /// Create a Cloudinary provider.
    #[must_use]
    pub fn cloudinary(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self::Cloudinary {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base: default_cloudinary_api_base(),
        }
    }

    /// Create S3-compatible provider.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            public_url: public_url.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self::LocalFs {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    /// Get the provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cloudinary { .. } => "cloudinary",
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local",
        }
    }
}

impl fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudinary {
                cloud_name,
                api_base,
                ..
            } => f
                .debug_struct("Cloudinary")
                .field("cloud_name", cloud_name)
                .field("api_key", &"[hidden]")
                .field("api_secret", &"[hidden]")
                .field("api_base", api_base)
                .finish(),
            Self::S3 {
                endpoint,
                bucket,
                region,
                public_url,
                ..
            } => f
                .debug_struct("S3")
                .field("endpoint", endpoint)
                .field("bucket", bucket)
                .field("access_key_id", &"[hidden]")
                .field("secret_access_key", &"[hidden]")
                .field("region", region)
                .field("public_url", public_url)
                .finish(),
            Self::AzureBlob {
                account,
                container,
                public_url,
                ..
            } => f
                .debug_struct("AzureBlob")
                .field("account", account)
                .field("access_key", &"[hidden]")
                .field("container", container)
                .field("public_url", public_url)
                .finish(),
            Self::LocalFs { root, public_url } => f
                .debug_struct("LocalFs")
                .field("root", root)
                .field("public_url", public_url)
                .finish(),
        }
    }
}

/// Storage configuration handed to the storage gateway constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Folder that journal images are stored under.
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Upper bound for a single remote storage call.
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types for upload.
    #[serde(default = "StorageConfig::default_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_folder() -> String {
    "journals".to_string()
}

fn default_storage_timeout() -> u64 {
    30
}

fn default_max_file_size() -> u64 {
    StorageConfig::DEFAULT_MAX_FILE_SIZE
}

impl StorageConfig {
    /// Default max file size: 5 MiB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            folder: default_folder(),
            timeout_secs: default_storage_timeout(),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: Self::default_mime_types(),
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set the remote call timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Default allowed MIME types for journal images.
    #[must_use]
    pub fn default_mime_types() -> Vec<String> {
        vec![
            "image/jpeg".to_string(),
            "image/png".to_string(),
            "image/jpg".to_string(),
            "image/gif".to_string(),
        ]
    }

    /// Check if a MIME type is allowed.
    #[must_use]
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type))
    }
}

/// Retry policy for the orphaned-object cleanup worker.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Delete attempts per object before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("DAYBOOK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.allowed_mime_types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_base_env<F: FnOnce()>(extra: &[(&str, Option<&str>)], f: F) {
        let mut vars = vec![
            ("RUN_MODE", Some("test-nonexistent")),
            ("DAYBOOK__DATABASE__URL", Some("postgres://localhost/daybook")),
            ("DAYBOOK__JWT__SECRET", Some("secret")),
            ("DAYBOOK__STORAGE__PROVIDER__TYPE", Some("local_fs")),
            ("DAYBOOK__STORAGE__PROVIDER__ROOT", Some("./storage")),
            (
                "DAYBOOK__STORAGE__PROVIDER__PUBLIC_URL",
                Some("http://localhost:8080/media"),
            ),
        ];
        vars.extend_from_slice(extra);
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_load_from_environment_with_defaults() {
        with_base_env(&[], || {
            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.database.max_connections, 10);
            assert_eq!(config.jwt.access_token_expiry_secs, 900);
            assert_eq!(config.storage.provider.name(), "local");
            assert_eq!(config.storage.folder, "journals");
            assert_eq!(config.storage.max_file_size, StorageConfig::DEFAULT_MAX_FILE_SIZE);
            assert_eq!(config.cleanup.max_attempts, 5);
        });
    }

    #[test]
    fn test_load_cloudinary_provider_and_overrides() {
        with_base_env(
            &[
                ("DAYBOOK__SERVER__PORT", Some("9000")),
                ("DAYBOOK__STORAGE__PROVIDER__TYPE", Some("cloudinary")),
                ("DAYBOOK__STORAGE__PROVIDER__ROOT", None),
                ("DAYBOOK__STORAGE__PROVIDER__PUBLIC_URL", None),
                ("DAYBOOK__STORAGE__PROVIDER__CLOUD_NAME", Some("demo")),
                ("DAYBOOK__STORAGE__PROVIDER__API_KEY", Some("key")),
                ("DAYBOOK__STORAGE__PROVIDER__API_SECRET", Some("shh")),
                (
                    "DAYBOOK__STORAGE__ALLOWED_MIME_TYPES",
                    Some("image/png,image/webp"),
                ),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.port, 9000);
                assert_eq!(config.storage.provider.name(), "cloudinary");
                assert!(config.storage.is_mime_type_allowed("image/webp"));
                assert!(!config.storage.is_mime_type_allowed("image/gif"));
            },
        );
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let provider = StorageProvider::cloudinary("demo", "key-123", "secret-456");
        let rendered = format!("{provider:?}");
        assert!(rendered.contains("demo"));
        assert!(!rendered.contains("key-123"));
        assert!(!rendered.contains("secret-456"));

        let jwt = JwtConfig {
            secret: "top-secret".to_string(),
            access_token_expiry_secs: 60,
        };
        assert!(!format!("{jwt:?}").contains("top-secret"));
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::new(StorageProvider::local_fs("./storage", "http://x"));
        assert_eq!(config.timeout_secs, 30);
        assert!(config.is_mime_type_allowed("image/png"));
        assert!(config.is_mime_type_allowed("IMAGE/JPEG"));
        assert!(!config.is_mime_type_allowed("application/pdf"));
    }
}
