//! Image CDN gateway over the Cloudinary upload REST API.

use std::time::Duration;

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use daybook_shared::{StorageConfig, StorageProvider};

use super::error::StorageError;
use super::gateway::{MediaPayload, StorageGateway, StoredObject, check_payload, fresh_object_key};

/// Incoming transformation applied to every upload: fit within 1200x1200, auto quality.
const UPLOAD_TRANSFORMATION: &str = "c_limit,w_1200,h_1200,q_auto:good";

/// Storage gateway for the Cloudinary image CDN.
///
/// The object key is the CDN public id; the URL is the `secure_url` the CDN reports.
pub struct CloudinaryGateway {
    client: Client,
    config: StorageConfig,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryGateway {
    /// Create a new CDN gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not Cloudinary or the HTTP client cannot be built.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let StorageProvider::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
            api_base,
        } = &config.provider
        else {
            return Err(StorageError::configuration(format!(
                "{} is not a CDN provider",
                config.provider.name()
            )));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::configuration(e.to_string()))?;

        Ok(Self {
            client,
            cloud_name: cloud_name.clone(),
            api_key: api_key.clone(),
            api_secret: api_secret.clone(),
            api_base: api_base.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{action}",
            self.api_base, self.cloud_name
        )
    }

    /// Sign `params` with the API secret.
    fn sign(&self, params: &[(&str, String)]) -> String {
        sign_params(params, &self.api_secret)
    }
}

/// Computes the request signature: parameters sorted by name, joined as `k=v&k=v`, the secret
/// appended, SHA-256 hex digest.
pub(crate) fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Maps a non-success response onto the storage error taxonomy.
async fn classify_failure(response: Response) -> StorageError {
    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error.message,
        Err(_) => status.to_string(),
    };

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => StorageError::payload_rejected(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::unavailable(format!("authentication failed: {message}"))
        }
        _ => StorageError::unavailable(format!("{status}: {message}")),
    }
}

impl StorageGateway for CloudinaryGateway {
    async fn upload(
        &self,
        payload: MediaPayload,
        folder: &str,
    ) -> Result<StoredObject, StorageError> {
        check_payload(&self.config, &payload)?;

        let public_id = fresh_object_key(folder, None);
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.clone()),
            ("timestamp", timestamp.clone()),
            ("transformation", UPLOAD_TRANSFORMATION.to_string()),
        ]);

        let file_name = payload
            .file_name
            .clone()
            .unwrap_or_else(|| format!("upload.{}", payload.extension()));
        let size = payload.size();
        let file = Part::bytes(payload.bytes.to_vec())
            .file_name(file_name)
            .mime_str(&payload.content_type)
            .map_err(|e| StorageError::payload_rejected(e.to_string()))?;

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("public_id", public_id)
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let body: UploadResponse = response.json().await?;
        debug!(object_key = %body.public_id, size, provider = "cloudinary", "Stored object");

        Ok(StoredObject {
            url: body.secure_url,
            object_key: body.public_id,
        })
    }

    async fn delete(&self, object_key: &str) -> Result<bool, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", object_key.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let params = [
            ("public_id", object_key.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" => {
                debug!(object_key = %object_key, provider = "cloudinary", "Deleted object");
                Ok(true)
            }
            "not found" => Ok(false),
            other => Err(StorageError::unavailable(format!(
                "unexpected destroy result: {other}"
            ))),
        }
    }
}
