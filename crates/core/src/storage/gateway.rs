//! The storage gateway contract shared by every provider.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use daybook_shared::StorageConfig;
use super::error::StorageError;

/// Binary content handed to a gateway for upload.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    /// Raw bytes.
    pub bytes: Bytes,
    /// MIME type as declared by the client.
    pub content_type: String,
    /// Original filename, if the client sent one.
    pub file_name: Option<String>,
}

impl MediaPayload {
    /// Creates a payload from raw bytes and a MIME type.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            file_name: None,
        }
    }

    /// Attaches the original filename.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Image type implied by the leading bytes, if they carry a known signature.
    #[must_use]
    pub fn detected_type(&self) -> Option<&'static str> {
        let head = self.bytes.as_ref();
        if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some("image/jpeg")
        } else if head.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some("image/png")
        } else if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
            Some("image/gif")
        } else if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
            Some("image/webp")
        } else {
            None
        }
    }

    /// Whether the bytes really are an image of the declared type.
    #[must_use]
    pub fn content_matches_type(&self) -> bool {
        let declared = self.content_type.trim().to_ascii_lowercase();
        let declared = match declared.as_str() {
            "image/jpg" => "image/jpeg",
            other => other,
        };
        self.detected_type() == Some(declared)
    }

    /// File extension matching the MIME type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.content_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// A live object in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Publicly resolvable URL.
    pub url: String,
    /// Opaque provider handle used for later replace/delete.
    pub object_key: String,
}

/// Outcome of [`StorageGateway::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// The newly uploaded object.
    pub object: StoredObject,
    /// `false` when the previous object could not be confirmed gone and still needs cleanup.
    pub previous_removed: bool,
}

/// Uniform interface over a remote object-storage provider.
///
/// Gateways keep no state between calls. Every remote call is bounded by the configured
/// timeout; running out of time is reported as [`StorageError::Unavailable`].
pub trait StorageGateway: Send + Sync {
    /// Stores `payload` under a fresh key inside `folder`.
    fn upload(
        &self,
        payload: MediaPayload,
        folder: &str,
    ) -> impl Future<Output = Result<StoredObject, StorageError>> + Send;

    /// Removes an object. Unknown keys are not an error; the flag reports whether the
    /// provider confirmed a removal.
    fn delete(&self, object_key: &str)
    -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Deletes `old_object_key` (best-effort) and uploads `payload` in its place.
    ///
    /// A failed delete never blocks the upload; it is reported through
    /// [`Replacement::previous_removed`] instead.
    fn replace(
        &self,
        payload: MediaPayload,
        old_object_key: Option<&str>,
        folder: &str,
    ) -> impl Future<Output = Result<Replacement, StorageError>> + Send {
        async move {
            let previous_removed = match old_object_key {
                None => true,
                Some(key) => match self.delete(key).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(object_key = %key, error = %e, "Failed to delete replaced object");
                        false
                    }
                },
            };

            let object = self.upload(payload, folder).await?;

            Ok(Replacement {
                object,
                previous_removed,
            })
        }
    }
}

/// Runs `fut`, turning an elapsed `limit` into [`StorageError::Unavailable`].
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::timed_out(operation, limit)),
    }
}

/// Rejects payloads that break the configured limits before any network traffic.
pub(crate) fn check_payload(
    config: &StorageConfig,
    payload: &MediaPayload,
) -> Result<(), StorageError> {
    if payload.bytes.is_empty() {
        return Err(StorageError::payload_rejected("payload is empty"));
    }

    if payload.size() > config.max_file_size {
        return Err(StorageError::file_too_large(
            payload.size(),
            config.max_file_size,
        ));
    }

    if !config.is_mime_type_allowed(&payload.content_type) {
        return Err(StorageError::invalid_mime_type(&payload.content_type));
    }

    if !payload.content_matches_type() {
        return Err(StorageError::payload_rejected(format!(
            "content is not a valid '{}' image",
            payload.content_type
        )));
    }

    Ok(())
}

/// Generates a collision-free object key.
///
/// Format: `{sanitized_folder}/{uuid}` or `{sanitized_folder}/{uuid}.{extension}`
#[must_use]
pub fn fresh_object_key(folder: &str, extension: Option<&str>) -> String {
    let folder = sanitize_folder(folder);
    let id = Uuid::new_v4();
    match extension {
        Some(ext) => format!("{folder}/{id}.{ext}"),
        None => format!("{folder}/{id}"),
    }
}

/// Sanitize a folder hint for use as a key prefix.
///
/// Each path segment keeps only ASCII alphanumerics, dots, hyphens and underscores;
/// empty and `.`/`..` segments are dropped.
fn sanitize_folder(folder: &str) -> String {
    let segments: Vec<String> = folder
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|segment| {
            segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        "uploads".to_string()
    } else {
        segments.join("/")
    }
}
