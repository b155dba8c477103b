//! Journal resource service.
//!
//! Keeps each entry row and its stored image in step: rows only ever reference objects that
//! finished uploading, and objects no row references are handed to the cleanup queue.

use std::sync::Arc;

use daybook_shared::{JournalId, PageRequest, PageResponse, UserId};
use tracing::{debug, error, info, warn};

use super::error::JournalError;
use super::repository::JournalRepository;
use super::types::{JournalChanges, JournalEntry, JournalInput, MediaRef, NewJournalEntry};
use super::validation::{MediaPolicy, validate_for_create, validate_for_update};
use crate::storage::{CleanupQueue, CleanupReason, MediaPayload, StorageGateway};

/// Folder journal images are stored under unless configured otherwise.
pub const DEFAULT_FOLDER: &str = "journals";

/// Journal service for owner-scoped entry management.
pub struct JournalService<R, G> {
    repo: Arc<R>,
    storage: Arc<G>,
    cleanup: CleanupQueue,
    policy: MediaPolicy,
    folder: String,
}

impl<R, G> JournalService<R, G>
where
    R: JournalRepository,
    G: StorageGateway,
{
    /// Create a new journal service with the default media policy.
    #[must_use]
    pub fn new(repo: Arc<R>, storage: Arc<G>, cleanup: CleanupQueue) -> Self {
        Self {
            repo,
            storage,
            cleanup,
            policy: MediaPolicy::default(),
            folder: DEFAULT_FOLDER.to_string(),
        }
    }

    /// Replace the media policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MediaPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Store images under `folder`.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// List the caller's entries, newest `journal_date` first.
    pub async fn list(
        &self,
        caller: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<JournalEntry>, JournalError> {
        let page = page.clamped();
        let result = self.repo.list_by_owner(caller, page).await?;
        Ok(PageResponse::new(
            result.entries,
            page.page,
            page.per_page,
            result.total,
        ))
    }

    /// Create an entry, uploading its image first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any field or the image is invalid
    /// - The upload fails (no row is written)
    /// - The insert fails (the fresh upload is queued for cleanup)
    pub async fn create(
        &self,
        caller: UserId,
        input: JournalInput,
        media: Option<MediaPayload>,
    ) -> Result<JournalEntry, JournalError> {
        let fields = validate_for_create(&input, media.as_ref(), &self.policy)?;

        let media = match media {
            Some(payload) => Some(self.upload(payload).await?),
            None => None,
        };
        let uploaded_key = media.as_ref().map(|m| m.object_key.clone());

        let new_entry = NewJournalEntry {
            owner_id: caller,
            title: fields.title,
            content: fields.content,
            journal_date: fields.journal_date,
            media,
        };

        match self.repo.create(new_entry).await {
            Ok(entry) => {
                info!(
                    journal_id = %entry.id,
                    owner_id = %caller,
                    has_image = entry.media.is_some(),
                    "Journal created"
                );
                Ok(entry)
            }
            Err(e) => {
                error!(owner_id = %caller, error = %e, "Failed to insert journal");
                self.discard_upload(uploaded_key);
                Err(e)
            }
        }
    }

    /// Fetch one of the caller's entries.
    pub async fn get(&self, caller: UserId, id: JournalId) -> Result<JournalEntry, JournalError> {
        self.owned_entry(caller, id).await
    }

    /// Update an entry. Only supplied fields change; a new image replaces the old one.
    ///
    /// With `expected_version` set, the write only happens if nobody updated the entry since
    /// the caller read that version.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is missing or owned by someone else
    /// - Any supplied field or the image is invalid
    /// - The entry is no longer at `expected_version`
    /// - The upload fails (nothing is written)
    pub async fn update(
        &self,
        caller: UserId,
        id: JournalId,
        input: JournalInput,
        media: Option<MediaPayload>,
        expected_version: Option<i32>,
    ) -> Result<JournalEntry, JournalError> {
        let entry = self.owned_entry(caller, id).await?;
        let fields = validate_for_update(&input, media.as_ref(), &self.policy)?;

        if let Some(expected) = expected_version
            && expected != entry.version
        {
            return Err(JournalError::Conflict {
                id,
                expected,
                actual: entry.version,
            });
        }

        let media = match media {
            Some(payload) => Some(self.replace(&entry, payload).await?),
            None => None,
        };
        let uploaded_key = media.as_ref().map(|m| m.object_key.clone());

        let changes = JournalChanges {
            title: fields.title,
            content: fields.content,
            journal_date: fields.journal_date,
            media,
            expected_version,
        };

        match self.repo.update(id, caller, changes).await {
            Ok(Some(updated)) => {
                // A concurrent write may have swapped the image after our read; that key
                // was never handed to `replace` and is now referenced by no row.
                if let Some(displaced) = updated.replaced_object_key
                    && Some(displaced.as_str()) != entry.object_key()
                    && Some(&displaced) != uploaded_key.as_ref()
                {
                    warn!(
                        journal_id = %id,
                        object_key = %displaced,
                        "Image changed concurrently, queueing displaced object for cleanup"
                    );
                    self.cleanup.enqueue(displaced, CleanupReason::Replaced);
                }

                info!(
                    journal_id = %id,
                    owner_id = %caller,
                    version = updated.entry.version,
                    image_replaced = uploaded_key.is_some(),
                    "Journal updated"
                );
                Ok(updated.entry)
            }
            Ok(None) => {
                self.discard_upload(uploaded_key);
                Err(self.explain_missed_write(caller, id, expected_version).await)
            }
            Err(e) => {
                error!(journal_id = %id, error = %e, "Failed to update journal");
                self.discard_upload(uploaded_key);
                Err(e)
            }
        }
    }

    /// Delete an entry and, best-effort, its image.
    ///
    /// A storage failure never keeps the row alive; the image is queued for cleanup instead.
    pub async fn delete(&self, caller: UserId, id: JournalId) -> Result<(), JournalError> {
        let entry = self.owned_entry(caller, id).await?;

        if let Some(key) = entry.object_key() {
            match self.storage.delete(key).await {
                Ok(removed) => debug!(journal_id = %id, object_key = %key, removed, "Deleted journal image"),
                Err(e) => {
                    warn!(
                        journal_id = %id,
                        object_key = %key,
                        error = %e,
                        "Failed to delete journal image, queueing for cleanup"
                    );
                    self.cleanup.enqueue(key, CleanupReason::EntryDeleted);
                }
            }
        }

        if !self.repo.delete(id, caller).await? {
            return Err(JournalError::NotFound(id));
        }

        info!(journal_id = %id, owner_id = %caller, "Journal deleted");
        Ok(())
    }

    /// Load `id` and make sure `caller` owns it.
    async fn owned_entry(
        &self,
        caller: UserId,
        id: JournalId,
    ) -> Result<JournalEntry, JournalError> {
        let entry = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(JournalError::NotFound(id))?;

        if !entry.is_owned_by(caller) {
            warn!(journal_id = %id, caller = %caller, "Rejected access to another user's journal");
            return Err(JournalError::Forbidden(id));
        }

        Ok(entry)
    }

    async fn upload(&self, payload: MediaPayload) -> Result<MediaRef, JournalError> {
        self.storage
            .upload(payload, &self.folder)
            .await
            .map(MediaRef::from)
            .map_err(|e| {
                error!(error = %e, folder = %self.folder, "Image upload failed");
                JournalError::MediaUploadFailed(e)
            })
    }

    async fn replace(
        &self,
        entry: &JournalEntry,
        payload: MediaPayload,
    ) -> Result<MediaRef, JournalError> {
        let replacement = self
            .storage
            .replace(payload, entry.object_key(), &self.folder)
            .await
            .map_err(|e| {
                error!(journal_id = %entry.id, error = %e, "Image replace failed");
                JournalError::MediaUploadFailed(e)
            })?;

        if !replacement.previous_removed
            && let Some(old_key) = entry.object_key()
        {
            self.cleanup.enqueue(old_key, CleanupReason::Replaced);
        }

        Ok(MediaRef::from(replacement.object))
    }

    /// Hands an object that no row will reference to the cleanup queue.
    fn discard_upload(&self, object_key: Option<String>) {
        if let Some(key) = object_key {
            self.cleanup.enqueue(key, CleanupReason::UnreferencedUpload);
        }
    }

    /// Works out why a conditional update matched no row.
    async fn explain_missed_write(
        &self,
        caller: UserId,
        id: JournalId,
        expected_version: Option<i32>,
    ) -> JournalError {
        match self.repo.find_by_id(id).await {
            Ok(Some(current)) if current.is_owned_by(caller) => JournalError::Conflict {
                id,
                expected: expected_version.unwrap_or(current.version),
                actual: current.version,
            },
            Ok(Some(_)) => JournalError::Forbidden(id),
            Ok(None) => JournalError::NotFound(id),
            Err(e) => e,
        }
    }
}
