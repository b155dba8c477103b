//! Journal entry types and data structures.

use chrono::{DateTime, NaiveDate, Utc};
use daybook_shared::{JournalId, UserId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::storage::StoredObject;

/// Reference to the image stored for an entry.
///
/// URL and key always travel together, so an entry either has both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Public URL of the image.
    pub url: String,
    /// Provider handle used to replace or delete the image.
    pub object_key: String,
}

impl From<StoredObject> for MediaRef {
    fn from(object: StoredObject) -> Self {
        Self {
            url: object.url,
            object_key: object.object_key,
        }
    }
}

/// Journal entry domain model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalId,
    /// Owning user.
    pub owner_id: UserId,
    /// Entry title.
    pub title: String,
    /// Entry body.
    pub content: String,
    /// Day the entry is about.
    pub journal_date: NaiveDate,
    /// Attached image, if any.
    pub media: Option<MediaRef>,
    /// Starts at 1, bumped on every update.
    pub version: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Public URL of the attached image.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.media.as_ref().map(|m| m.url.as_str())
    }

    /// Storage key of the attached image.
    #[must_use]
    pub fn object_key(&self) -> Option<&str> {
        self.media.as_ref().map(|m| m.object_key.as_str())
    }

    /// Whether `user` owns this entry.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}

/// Raw text fields as submitted by a client.
///
/// `None` means the field was not sent; on update that leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct JournalInput {
    /// Entry title.
    #[validate(length(
        max = 255,
        code = "max",
        message = "The title field must not be greater than 255 characters."
    ))]
    pub title: Option<String>,
    /// Entry body.
    pub content: Option<String>,
    /// Entry date, `YYYY-MM-DD`.
    pub journal_date: Option<String>,
}

impl JournalInput {
    /// Input with every field set.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        journal_date: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            journal_date: Some(journal_date.into()),
        }
    }
}

/// Validated data for a new entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    /// Owning user.
    pub owner_id: UserId,
    /// Entry title.
    pub title: String,
    /// Entry body.
    pub content: String,
    /// Day the entry is about.
    pub journal_date: NaiveDate,
    /// Uploaded image, if any.
    pub media: Option<MediaRef>,
}

/// Validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct JournalChanges {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New date.
    pub journal_date: Option<NaiveDate>,
    /// Replacement image.
    pub media: Option<MediaRef>,
    /// Only write if the stored version still equals this.
    pub expected_version: Option<i32>,
}

impl JournalChanges {
    /// Applies the changes to `entry` in place, bumping its version and timestamp.
    ///
    /// Returns the image key the changes displaced, if any.
    pub fn apply_to(&self, entry: &mut JournalEntry, now: DateTime<Utc>) -> Option<String> {
        let replaced = self
            .media
            .as_ref()
            .and_then(|_| entry.object_key().map(str::to_owned));
        if let Some(title) = &self.title {
            entry.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            entry.content.clone_from(content);
        }
        if let Some(date) = self.journal_date {
            entry.journal_date = date;
        }
        if let Some(media) = &self.media {
            entry.media = Some(media.clone());
        }
        entry.version = entry.version.saturating_add(1);
        entry.updated_at = now;
        replaced
    }

    /// Whether the stored `version` satisfies the precondition.
    #[must_use]
    pub fn version_matches(&self, version: i32) -> bool {
        self.expected_version.is_none_or(|expected| expected == version)
    }
}
