//! Persistence contract for journal entries.

use std::future::Future;

use daybook_shared::{JournalId, PageRequest, UserId};

use super::error::JournalError;
use super::types::{JournalChanges, JournalEntry, NewJournalEntry};

/// One page of a caller's entries.
#[derive(Debug, Clone, Default)]
pub struct JournalPage {
    /// Entries on this page, newest `journal_date` first.
    pub entries: Vec<JournalEntry>,
    /// Entries across all pages.
    pub total: u64,
}

/// Outcome of a successful [`JournalRepository::update`].
#[derive(Debug, Clone)]
pub struct UpdatedEntry {
    /// The row as written.
    pub entry: JournalEntry,
    /// Image key the row held just before the write, when the write replaced it.
    pub replaced_object_key: Option<String>,
}

/// Repository trait for journal persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
/// Writes filter by owner as well as id.
pub trait JournalRepository: Send + Sync {
    /// List an owner's entries ordered by `journal_date` then id, both descending.
    fn list_by_owner(
        &self,
        owner_id: UserId,
        page: PageRequest,
    ) -> impl Future<Output = Result<JournalPage, JournalError>> + Send;

    /// Find entry by ID, whoever owns it.
    fn find_by_id(
        &self,
        id: JournalId,
    ) -> impl Future<Output = Result<Option<JournalEntry>, JournalError>> + Send;

    /// Insert a new entry at version 1.
    fn create(
        &self,
        input: NewJournalEntry,
    ) -> impl Future<Output = Result<JournalEntry, JournalError>> + Send;

    /// Apply `changes` in one write. `None` when no row matched the id, owner and (if set)
    /// expected version.
    ///
    /// The image key read for [`UpdatedEntry::replaced_object_key`] must come from the same
    /// locked row the write lands on.
    fn update(
        &self,
        id: JournalId,
        owner_id: UserId,
        changes: JournalChanges,
    ) -> impl Future<Output = Result<Option<UpdatedEntry>, JournalError>> + Send;

    /// Delete entry by ID. Returns whether a row was removed.
    fn delete(
        &self,
        id: JournalId,
        owner_id: UserId,
    ) -> impl Future<Output = Result<bool, JournalError>> + Send;
}
