//! Journal entries owned by a single user, each with an optional image.
//!
//! This module provides business logic for journal entries including:
//! - Field and image validation
//! - Owner-scoped listing and lookup
//! - Create, update and delete that keep rows and stored images consistent

mod error;
mod repository;
mod service;
mod types;
mod validation;


pub use error::JournalError;
pub use repository::{JournalPage, JournalRepository, UpdatedEntry};
pub use service::{DEFAULT_FOLDER, JournalService};
pub use types::{JournalChanges, JournalEntry, JournalInput, MediaRef, NewJournalEntry};
pub use validation::{
    CreateFields, FieldErrors, MediaPolicy, UpdateFields, parse_journal_date, validate_for_create,
    validate_for_update,
};
