//! Core business logic for Daybook.
//!
//! This crate contains the journal lifecycle with ZERO web or database dependencies.
//! Persistence is reached through the [`journal::JournalRepository`] trait, image storage
//! through [`storage::StorageGateway`].
//!
//! # Modules
//!
//! - `journal` - Owner-scoped journal entries, validation and the resource service
//! - `storage` - Object storage gateways (CDN and buckets) and orphan cleanup

pub mod journal;
pub mod storage;
