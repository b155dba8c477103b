//! Object storage for journal images.
//!
//! Two interchangeable providers sit behind the [`StorageGateway`] trait:
//! - Image CDN: Cloudinary, over its signed REST upload API
//! - Buckets through Apache OpenDAL: S3-compatible (Cloudflare R2, Supabase Storage, AWS S3,
//!   MinIO), Azure Blob Storage, and the local filesystem for development
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         StorageGateway                           │
//! │              upload(payload, folder) -> StoredObject             │
//! │        replace(payload, old_key, folder) -> Replacement          │
//! │                   delete(object_key) -> bool                     │
//! ├────────────────────────────────┬────────────────────────────────┤
//! │       CloudinaryGateway        │         BucketGateway          │
//! │   POST /v1_1/{cloud}/image/*   │     OpenDAL write/stat/delete  │
//! └────────────────────────────────┴────────────────────────────────┘
//! ```
//!
//! Deletes that cannot happen inline go through the [`CleanupQueue`].

mod backend;
mod bucket;
mod cleanup;
mod cloudinary;
mod error;
mod gateway;

pub use backend::StorageBackend;
pub use bucket::BucketGateway;
pub use cleanup::{CleanupQueue, CleanupReason, CleanupReceiver, CleanupTask, CleanupWorker};
pub use cloudinary::CloudinaryGateway;
pub use daybook_shared::{CleanupConfig, StorageConfig, StorageProvider};
pub use error::StorageError;
pub use gateway::{MediaPayload, Replacement, StorageGateway, StoredObject, fresh_object_key};
