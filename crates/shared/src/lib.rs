//! Shared types, errors, and configuration for Daybook.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT handling and the access gate that turns a bearer credential into a caller identity

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod types;


pub use auth::Claims;
pub use config::{AppConfig, CleanupConfig, StorageConfig, StorageProvider};
pub use error::{AppError, AppResult};
pub use gate::{AccessError, AccessGate};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use types::{JournalId, PageRequest, PageResponse, UserId};
