//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for journal entries
//! - Authentication middleware
//! - The `ApiError` response type

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use daybook_core::journal::{JournalService, MediaPolicy};
use daybook_core::storage::{CleanupQueue, StorageBackend};
use daybook_db::JournalRepository;
use daybook_shared::{AccessGate, StorageProvider};

pub use error::{ApiError, ApiResult};

/// Room left in the request body for the text fields sent next to an image.
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// Default upper bound for a whole request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Resolves bearer credentials to callers.
    pub gate: Arc<AccessGate>,
    /// Configured image storage.
    pub storage: Arc<StorageBackend>,
    /// Sender side of the orphaned-object cleanup queue.
    pub cleanup: CleanupQueue,
    /// Limits applied to uploaded images.
    pub policy: MediaPolicy,
    /// Folder images are stored under.
    pub folder: String,
    /// Upper bound for a whole request, uploads included.
    pub request_timeout: Duration,
}

impl AppState {
    /// Builds state whose media policy and folder follow the storage configuration.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gate: AccessGate,
        storage: StorageBackend,
        cleanup: CleanupQueue,
    ) -> Self {
        let policy = MediaPolicy::from_config(storage.config());
        let folder = storage.config().folder.clone();
        Self {
            db: Arc::new(db),
            gate: Arc::new(gate),
            storage: Arc::new(storage),
            cleanup,
            policy,
            folder,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Journal service backed by the shared pool and storage.
    pub fn journals(&self) -> JournalService<JournalRepository, StorageBackend> {
        let repo = JournalRepository::new((*self.db).clone());
        JournalService::new(
            Arc::new(repo),
            Arc::clone(&self.storage),
            self.cleanup.clone(),
        )
        .with_policy(self.policy.clone())
        .with_folder(self.folder.clone())
    }

    /// Largest request body accepted, an image plus its form fields.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.policy.max_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(FORM_FIELDS_ALLOWANCE)
    }
}

/// Path part of a public base URL, without a trailing slash.
fn url_path(public_url: &str) -> &str {
    let rest = public_url
        .split_once("://")
        .map_or(public_url, |(_, rest)| rest);
    rest.find('/')
        .map_or("", |i| &rest[i..])
        .trim_end_matches('/')
}

/// Creates the main application router.
///
/// With local filesystem storage the stored objects are also served, under the path of the
/// configured public URL, so the URLs handed to clients resolve.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().nest("/api/v1", routes::api_routes_with_state(state.clone()));

    if let StorageProvider::LocalFs { root, public_url } = &state.storage.config().provider {
        let mount = url_path(public_url);
        info!(root = %root.display(), mount, "Serving local media");
        router = if mount.is_empty() {
            router.fallback_service(ServeDir::new(root))
        } else {
            router.nest_service(mount, ServeDir::new(root))
        };
    }

    router
        .layer(DefaultBodyLimit::max(state.body_limit()))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
