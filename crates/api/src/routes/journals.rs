//! Journal entry routes.
//!
//! Entries are created and updated from `multipart/form-data` so an image can travel with the
//! text fields. Every route is scoped to the authenticated caller.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header::IF_MATCH},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
};
use daybook_core::journal::{JournalEntry, JournalInput};
use daybook_core::storage::MediaPayload;
use daybook_shared::{JournalId, PageRequest, PageResponse, UserId};

/// Creates the journal routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/journals", get(list_journals).post(create_journal))
        .route(
            "/journals/{journal_id}",
            get(get_journal)
                .put(update_journal)
                // HTML forms cannot send PUT.
                .post(update_journal)
                .delete(delete_journal),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Journal entry as returned to clients. The storage key stays server-side.
#[derive(Debug, Serialize)]
pub struct JournalResponse {
    /// Entry ID.
    pub id: JournalId,
    /// Owner.
    pub user_id: UserId,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Day the entry is about.
    pub journal_date: NaiveDate,
    /// Public image URL, if any.
    pub image_url: Option<String>,
    /// Version for `If-Match`.
    pub version: i32,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Last updated at.
    pub updated_at: DateTime<Utc>,
}

impl From<JournalEntry> for JournalResponse {
    fn from(entry: JournalEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.owner_id,
            title: entry.title,
            content: entry.content,
            journal_date: entry.journal_date,
            image_url: entry.media.map(|m| m.url),
            version: entry.version,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Text fields and image read from a multipart body.
#[derive(Debug, Default)]
struct JournalForm {
    input: JournalInput,
    image: Option<MediaPayload>,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse the path segment; anything that is not an entry ID names no entry.
fn parse_journal_id(raw: &str) -> ApiResult<JournalId> {
    raw.parse().map_err(|_| ApiError::journal_not_found())
}

/// Parse `If-Match: "3"` (quotes and a weak `W/` prefix are tolerated).
fn expected_version(headers: &HeaderMap) -> ApiResult<Option<i32>> {
    let Some(value) = headers.get(IF_MATCH) else {
        return Ok(None);
    };

    let version = value
        .to_str()
        .ok()
        .map(|v| v.trim().trim_start_matches("W/").trim_matches('"'))
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|v| *v > 0);

    match version {
        Some(v) => Ok(Some(v)),
        None => Err(ApiError::bad_form(
            "version",
            "The If-Match header must carry an entry version.",
        )),
    }
}

fn unreadable(field: &str, err: &MultipartError) -> ApiError {
    warn!(field, error = %err.body_text(), "Failed to read multipart field");
    ApiError::bad_form(
        field,
        format!("The {} field failed to upload.", field.replace('_', " ")),
    )
}

/// Read the form, ignoring unknown parts such as `_method`.
async fn read_form(mut multipart: Multipart) -> ApiResult<JournalForm> {
    let mut form = JournalForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(unreadable("form", &e)),
        };
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "title" | "content" | "journal_date" => {
                let text = field.text().await.map_err(|e| unreadable(&name, &e))?;
                match name.as_str() {
                    "title" => form.input.title = Some(text),
                    "content" => form.input.content = Some(text),
                    _ => form.input.journal_date = Some(text),
                }
            }
            "image" => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| unreadable(&name, &e))?;

                // A file input left empty still sends a nameless, empty part.
                if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                    continue;
                }

                let mut payload = MediaPayload::new(bytes, content_type);
                if let Some(file_name) = file_name {
                    payload = payload.with_file_name(file_name);
                }
                form.image = Some(payload);
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/journals` - List the caller's entries, newest first.
async fn list_journals(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<PageResponse<JournalResponse>>> {
    let page = state.journals().list(auth.user_id(), page).await?;
    Ok(Json(page.map(JournalResponse::from)))
}

/// POST `/journals` - Create an entry, optionally with an image.
async fn create_journal(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_form(multipart).await?;
    let entry = state
        .journals()
        .create(auth.user_id(), form.input, form.image)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Journal created successfully",
            "journal": JournalResponse::from(entry),
        })),
    ))
}

/// GET `/journals/{journal_id}` - Fetch one of the caller's entries.
async fn get_journal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(journal_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_journal_id(&journal_id)?;
    let entry = state.journals().get(auth.user_id(), id).await?;

    Ok(Json(json!({ "journal": JournalResponse::from(entry) })))
}

/// PUT `/journals/{journal_id}` - Update supplied fields, replacing the image if one is sent.
async fn update_journal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(journal_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let id = parse_journal_id(&journal_id)?;
    let expected = expected_version(&headers)?;
    let form = read_form(multipart).await?;

    let entry = state
        .journals()
        .update(auth.user_id(), id, form.input, form.image, expected)
        .await?;

    Ok(Json(json!({
        "message": "Journal updated successfully",
        "journal": JournalResponse::from(entry),
    })))
}

/// DELETE `/journals/{journal_id}` - Delete an entry and its image.
async fn delete_journal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(journal_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_journal_id(&journal_id)?;
    state.journals().delete(auth.user_id(), id).await?;

    Ok(Json(json!({ "message": "Journal deleted successfully" })))
}
