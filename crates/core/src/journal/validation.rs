//! Field validation for journal input and attached images.
//!
//! Every failing field is reported at once, keyed by field name, with messages meant for
//! end users.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use daybook_shared::StorageConfig;
use serde::Serialize;
use validator::{Validate, ValidationErrors};

use super::types::JournalInput;
use crate::storage::MediaPayload;

/// Validation failures keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Records a failure for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Whether nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// One-line summary: the first message, plus a count of the rest.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut messages = self.0.values().flatten();
        let Some(first) = messages.next() else {
            return "The given data was invalid.".to_string();
        };
        match messages.count() {
            0 => first.clone(),
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        }
    }

    fn merge(&mut self, other: Self) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = Self::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| format!("The {field} field is invalid."), ToString::to_string);
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

/// Limits applied to attached images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    /// Largest accepted image in bytes.
    pub max_bytes: u64,
    /// Accepted MIME types, compared case-insensitively.
    pub allowed_mime_types: Vec<String>,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            max_bytes: StorageConfig::DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: StorageConfig::default_mime_types(),
        }
    }
}

impl MediaPolicy {
    /// Policy matching the storage limits.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_bytes: config.max_file_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
        }
    }

    /// Failure message for `payload`, if it breaks the policy.
    fn check(&self, payload: &MediaPayload) -> Option<String> {
        if payload.bytes.is_empty() {
            return Some("The image field failed to upload.".to_string());
        }

        let allowed = self
            .allowed_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&payload.content_type));
        if !allowed || !payload.content_matches_type() {
            let kinds: Vec<&str> = self
                .allowed_mime_types
                .iter()
                .map(|t| t.rsplit('/').next().unwrap_or(t))
                .collect();
            return Some(format!(
                "The image field must be a file of type: {}.",
                kinds.join(", ")
            ));
        }

        if payload.size() > self.max_bytes {
            return Some(format!(
                "The image field must not be greater than {} kilobytes.",
                self.max_bytes / 1024
            ));
        }

        None
    }
}

/// Fields of a valid create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFields {
    /// Trimmed title.
    pub title: String,
    /// Trimmed body.
    pub content: String,
    /// Parsed date.
    pub journal_date: NaiveDate,
}

/// Fields of a valid update request; `None` means not supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFields {
    /// Trimmed title.
    pub title: Option<String>,
    /// Trimmed body.
    pub content: Option<String>,
    /// Parsed date.
    pub journal_date: Option<NaiveDate>,
}

/// Validates a create request: every text field is required.
pub fn validate_for_create(
    input: &JournalInput,
    media: Option<&MediaPayload>,
    policy: &MediaPolicy,
) -> Result<CreateFields, FieldErrors> {
    let (fields, mut errors) = check_fields(input, media, policy);

    for (name, present) in [
        ("title", input.title.is_some()),
        ("content", input.content.is_some()),
        ("journal_date", input.journal_date.is_some()),
    ] {
        if !present {
            errors.add(name, required_message(name));
        }
    }

    match (fields.title, fields.content, fields.journal_date) {
        (Some(title), Some(content), Some(journal_date)) => errors.into_result(CreateFields {
            title,
            content,
            journal_date,
        }),
        _ => Err(errors),
    }
}

/// Validates an update request: absent fields are fine, present ones must be valid.
pub fn validate_for_update(
    input: &JournalInput,
    media: Option<&MediaPayload>,
    policy: &MediaPolicy,
) -> Result<UpdateFields, FieldErrors> {
    let (fields, errors) = check_fields(input, media, policy);
    errors.into_result(fields)
}

/// Checks every supplied field, returning what parsed cleanly alongside all failures.
fn check_fields(
    input: &JournalInput,
    media: Option<&MediaPayload>,
    policy: &MediaPolicy,
) -> (UpdateFields, FieldErrors) {
    let mut errors = FieldErrors::default();

    let trimmed = JournalInput {
        title: input.title.as_deref().map(|s| s.trim().to_string()),
        content: input.content.as_deref().map(|s| s.trim().to_string()),
        journal_date: input.journal_date.as_deref().map(|s| s.trim().to_string()),
    };

    if let Err(e) = trimmed.validate() {
        errors.merge(e.into());
    }

    let title = required_text("title", trimmed.title, &mut errors);
    let content = required_text("content", trimmed.content, &mut errors);
    let journal_date = required_text("journal_date", trimmed.journal_date, &mut errors)
        .and_then(|raw| match parse_journal_date(&raw) {
            Some(date) => Some(date),
            None => {
                errors.add("journal_date", "The journal date field must be a valid date.");
                None
            }
        });

    if let Some(message) = media.and_then(|payload| policy.check(payload)) {
        errors.add("image", message);
    }

    let title = title.filter(|_| errors.get("title").is_none());

    (
        UpdateFields {
            title,
            content,
            journal_date,
        },
        errors,
    )
}

/// A supplied value must not be blank.
fn required_text(field: &str, value: Option<String>, errors: &mut FieldErrors) -> Option<String> {
    match value {
        Some(v) if v.is_empty() => {
            errors.add(field, required_message(field));
            None
        }
        other => other,
    }
}

fn required_message(field: &str) -> String {
    format!("The {} field is required.", field.replace('_', " "))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its calendar date is kept).
pub fn parse_journal_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
