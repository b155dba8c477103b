//! End-to-end tests for the journal routes.
//!
//! The router runs against in-memory SQLite and a local filesystem bucket, with real bearer
//! tokens, so every layer from the auth middleware down to the storage gateway is exercised.

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, IF_MATCH},
    },
};
use fake::Fake;
use fake::faker::lorem::en::{Paragraph, Sentence};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use daybook_api::{AppState, create_router};
use daybook_core::storage::{CleanupQueue, CleanupReceiver, StorageBackend};
use daybook_db::migration::{Migrator, MigratorTrait};
use daybook_shared::{
    AccessGate, JwtConfig, JwtService, StorageConfig, StorageProvider, UserId,
};

const BOUNDARY: &str = "daybook-test-boundary";
const PUBLIC_URL: &str = "http://cdn.test/media";

const PNG_A: &[u8] = b"\x89PNG\r\n\x1a\nimage-a";
const PNG_B: &[u8] = b"\x89PNG\r\n\x1a\nimage-b";
const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

/// Builds a `multipart/form-data` body by hand.
#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn entry(title: &str, content: &str, date: &str) -> Self {
        Self::default()
            .text("title", title)
            .text("content", content)
            .text("journal_date", date)
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

struct TestApp {
    router: Router,
    jwt: JwtService,
    storage_root: TempDir,
    _cleanup: CleanupReceiver,
}

impl TestApp {
    async fn new() -> Self {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("Failed to connect to database");
        Migrator::up(&db, None).await.expect("Failed to migrate");

        let storage_root = tempfile::tempdir().expect("tempdir");
        let storage = StorageBackend::from_config(StorageConfig::new(StorageProvider::local_fs(
            storage_root.path(),
            PUBLIC_URL,
        )))
        .expect("storage backend");

        let jwt = JwtService::new(JwtConfig {
            secret: "test-secret-key-for-api-tests".to_string(),
            access_token_expiry_secs: 900,
        });
        let (cleanup, receiver) = CleanupQueue::channel();
        let state = AppState::new(db, AccessGate::new(jwt.clone()), storage, cleanup);

        Self {
            router: create_router(state),
            jwt,
            storage_root,
            _cleanup: receiver,
        }
    }

    fn token(&self, user: UserId) -> String {
        self.jwt
            .generate_access_token(user)
            .expect("token should encode")
    }

    /// Path on disk an image URL is served from.
    fn stored_path(&self, image_url: &str) -> PathBuf {
        let key = image_url
            .strip_prefix(&format!("{PUBLIC_URL}/"))
            .expect("url under public base");
        self.storage_root.path().join(key)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    async fn get(&self, user: UserId, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", self.token(user)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn delete(&self, user: UserId, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", self.token(user)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn submit(
        &self,
        method: Method,
        user: UserId,
        uri: &str,
        form: Form,
        if_match: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", self.token(user)))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(version) = if_match {
            builder = builder.header(IF_MATCH, version);
        }
        self.send(builder.body(Body::from(form.finish())).unwrap())
            .await
    }

    async fn create(&self, user: UserId, form: Form) -> (StatusCode, Value) {
        self.submit(Method::POST, user, "/api/v1/journals", form, None)
            .await
    }
}

fn random_entry(date: &str) -> Form {
    let title: String = Sentence(2..5).fake();
    let content: String = Paragraph(1..3).fake();
    Form::entry(&title, &content, date)
}

fn journal_uri(body: &Value) -> String {
    format!(
        "/api/v1/journals/{}",
        body["journal"]["id"].as_str().expect("journal id")
    )
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "local");
}

#[tokio::test]
async fn test_missing_bearer_is_rejected_before_handler() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/v1/journals")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_token");
}

#[tokio::test]
async fn test_forged_bearer_is_rejected() {
    let app = TestApp::new().await;
    let forged = JwtService::new(JwtConfig {
        secret: "some-other-secret".to_string(),
        access_token_expiry_secs: 900,
    })
    .generate_access_token(UserId::new())
    .unwrap();

    let request = Request::builder()
        .uri("/api/v1/journals")
        .header(AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_journal_lifecycle_with_image_replacement() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let stranger = UserId::new();

    let (status, created) = app
        .create(
            owner,
            Form::entry("Day One", "Hello", "2024-01-01").file("a.png", "image/png", PNG_A),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Journal created successfully");
    assert_eq!(created["journal"]["title"], "Day One");
    assert_eq!(created["journal"]["journal_date"], "2024-01-01");
    assert_eq!(created["journal"]["user_id"], owner.to_string());
    assert!(created["journal"].get("image_object_key").is_none());

    let first_url = created["journal"]["image_url"].as_str().unwrap().to_string();
    assert!(first_url.starts_with(&format!("{PUBLIC_URL}/journals/")));
    assert_eq!(
        std::fs::read(app.stored_path(&first_url)).unwrap(),
        PNG_A
    );

    let uri = journal_uri(&created);
    let (status, updated) = app
        .submit(
            Method::PUT,
            owner,
            &uri,
            Form::default().file("b.png", "image/png", PNG_B),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Journal updated successfully");
    assert_eq!(updated["journal"]["title"], "Day One");
    assert_eq!(updated["journal"]["version"], 2);

    let second_url = updated["journal"]["image_url"].as_str().unwrap().to_string();
    assert_ne!(second_url, first_url);
    assert!(!app.stored_path(&first_url).exists());
    assert!(app.stored_path(&second_url).exists());

    let (status, body) = app.get(stranger, &uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app.delete(owner, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Journal deleted successfully");
    assert!(!app.stored_path(&second_url).exists());

    let (status, listed) = app.get(owner, "/api/v1/journals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["total"], 0);

    let (status, _) = app.delete(owner, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_reports_each_invalid_field() {
    let app = TestApp::new().await;

    let (status, body) = app
        .create(
            UserId::new(),
            Form::default()
                .text("content", "Body")
                .text("journal_date", "not-a-date"),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["errors"]["title"][0], "The title field is required.");
    assert_eq!(
        body["errors"]["journal_date"][0],
        "The journal date field must be a valid date."
    );
}

#[tokio::test]
async fn test_create_rejects_disallowed_image_type_without_storing() {
    let app = TestApp::new().await;
    let owner = UserId::new();

    let (status, body) = app
        .create(
            owner,
            random_entry("2024-02-01").file("notes.txt", "text/plain", b"plain text"),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["image"][0],
        "The image field must be a file of type: jpeg, png, jpg, gif."
    );

    let (_, listed) = app.get(owner, "/api/v1/journals").await;
    assert_eq!(listed["meta"]["total"], 0);
    assert!(!app.storage_root.path().join("journals").exists());
}

#[tokio::test]
async fn test_create_rejects_content_disguised_as_image() {
    let app = TestApp::new().await;
    let owner = UserId::new();

    let (status, body) = app
        .create(
            owner,
            random_entry("2024-02-01").file(
                "evil.png",
                "image/png",
                b"<html><script>alert(1)</script></html>",
            ),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["image"][0],
        "The image field must be a file of type: jpeg, png, jpg, gif."
    );
    assert!(!app.storage_root.path().join("journals").exists());
}

#[tokio::test]
async fn test_stored_image_is_served_at_its_public_url() {
    let app = TestApp::new().await;
    let (_, created) = app
        .create(
            UserId::new(),
            random_entry("2024-02-02").file("a.png", "image/png", PNG_A),
        )
        .await;
    let image_url = created["journal"]["image_url"].as_str().unwrap();
    let path = image_url.strip_prefix("http://cdn.test").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), PNG_A);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/media/journals/missing.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_file_input_is_treated_as_absent() {
    let app = TestApp::new().await;

    let (status, body) = app
        .create(
            UserId::new(),
            random_entry("2024-02-01").file("", "application/octet-stream", b""),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["journal"]["image_url"].is_null());
}

#[tokio::test]
async fn test_list_is_owner_scoped_newest_first_and_paginated() {
    let app = TestApp::new().await;
    let owner = UserId::new();

    for date in ["2024-03-01", "2024-03-03", "2024-03-02"] {
        let (status, _) = app.create(owner, random_entry(date)).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    app.create(UserId::new(), random_entry("2024-03-09")).await;

    let (status, page_one) = app
        .get(owner, "/api/v1/journals?page=1&per_page=2")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page_one["meta"]["total"], 3);
    assert_eq!(page_one["meta"]["total_pages"], 2);
    assert_eq!(page_one["data"][0]["journal_date"], "2024-03-03");
    assert_eq!(page_one["data"][1]["journal_date"], "2024-03-02");

    let (_, page_two) = app
        .get(owner, "/api/v1/journals?page=2&per_page=2")
        .await;
    let rest = page_two["data"].as_array().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["journal_date"], "2024-03-01");
}

#[tokio::test]
async fn test_stale_if_match_is_a_conflict() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let (_, created) = app.create(owner, random_entry("2024-04-01")).await;
    let uri = journal_uri(&created);

    let (status, updated) = app
        .submit(
            Method::PUT,
            owner,
            &uri,
            Form::default().text("title", "First edit"),
            Some("\"1\""),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["journal"]["version"], 2);

    let (status, body) = app
        .submit(
            Method::PUT,
            owner,
            &uri,
            Form::default().text("title", "Lost edit"),
            Some("\"1\""),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, current) = app.get(owner, &uri).await;
    assert_eq!(current["journal"]["title"], "First edit");
}

#[tokio::test]
async fn test_post_is_accepted_as_update_alias() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let (_, created) = app.create(owner, random_entry("2024-05-01")).await;

    let (status, body) = app
        .submit(
            Method::POST,
            owner,
            &journal_uri(&created),
            Form::default()
                .text("_method", "PUT")
                .text("journal_date", "2024-05-02"),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["journal"]["journal_date"], "2024-05-02");
    assert_eq!(body["journal"]["title"], created["journal"]["title"]);
}

#[tokio::test]
async fn test_non_owner_cannot_update_or_delete() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let stranger = UserId::new();
    let (_, created) = app
        .create(
            owner,
            random_entry("2024-06-01").file("a.gif", "image/gif", GIF),
        )
        .await;
    let uri = journal_uri(&created);
    let image_url = created["journal"]["image_url"].as_str().unwrap().to_string();

    let (status, _) = app
        .submit(
            Method::PUT,
            stranger,
            &uri,
            Form::default().file("b.png", "image/png", PNG_B),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(stranger, &uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, current) = app.get(owner, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["journal"]["image_url"], image_url.as_str());
    assert!(app.stored_path(&image_url).exists());
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let app = TestApp::new().await;
    let user = UserId::new();

    let (status, body) = app.get(user, "/api/v1/journals/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Journal not found");

    let (status, _) = app
        .get(user, &format!("/api/v1/journals/{}", UserId::new()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
