//! Integration tests for Journal repository against in-memory SQLite.

use chrono::NaiveDate;
use daybook_core::journal::{
    JournalChanges, JournalError, JournalRepository as _, MediaRef, NewJournalEntry,
};
use daybook_db::JournalRepository;
use daybook_db::migration::{Migrator, MigratorTrait};
use daybook_shared::{JournalId, PageRequest, UserId};
use fake::Fake;
use fake::faker::lorem::en::{Paragraph, Sentence};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

/// Fresh in-memory database with migrations applied.
///
/// A single pooled connection keeps every query on the same in-memory database.
async fn setup() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None).await.expect("Failed to migrate");
    db
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn media(key: &str) -> MediaRef {
    MediaRef {
        url: format!("https://cdn.test/{key}"),
        object_key: key.to_string(),
    }
}

fn new_entry(owner: UserId, journal_date: NaiveDate, media: Option<MediaRef>) -> NewJournalEntry {
    NewJournalEntry {
        owner_id: owner,
        title: Sentence(2..5).fake(),
        content: Paragraph(1..3).fake(),
        journal_date,
        media,
    }
}

#[tokio::test]
async fn test_journal_create_and_find() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();

    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), Some(media("journals/a.png"))))
        .await
        .expect("Failed to create journal");

    assert_eq!(created.owner_id, owner);
    assert_eq!(created.version, 1);
    assert_eq!(created.object_key(), Some("journals/a.png"));

    let found = repo
        .find_by_id(created.id)
        .await
        .expect("Failed to find journal")
        .expect("journal should exist");
    assert_eq!(found.id, created.id);
    assert_eq!(found.title, created.title);
    assert_eq!(found.journal_date, date(2024, 1, 1));
    assert_eq!(found.media, created.media);

    assert!(repo.find_by_id(JournalId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_journal_list_is_owner_scoped_and_ordered() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let other = UserId::new();

    for day in [5, 1, 3, 3, 2] {
        repo.create(new_entry(owner, date(2024, 1, day), None))
            .await
            .unwrap();
    }
    repo.create(new_entry(other, date(2024, 1, 9), None))
        .await
        .unwrap();

    let first = repo
        .list_by_owner(owner, PageRequest::new(1, 2))
        .await
        .unwrap();
    let second = repo
        .list_by_owner(owner, PageRequest::new(2, 2))
        .await
        .unwrap();
    let third = repo
        .list_by_owner(owner, PageRequest::new(3, 2))
        .await
        .unwrap();

    assert_eq!(first.total, 5);
    let all: Vec<_> = first
        .entries
        .into_iter()
        .chain(second.entries)
        .chain(third.entries)
        .collect();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|e| e.owner_id == owner));

    let days: Vec<NaiveDate> = all.iter().map(|e| e.journal_date).collect();
    assert_eq!(
        days,
        vec![
            date(2024, 1, 5),
            date(2024, 1, 3),
            date(2024, 1, 3),
            date(2024, 1, 2),
            date(2024, 1, 1)
        ]
    );
    assert!(all[1].id > all[2].id);
}

#[tokio::test]
async fn test_journal_update_applies_only_supplied_fields() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), Some(media("journals/a.png"))))
        .await
        .unwrap();

    let updated = repo
        .update(
            created.id,
            owner,
            JournalChanges {
                title: Some("Renamed".to_string()),
                ..JournalChanges::default()
            },
        )
        .await
        .unwrap()
        .expect("row should match");

    assert_eq!(updated.replaced_object_key, None);
    let updated = updated.entry;
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.content, created.content);
    assert_eq!(updated.media, created.media);
    assert_eq!(updated.version, 2);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn test_journal_update_replaces_media_pair() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), Some(media("journals/a.png"))))
        .await
        .unwrap();

    let updated = repo
        .update(
            created.id,
            owner,
            JournalChanges {
                media: Some(media("journals/b.png")),
                ..JournalChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.replaced_object_key.as_deref(), Some("journals/a.png"));
    assert_eq!(updated.entry.object_key(), Some("journals/b.png"));
    assert_eq!(
        updated.entry.image_url(),
        Some("https://cdn.test/journals/b.png")
    );
}

#[tokio::test]
async fn test_journal_update_reports_key_displaced_by_earlier_write() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), Some(media("journals/a.png"))))
        .await
        .unwrap();

    let swap = |key: &'static str| JournalChanges {
        media: Some(media(key)),
        ..JournalChanges::default()
    };

    // Both writers read `a.png`; the second write lands on `b.png`.
    repo.update(created.id, owner, swap("journals/b.png"))
        .await
        .unwrap()
        .unwrap();
    let last = repo
        .update(created.id, owner, swap("journals/c.png"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(last.replaced_object_key.as_deref(), Some("journals/b.png"));
    assert_eq!(last.entry.object_key(), Some("journals/c.png"));
}

#[tokio::test]
async fn test_journal_update_filters_by_owner_and_version() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), None))
        .await
        .unwrap();

    let foreign = repo
        .update(created.id, UserId::new(), JournalChanges::default())
        .await
        .unwrap();
    assert!(foreign.is_none());

    let stale = repo
        .update(
            created.id,
            owner,
            JournalChanges {
                title: Some("Stale".to_string()),
                expected_version: Some(7),
                ..JournalChanges::default()
            },
        )
        .await
        .unwrap();
    assert!(stale.is_none());

    let current = repo
        .update(
            created.id,
            owner,
            JournalChanges {
                title: Some("Fresh".to_string()),
                expected_version: Some(1),
                ..JournalChanges::default()
            },
        )
        .await
        .unwrap()
        .expect("version matches");
    assert_eq!(current.entry.title, "Fresh");
    assert_eq!(current.entry.version, 2);

    let missing = repo
        .update(JournalId::new(), owner, JournalChanges::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_journal_delete_filters_by_owner() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();
    let created = repo
        .create(new_entry(owner, date(2024, 1, 1), None))
        .await
        .unwrap();

    assert!(!repo.delete(created.id, UserId::new()).await.unwrap());
    assert!(repo.find_by_id(created.id).await.unwrap().is_some());

    assert!(repo.delete(created.id, owner).await.unwrap());
    assert!(!repo.delete(created.id, owner).await.unwrap());
    assert!(repo.find_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_journal_object_key_is_unique() {
    let repo = JournalRepository::new(setup().await);
    let owner = UserId::new();

    repo.create(new_entry(owner, date(2024, 1, 1), Some(media("journals/same.png"))))
        .await
        .unwrap();
    let duplicate = repo
        .create(new_entry(owner, date(2024, 1, 2), Some(media("journals/same.png"))))
        .await;

    assert!(matches!(duplicate, Err(JournalError::Repository(_))));
}

#[tokio::test]
async fn test_journal_half_media_pair_is_rejected() {
    let db = setup().await;
    let result = db
        .execute_unprepared(
            "INSERT INTO journals (id, user_id, title, content, journal_date, image_url, version) \
             VALUES (X'00000000000000000000000000000001', X'00000000000000000000000000000002', \
             't', 'c', '2024-01-01', 'https://cdn.test/x.png', 1)",
        )
        .await;

    assert!(result.is_err(), "CHECK constraint should reject a URL without a key");
}
