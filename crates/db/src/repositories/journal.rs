//! Journal repository for database operations.
//!
//! Implements journal CRUD operations using SeaORM.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::journals;
use daybook_core::journal::{
    JournalChanges, JournalEntry, JournalError, JournalPage,
    JournalRepository as JournalRepoTrait, MediaRef, NewJournalEntry, UpdatedEntry,
};
use daybook_shared::{JournalId, PageRequest, UserId};
use tracing::debug;

/// Journal repository implementation.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
}

impl JournalRepository {
    /// Create a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl JournalRepoTrait for JournalRepository {
    async fn list_by_owner(
        &self,
        owner_id: UserId,
        page: PageRequest,
    ) -> Result<JournalPage, JournalError> {
        let query =
            journals::Entity::find().filter(journals::Column::UserId.eq(owner_id.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(repo_err)?;

        let models = query
            .order_by_desc(journals::Column::JournalDate)
            .order_by_desc(journals::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(JournalPage {
            entries: models.into_iter().map(to_domain).collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: JournalId) -> Result<Option<JournalEntry>, JournalError> {
        let model = journals::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(model.map(to_domain))
    }

    async fn create(&self, input: NewJournalEntry) -> Result<JournalEntry, JournalError> {
        let now = Utc::now().into();
        let (image_url, image_object_key) = split_media(input.media);

        let active_model = journals::ActiveModel {
            id: Set(JournalId::new().into_inner()),
            user_id: Set(input.owner_id.into_inner()),
            title: Set(input.title),
            content: Set(input.content),
            journal_date: Set(input.journal_date),
            image_url: Set(image_url),
            image_object_key: Set(image_object_key),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await.map_err(repo_err)?;

        Ok(to_domain(model))
    }

    async fn update(
        &self,
        id: JournalId,
        owner_id: UserId,
        changes: JournalChanges,
    ) -> Result<Option<UpdatedEntry>, JournalError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        // Lock the row so the image key read here is the one this write overwrites.
        let replaced_object_key = if changes.media.is_some() {
            journals::Entity::find_by_id(id.into_inner())
                .filter(journals::Column::UserId.eq(owner_id.into_inner()))
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(repo_err)?
                .and_then(|row| row.image_object_key)
        } else {
            None
        };

        let mut update = journals::Entity::update_many()
            .col_expr(
                journals::Column::Version,
                Expr::col(journals::Column::Version).add(1),
            )
            .col_expr(
                journals::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(journals::Column::Id.eq(id.into_inner()))
            .filter(journals::Column::UserId.eq(owner_id.into_inner()));

        if let Some(title) = changes.title {
            update = update.col_expr(journals::Column::Title, Expr::value(title));
        }
        if let Some(content) = changes.content {
            update = update.col_expr(journals::Column::Content, Expr::value(content));
        }
        if let Some(date) = changes.journal_date {
            update = update.col_expr(journals::Column::JournalDate, Expr::value(date));
        }
        if let Some(media) = changes.media {
            update = update
                .col_expr(journals::Column::ImageUrl, Expr::value(media.url))
                .col_expr(
                    journals::Column::ImageObjectKey,
                    Expr::value(media.object_key),
                );
        }
        if let Some(expected) = changes.expected_version {
            update = update.filter(journals::Column::Version.eq(expected));
        }

        let result = update.exec(&txn).await.map_err(repo_err)?;
        if result.rows_affected == 0 {
            debug!(journal_id = %id, owner_id = %owner_id, "Conditional update matched no row");
            txn.rollback().await.map_err(repo_err)?;
            return Ok(None);
        }

        let model = journals::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(repo_err)?;
        txn.commit().await.map_err(repo_err)?;

        Ok(model.map(|model| UpdatedEntry {
            entry: to_domain(model),
            replaced_object_key,
        }))
    }

    async fn delete(&self, id: JournalId, owner_id: UserId) -> Result<bool, JournalError> {
        let result = journals::Entity::delete_many()
            .filter(journals::Column::Id.eq(id.into_inner()))
            .filter(journals::Column::UserId.eq(owner_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(repo_err)?;

        Ok(result.rows_affected > 0)
    }
}

fn repo_err(e: DbErr) -> JournalError {
    JournalError::repository(e.to_string())
}

fn split_media(media: Option<MediaRef>) -> (Option<String>, Option<String>) {
    match media {
        Some(m) => (Some(m.url), Some(m.object_key)),
        None => (None, None),
    }
}

/// Convert database model to domain model.
fn to_domain(model: journals::Model) -> JournalEntry {
    let media = match (model.image_url, model.image_object_key) {
        (Some(url), Some(object_key)) => Some(MediaRef { url, object_key }),
        _ => None,
    };

    JournalEntry {
        id: JournalId::from_uuid(model.id),
        owner_id: UserId::from_uuid(model.user_id),
        title: model.title,
        content: model.content,
        journal_date: model.journal_date,
        media,
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
