//! Journals table.
//!
//! Built with the schema builder so the same migration runs on PostgreSQL and SQLite.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Journals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Journals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Journals::UserId).uuid().not_null())
                    .col(ColumnDef::new(Journals::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Journals::Content).text().not_null())
                    .col(ColumnDef::new(Journals::JournalDate).date().not_null())
                    .col(ColumnDef::new(Journals::ImageUrl).text().null())
                    .col(ColumnDef::new(Journals::ImageObjectKey).string_len(512).null())
                    .col(
                        ColumnDef::new(Journals::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Journals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Journals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Image URL and key are set and cleared together.
                    .check(Expr::cust(
                        "(image_url IS NULL) = (image_object_key IS NULL)",
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_journals_image_object_key")
                    .table(Journals::Table)
                    .col(Journals::ImageObjectKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Owner listing, newest date first.
        manager
            .create_index(
                Index::create()
                    .name("idx_journals_owner_date")
                    .table(Journals::Table)
                    .col(Journals::UserId)
                    .col((Journals::JournalDate, IndexOrder::Desc))
                    .col((Journals::Id, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Journals::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Journals {
    Table,
    Id,
    UserId,
    Title,
    Content,
    JournalDate,
    ImageUrl,
    ImageObjectKey,
    Version,
    CreatedAt,
    UpdatedAt,
}
