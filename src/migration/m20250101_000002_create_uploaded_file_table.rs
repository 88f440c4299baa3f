//! Create uploaded_file table.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_upload_session_table::UploadSession;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadedFile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadedFile::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UploadedFile::SessionId).integer().not_null())
                    .col(ColumnDef::new(UploadedFile::Name).string().not_null())
                    .col(ColumnDef::new(UploadedFile::Size).big_integer().not_null())
                    .col(ColumnDef::new(UploadedFile::Tier).string_len(16).not_null())
                    .col(ColumnDef::new(UploadedFile::FilePath).string().not_null())
                    .col(
                        ColumnDef::new(UploadedFile::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploaded_file_session")
                            .from(UploadedFile::Table, UploadedFile::SessionId)
                            .to(UploadSession::Table, UploadSession::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A name appears at most once per tier of a session.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_uploaded_file_session_tier_name")
                    .table(UploadedFile::Table)
                    .col(UploadedFile::SessionId)
                    .col(UploadedFile::Tier)
                    .col(UploadedFile::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadedFile::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UploadedFile {
    Table,
    Id,
    SessionId,
    Name,
    Size,
    Tier,
    FilePath,
    CreatedAt,
}
