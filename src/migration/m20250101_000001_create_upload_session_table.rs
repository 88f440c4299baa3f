//! Create upload_session table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadSession::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UploadSession::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UploadSession::Status)
                            .string_len(32)
                            .not_null()
                            .default("CREATED"),
                    )
                    .col(ColumnDef::new(UploadSession::UserId).big_integer().null())
                    .col(
                        ColumnDef::new(UploadSession::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UploadSession::LastUploadInteractionTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The expiry sweep filters on status and idle time.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_upload_session_status_interaction")
                    .table(UploadSession::Table)
                    .col(UploadSession::Status)
                    .col(UploadSession::LastUploadInteractionTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_upload_session_user_id")
                    .table(UploadSession::Table)
                    .col(UploadSession::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadSession::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum UploadSession {
    Table,
    Id,
    Token,
    Status,
    UserId,
    StartedAt,
    LastUploadInteractionTime,
}
