//! Upload session entity model for Sea-ORM database interaction.
//!
//! This module defines the database schema representation for upload sessions
//! and the [`SessionStatus`] enum persisted in the `status` column. The legal
//! moves between statuses live in [`crate::transition`].

use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity model representing an upload session.
///
/// # Database Schema
///
/// | Column                       | Type               | Description                          |
/// |------------------------------|--------------------|--------------------------------------|
/// | id                           | INTEGER (PK)       | Surrogate key                        |
/// | token                        | VARCHAR(64) UNIQUE | Opaque handle shared with the browser|
/// | status                       | VARCHAR(32)        | [`SessionStatus`] string value       |
/// | user_id                      | BIGINT NULL        | Submitting user, if authenticated    |
/// | started_at                   | TIMESTAMPTZ        | Creation time                        |
/// | last_upload_interaction_time | TIMESTAMPTZ        | Last add/remove, drives expiry       |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_session")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The externally shareable session handle.
    ///
    /// Browser-side uploaders pass this token with every file request; it is
    /// the only identifier that ever leaves the server.
    #[sea_orm(unique, column_type = "String(StringLen::N(64))")]
    pub token: String,

    /// Current lifecycle state. Determines which file set may be queried.
    pub status: SessionStatus,

    /// Owning user. `None` for sessions created before sign-in.
    pub user_id: Option<i64>,

    pub started_at: DateTimeUtc,

    /// Updated on every file added or removed. Sessions idle for longer than
    /// the configured window are eligible for expiry.
    pub last_upload_interaction_time: DateTimeUtc,
}

/// Relations of the upload session entity.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::uploaded_file::Entity")]
    UploadedFile,
}

impl Related<super::uploaded_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadedFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle state of an upload session.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "UPLOADING")]
    Uploading,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    #[sea_orm(string_value = "COPYING_IN_PROGRESS")]
    CopyingInProgress,
    #[sea_orm(string_value = "STORED")]
    Stored,
    #[sea_orm(string_value = "COPYING_FAILED")]
    CopyingFailed,
    #[sea_orm(string_value = "REMOVING_IN_PROGRESS")]
    RemovingInProgress,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Uploading => "UPLOADING",
            Self::Expired => "EXPIRED",
            Self::CopyingInProgress => "COPYING_IN_PROGRESS",
            Self::Stored => "STORED",
            Self::CopyingFailed => "COPYING_FAILED",
            Self::RemovingInProgress => "REMOVING_IN_PROGRESS",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
