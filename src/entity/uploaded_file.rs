//! Uploaded file entity model.
//!
//! A file record names the bytes a submitter uploaded into a session. The
//! record and the bytes have separate lifetimes: bytes may be removed from the
//! storage root out-of-band, so [`Model`] never assumes they are present.

use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity model representing one uploaded file.
///
/// | Column     | Type         | Description                                  |
/// |------------|--------------|----------------------------------------------|
/// | id         | INTEGER (PK) | Surrogate key                                |
/// | session_id | INTEGER (FK) | Owning upload session, cascades on delete    |
/// | name       | VARCHAR      | Original file name as submitted              |
/// | size       | BIGINT       | Size in bytes at upload time                 |
/// | tier       | VARCHAR(16)  | [`StorageTier`] the bytes live in            |
/// | file_path  | VARCHAR      | Storage key relative to the tier's root      |
/// | created_at | TIMESTAMPTZ  | When the record was written                  |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uploaded_file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub session_id: i32,
    pub name: String,
    pub size: i64,
    pub tier: StorageTier,
    pub file_path: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::upload_session::Entity",
        from = "Column::SessionId",
        to = "super::upload_session::Column::Id",
        on_delete = "Cascade"
    )]
    UploadSession,
}

impl Related<super::upload_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Which storage root holds a file's bytes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Files still being collected; purged when the session expires.
    #[sea_orm(string_value = "temporary")]
    Temporary,
    /// Files promoted once the submission was finalized.
    #[sea_orm(string_value = "permanent")]
    Permanent,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary => f.write_str("temporary"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}
