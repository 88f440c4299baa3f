#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, IntoActiveModel, Set};
use tempfile::TempDir;
use upload_sessions_seaorm_store::entity::upload_session;
use upload_sessions_seaorm_store::migration::{Migrator, MigratorTrait};
use upload_sessions_seaorm_store::{UploadSessionStore, UploadSettings};

pub const PDF_MAGIC: &[u8] = b"%PDF-1.4\n";
pub const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// A store over a fresh SQLite file and storage roots in a temp directory.
pub struct Harness {
    pub store: UploadSessionStore,
    pub dir: TempDir,
}

impl Harness {
    pub fn temp_root(&self) -> std::path::PathBuf {
        self.dir.path().join("temp")
    }

    pub fn permanent_root(&self) -> std::path::PathBuf {
        self.dir.path().join("uploaded_files")
    }

    /// Reload a session from the database.
    pub async fn reload(&self, session: &upload_session::Model) -> upload_session::Model {
        self.store
            .get_session(&session.token)
            .await
            .unwrap()
            .expect("session should exist")
    }

    /// A second connection to the same database file, usable after the
    /// store's own pool has been closed.
    pub async fn reopen(&self) -> DatabaseConnection {
        Database::connect(database_url(self.dir.path())).await.unwrap()
    }

    pub async fn set_token(&self, session: upload_session::Model, token: &str) -> upload_session::Model {
        let mut active_model = session.into_active_model();
        active_model.token = Set(token.to_string());
        active_model.update(self.store.connection()).await.unwrap()
    }

    pub async fn set_last_interaction(
        &self,
        session: upload_session::Model,
        at: DateTime<Utc>,
    ) -> upload_session::Model {
        let mut active_model = session.into_active_model();
        active_model.last_upload_interaction_time = Set(at);
        active_model.update(self.store.connection()).await.unwrap()
    }
}

pub async fn setup() -> Harness {
    setup_with(UploadSettings::default()).await
}

pub async fn setup_with(mut settings: UploadSettings) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    settings.temp_storage_root = dir.path().join("temp");
    settings.upload_storage_root = dir.path().join("uploaded_files");

    let conn = Database::connect(database_url(dir.path())).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();

    let store = UploadSessionStore::from_settings(conn, settings).await.unwrap();
    Harness { store, dir }
}

fn database_url(dir: &std::path::Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("uploads.db").display())
}

/// `size` bytes that sniff as a PDF.
pub fn pdf(size: usize) -> Vec<u8> {
    padded(PDF_MAGIC, size)
}

/// `size` bytes that sniff as a PNG.
pub fn png(size: usize) -> Vec<u8> {
    padded(PNG_MAGIC, size)
}

fn padded(magic: &[u8], size: usize) -> Vec<u8> {
    let mut data = magic.to_vec();
    data.resize(size.max(magic.len()), b' ');
    data
}
