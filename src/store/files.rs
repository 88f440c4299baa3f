use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::Serialize;

use super::{file_access_url, touch, transition, UploadSessionStore};
use crate::check::{accept_file, accept_session, Acceptance, FileCandidate, SessionSnapshot, SNIFF_LENGTH};
use crate::entity::upload_session::{self, SessionStatus};
use crate::entity::uploaded_file::{self, StorageTier};
use crate::error::{UploadError, UploadResult};
use crate::storage::storage_key;

/// A file as it arrives from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Result of [`UploadSessionStore::accept_upload`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Stored in the temporary tier. `url` is where the file can be fetched
    /// or deleted.
    Accepted {
        file: uploaded_file::Model,
        url: String,
    },
    Rejected(Acceptance),
}

impl UploadOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadOutcome::Accepted { .. })
    }
}

impl UploadSessionStore {
    /// Runs the full admission pipeline for one file and stores it if it
    /// passes.
    ///
    /// File-level checks run first, then the session-level checks against the
    /// session's temporary uploads, then the malware scanner. Validation
    /// failures come back as [`UploadOutcome::Rejected`]; scanner failures
    /// are errors.
    ///
    /// # Errors
    ///
    /// * [`UploadError::InvalidState`] unless the session is `CREATED` or `UPLOADING`
    /// * [`UploadError::Scan`] when the scanner rejects the content or cannot run
    /// * database and storage errors from [`add_temp_file`](Self::add_temp_file)
    pub async fn accept_upload(
        &self,
        session: &mut upload_session::Model,
        file: &IncomingFile,
    ) -> UploadResult<UploadOutcome> {
        if !session.status.accepts_uploads() {
            return Err(UploadError::invalid_state(
                &session.token,
                session.status,
                "accept uploads",
            ));
        }

        let head = &file.data[..file.data.len().min(SNIFF_LENGTH)];
        let candidate = FileCandidate::new(&file.name, file.size()).with_head(head);
        let limits = &self.settings.limits;

        let verdict = accept_file(&candidate, limits);
        if !verdict.accepted {
            return Ok(self.rejected(session, &file.name, verdict));
        }

        let uploads = self.get_temporary_uploads(session).await?;
        let snapshot = SessionSnapshot::from_files(uploads.iter().map(|f| (f.name.as_str(), f.size)));
        let verdict = accept_session(&candidate, &snapshot, limits);
        if !verdict.accepted {
            return Ok(self.rejected(session, &file.name, verdict));
        }

        self.scanner.check_for_malware(&file.name, &file.data).await?;

        let record = self.add_temp_file(session, file).await?;
        let url = file_access_url(&session.token, &record.name);
        Ok(UploadOutcome::Accepted { file: record, url })
    }

    fn rejected(
        &self,
        session: &upload_session::Model,
        name: &str,
        verdict: Acceptance,
    ) -> UploadOutcome {
        tracing::warn!(
            token = %session.token,
            file = name,
            reason = verdict.verbose_error.as_deref().unwrap_or_default(),
            "Rejected upload"
        );
        UploadOutcome::Rejected(verdict)
    }

    /// Stores `file` in the temporary tier and records it.
    ///
    /// A `CREATED` session moves to `UPLOADING`. A temporary file of the same
    /// name is replaced. No validation happens here; see
    /// [`accept_upload`](Self::accept_upload).
    pub async fn add_temp_file(
        &self,
        session: &mut upload_session::Model,
        file: &IncomingFile,
    ) -> UploadResult<uploaded_file::Model> {
        if !session.status.accepts_uploads() {
            return Err(UploadError::invalid_state(
                &session.token,
                session.status,
                "add temporary file",
            ));
        }

        if let Some(existing) = self.find_file(session, StorageTier::Temporary, &file.name).await? {
            tracing::debug!(token = %session.token, file = %file.name, "Replacing temporary upload");
            self.delete_uploaded_file(existing).await?;
        }

        let key = storage_key(&session.token, &file.name);
        self.storage.temporary.save(&key, &file.data).await?;

        match self.record_temp_file(session, file, &key).await {
            Ok(record) => {
                tracing::debug!(
                    token = %session.token,
                    file = %record.name,
                    size_bytes = record.size,
                    "Added temporary upload"
                );
                Ok(record)
            }
            Err(e) => {
                // Don't leave bytes behind without a record.
                if let Err(cleanup) = self.storage.temporary.delete(&key).await {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to clean up orphaned upload bytes");
                }
                Err(e)
            }
        }
    }

    async fn record_temp_file(
        &self,
        session: &mut upload_session::Model,
        file: &IncomingFile,
        key: &str,
    ) -> UploadResult<uploaded_file::Model> {
        let txn = self.conn.begin().await?;

        let record = uploaded_file::ActiveModel {
            session_id: Set(session.id),
            name: Set(file.name.clone()),
            size: Set(file.size()),
            tier: Set(StorageTier::Temporary),
            file_path: Set(key.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut updated = session.clone();
        if updated.status == SessionStatus::Created {
            transition(&txn, &mut updated, SessionStatus::Uploading).await?;
        }
        touch(&txn, &mut updated).await?;

        txn.commit().await?;
        *session = updated;

        Ok(record)
    }

    /// Removes one temporary upload by name. Removing the last one moves the
    /// session back to `CREATED`.
    ///
    /// # Errors
    ///
    /// * [`UploadError::InvalidState`] unless the session is `UPLOADING`
    /// * [`UploadError::FileNotFound`] if no temporary upload has that name
    pub async fn remove_temp_file_by_name(
        &self,
        session: &mut upload_session::Model,
        name: &str,
    ) -> UploadResult<()> {
        if session.status != SessionStatus::Uploading {
            return Err(UploadError::invalid_state(
                &session.token,
                session.status,
                "remove temporary file",
            ));
        }

        let file = self
            .find_file(session, StorageTier::Temporary, name)
            .await?
            .ok_or_else(|| UploadError::FileNotFound {
                token: session.token.clone(),
                name: name.to_string(),
            })?;

        self.delete_uploaded_file(file).await?;
        touch(&self.conn, session).await?;

        let remaining = self.files_in_tier(session, StorageTier::Temporary).await?;
        if remaining.is_empty() {
            self.transition(session, SessionStatus::Created).await?;
        }

        tracing::debug!(token = %session.token, file = name, remaining = remaining.len(), "Removed temporary upload");
        Ok(())
    }

    /// Finds one of the session's current uploads by name.
    pub async fn get_file_by_name(
        &self,
        session: &upload_session::Model,
        name: &str,
    ) -> UploadResult<Option<uploaded_file::Model>> {
        Ok(self
            .get_uploads(session)
            .await?
            .into_iter()
            .find(|f| f.name == name))
    }

    pub async fn read_uploaded_file(&self, file: &uploaded_file::Model) -> UploadResult<Vec<u8>> {
        Ok(self.storage.for_tier(file.tier).read(&file.file_path).await?)
    }

    /// Whether the bytes behind a record are still present.
    pub async fn file_exists(&self, file: &uploaded_file::Model) -> UploadResult<bool> {
        Ok(self.storage.for_tier(file.tier).exists(&file.file_path).await?)
    }

    /// Deletes a file record together with its bytes.
    ///
    /// Every removal of an uploaded file goes through here. Bytes that are
    /// already gone are not an error.
    pub async fn delete_uploaded_file(&self, file: uploaded_file::Model) -> UploadResult<()> {
        self.storage.for_tier(file.tier).delete(&file.file_path).await?;
        uploaded_file::Entity::delete_by_id(file.id)
            .exec(&self.conn)
            .await?;

        tracing::debug!(file = %file.name, tier = %file.tier, key = %file.file_path, "Deleted uploaded file");
        Ok(())
    }

    async fn find_file(
        &self,
        session: &upload_session::Model,
        tier: StorageTier,
        name: &str,
    ) -> UploadResult<Option<uploaded_file::Model>> {
        Ok(uploaded_file::Entity::find()
            .filter(uploaded_file::Column::SessionId.eq(session.id))
            .filter(uploaded_file::Column::Tier.eq(tier))
            .filter(uploaded_file::Column::Name.eq(name))
            .one(&self.conn)
            .await?)
    }
}
