use std::path::{Path, PathBuf};

use sea_orm::{ActiveModelTrait, Set};
use serde::Serialize;

use super::UploadSessionStore;
use crate::entity::upload_session::{self, SessionStatus};
use crate::entity::uploaded_file::{self, StorageTier};
use crate::error::{UploadError, UploadResult};
use crate::storage::StorageError;

/// What [`UploadSessionStore::copy_session_uploads`] managed to copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    /// Destination paths written.
    pub copied: Vec<PathBuf>,
    /// Names of files whose bytes were no longer in storage.
    pub missing: Vec<String>,
}

impl UploadSessionStore {
    /// Promotes a temporary upload to the permanent tier.
    ///
    /// The bytes are copied into the permanent root and a permanent record is
    /// written before the temporary record (and its bytes) are deleted, so a
    /// failure part way leaves the temporary copy intact. Permanent records
    /// are returned unchanged.
    pub async fn move_to_permanent_storage(
        &self,
        file: uploaded_file::Model,
    ) -> UploadResult<uploaded_file::Model> {
        if file.tier == StorageTier::Permanent {
            return Ok(file);
        }

        let data = self.storage.temporary.read(&file.file_path).await?;
        self.storage.permanent.save(&file.file_path, &data).await?;

        let permanent = uploaded_file::ActiveModel {
            session_id: Set(file.session_id),
            name: Set(file.name.clone()),
            size: Set(file.size),
            tier: Set(StorageTier::Permanent),
            file_path: Set(file.file_path.clone()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        self.delete_uploaded_file(file).await?;

        tracing::debug!(file = %permanent.name, key = %permanent.file_path, "Moved upload to permanent storage");
        Ok(permanent)
    }

    /// Finalizes an `UPLOADING` session by promoting every temporary upload.
    ///
    /// The session passes through `COPYING_IN_PROGRESS` and ends `STORED`. The
    /// first file that cannot be moved stops the run: the session is marked
    /// `COPYING_FAILED` and the error returned, leaving the remaining files
    /// where they are. Calling this on a `STORED` session does nothing.
    ///
    /// # Errors
    ///
    /// * [`UploadError::InvalidState`] for any status other than `UPLOADING` or `STORED`
    /// * the storage or database error that stopped the copy
    pub async fn make_uploads_permanent(
        &self,
        session: &mut upload_session::Model,
    ) -> UploadResult<()> {
        match session.status {
            SessionStatus::Stored => {
                tracing::debug!(token = %session.token, "Uploads already permanent");
                return Ok(());
            }
            SessionStatus::Uploading => {}
            status => {
                return Err(UploadError::invalid_state(
                    &session.token,
                    status,
                    "make uploads permanent",
                ))
            }
        }

        // Listed up front: nothing may fail between here and the end of the
        // copy without marking the session COPYING_FAILED.
        let files = self.files_in_tier(session, StorageTier::Temporary).await?;
        let count = files.len();

        self.transition(session, SessionStatus::CopyingInProgress).await?;

        for file in files {
            let name = file.name.clone();
            if let Err(e) = self.move_to_permanent_storage(file).await {
                tracing::error!(
                    token = %session.token,
                    file = %name,
                    error = %e,
                    "Failed to move upload to permanent storage"
                );
                self.transition(session, SessionStatus::CopyingFailed).await?;
                return Err(e);
            }
        }

        self.transition(session, SessionStatus::Stored).await?;
        tracing::info!(token = %session.token, files = count, "Made uploads permanent");
        Ok(())
    }

    /// Copies a `STORED` session's files into `destination`, one file per
    /// name.
    ///
    /// Files whose bytes have disappeared from storage are listed in
    /// [`CopyReport::missing`] instead of failing the copy. Any other failure
    /// marks the session `COPYING_FAILED`.
    pub async fn copy_session_uploads(
        &self,
        session: &mut upload_session::Model,
        destination: &Path,
    ) -> UploadResult<CopyReport> {
        if session.status != SessionStatus::Stored {
            return Err(UploadError::invalid_state(
                &session.token,
                session.status,
                "copy uploads",
            ));
        }

        let files = self.files_in_tier(session, StorageTier::Permanent).await?;

        self.transition(session, SessionStatus::CopyingInProgress).await?;

        let mut report = CopyReport::default();
        for file in files {
            let target = destination.join(&file.name);
            match self.storage.permanent.copy_to(&file.file_path, &target).await {
                Ok(_) => report.copied.push(target),
                Err(StorageError::NotFound(_)) => {
                    tracing::warn!(
                        token = %session.token,
                        file = %file.name,
                        "Uploaded file is missing from storage, skipping"
                    );
                    report.missing.push(file.name);
                }
                Err(e) => {
                    tracing::error!(
                        token = %session.token,
                        file = %file.name,
                        destination = %target.display(),
                        error = %e,
                        "Failed to copy upload"
                    );
                    self.transition(session, SessionStatus::CopyingFailed).await?;
                    return Err(e.into());
                }
            }
        }

        self.transition(session, SessionStatus::Stored).await?;
        tracing::info!(
            token = %session.token,
            copied = report.copied.len(),
            missing = report.missing.len(),
            destination = %destination.display(),
            "Copied session uploads"
        );
        Ok(report)
    }
}
