use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use super::UploadSessionStore;
use crate::entity::upload_session::{self, SessionStatus};
use crate::entity::uploaded_file::StorageTier;
use crate::error::{UploadError, UploadResult};

impl UploadSessionStore {
    fn inactivity_window(&self) -> Duration {
        Duration::minutes(self.settings.expire_after_inactive_minutes)
    }

    /// When an idle session becomes eligible for expiry.
    pub fn expires_at(&self, session: &upload_session::Model) -> DateTime<Utc> {
        session.last_upload_interaction_time + self.inactivity_window()
    }

    /// True for `EXPIRED` sessions, and for `CREATED`/`UPLOADING` sessions
    /// idle past [`expires_at`](Self::expires_at).
    pub fn is_expired(&self, session: &upload_session::Model, now: DateTime<Utc>) -> bool {
        match session.status {
            SessionStatus::Expired => true,
            SessionStatus::Created | SessionStatus::Uploading => now >= self.expires_at(session),
            _ => false,
        }
    }

    /// Expires a session that never got finalized, purging its temporary
    /// uploads.
    ///
    /// # Errors
    ///
    /// * [`UploadError::InvalidState`] unless the session is `CREATED` or `UPLOADING`
    pub async fn expire(&self, session: &mut upload_session::Model) -> UploadResult<()> {
        if !session.status.accepts_uploads() {
            return Err(UploadError::invalid_state(
                &session.token,
                session.status,
                "expire",
            ));
        }

        for file in self.files_in_tier(session, StorageTier::Temporary).await? {
            self.delete_uploaded_file(file).await?;
        }

        self.transition(session, SessionStatus::Expired).await
    }

    /// Deletes every file in the session and returns it to `CREATED`.
    ///
    /// A `CREATED` session is left as is.
    ///
    /// # Errors
    ///
    /// * [`UploadError::InvalidState`] unless the session is `CREATED`,
    ///   `UPLOADING` or `STORED`
    pub async fn reset(&self, session: &mut upload_session::Model) -> UploadResult<()> {
        match session.status {
            SessionStatus::Created => return Ok(()),
            SessionStatus::Uploading | SessionStatus::Stored => {}
            status => return Err(UploadError::invalid_state(&session.token, status, "reset")),
        }

        self.transition(session, SessionStatus::RemovingInProgress).await?;

        let files = self.all_files(session).await?;
        let count = files.len();
        for file in files {
            self.delete_uploaded_file(file).await?;
        }

        self.transition(session, SessionStatus::Created).await?;
        tracing::info!(token = %session.token, files = count, "Reset upload session");
        Ok(())
    }

    /// Sessions still collecting files whose last interaction is older than
    /// the inactivity window.
    pub async fn expirable_sessions(&self) -> UploadResult<Vec<upload_session::Model>> {
        let cutoff = Utc::now() - self.inactivity_window();

        Ok(upload_session::Entity::find()
            .filter(
                upload_session::Column::Status
                    .is_in([SessionStatus::Created, SessionStatus::Uploading]),
            )
            .filter(upload_session::Column::LastUploadInteractionTime.lt(cutoff))
            .order_by_asc(upload_session::Column::LastUploadInteractionTime)
            .all(&self.conn)
            .await?)
    }

    /// Expires every [expirable](Self::expirable_sessions) session and
    /// returns how many were expired.
    ///
    /// Meant to be called periodically by an external scheduler. A session
    /// that fails to expire is logged and skipped.
    pub async fn expire_inactive_sessions(&self) -> UploadResult<usize> {
        let mut expired = 0;

        for mut session in self.expirable_sessions().await? {
            match self.expire(&mut session).await {
                Ok(()) => expired += 1,
                Err(e) => {
                    tracing::error!(token = %session.token, error = %e, "Failed to expire upload session");
                }
            }
        }

        if expired > 0 {
            tracing::info!(count = expired, "Expired inactive upload sessions");
        }
        Ok(expired)
    }

    /// Deletes a session, its file records and their bytes.
    pub async fn delete_session(&self, session: upload_session::Model) -> UploadResult<()> {
        for file in self.all_files(&session).await? {
            self.delete_uploaded_file(file).await?;
        }

        upload_session::Entity::delete_by_id(session.id)
            .exec(&self.conn)
            .await?;

        tracing::info!(token = %session.token, "Deleted upload session");
        Ok(())
    }
}
