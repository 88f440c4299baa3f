mod common;

use chrono::{Duration, Utc};
use common::{pdf, png, setup};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use upload_sessions_seaorm_store::entity::upload_session;
use upload_sessions_seaorm_store::{
    IncomingFile, SessionStatus, StorageError, StorageTier, UploadError,
};

#[tokio::test]
async fn test_new_session_starts_created_and_empty() {
    let h = setup().await;
    let session = h.store.new_session(Some(7)).await.unwrap();

    assert_eq!(session.status, SessionStatus::Created);
    assert_eq!(session.user_id, Some(7));
    assert_eq!(session.token.len(), 32);

    assert!(h.store.get_temporary_uploads(&session).await.unwrap().is_empty());
    assert!(h.store.get_permanent_uploads(&session).await.unwrap().is_empty());
    assert!(h.store.get_uploads(&session).await.unwrap().is_empty());
    assert_eq!(h.store.file_count(&session).await.unwrap(), 0);
}

#[tokio::test]
async fn test_tokens_are_unique_and_sessions_are_found_by_user() {
    let h = setup().await;
    let first = h.store.new_session(Some(1)).await.unwrap();
    let second = h.store.new_session(Some(1)).await.unwrap();
    h.store.new_session(Some(2)).await.unwrap();

    assert_ne!(first.token, second.token);

    let sessions = h.store.sessions_for_user(1).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(h.store.get_session("no-such-token").await.unwrap().is_none());
    assert!(matches!(
        h.store.require_session("no-such-token").await,
        Err(UploadError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_first_file_starts_uploading_and_last_removal_reverts() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    let started = session.last_upload_interaction_time;

    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(100)))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Uploading);
    assert!(session.last_upload_interaction_time >= started);
    assert_eq!(h.reload(&session).await.status, SessionStatus::Uploading);

    let temp = h.store.get_temporary_uploads(&session).await.unwrap();
    assert_eq!(temp.len(), 1);
    assert_eq!(temp[0].tier, StorageTier::Temporary);
    assert_eq!(temp[0].file_path, format!("{}/a.pdf", session.token));
    assert!(h.temp_root().join(&session.token).join("a.pdf").exists());

    h.store.remove_temp_file_by_name(&mut session, "a.pdf").await.unwrap();
    assert_eq!(session.status, SessionStatus::Created);
    assert!(!h.temp_root().join(&session.token).join("a.pdf").exists());
}

#[tokio::test]
async fn test_removing_one_of_several_files_keeps_uploading() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    for name in ["a.pdf", "b.pdf"] {
        h.store
            .add_temp_file(&mut session, &IncomingFile::new(name, pdf(10)))
            .await
            .unwrap();
    }

    h.store.remove_temp_file_by_name(&mut session, "a.pdf").await.unwrap();
    assert_eq!(session.status, SessionStatus::Uploading);
    assert_eq!(h.store.file_count(&session).await.unwrap(), 1);
}

#[tokio::test]
async fn test_remove_requires_uploading_and_existing_name() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();

    let err = h
        .store
        .remove_temp_file_by_name(&mut session, "a.pdf")
        .await
        .unwrap_err();
    assert!(err.is_state_violation());

    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    assert!(matches!(
        h.store.remove_temp_file_by_name(&mut session, "other.pdf").await,
        Err(UploadError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn test_uploading_session_has_no_permanent_listing() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();

    assert!(matches!(
        h.store.get_permanent_uploads(&session).await,
        Err(UploadError::InvalidState {
            status: SessionStatus::Uploading,
            ..
        })
    ));
}

#[tokio::test]
async fn test_make_uploads_permanent_from_created_raises() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();

    let err = h.store.make_uploads_permanent(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        UploadError::InvalidState {
            status: SessionStatus::Created,
            ..
        }
    ));
    assert_eq!(h.reload(&session).await.status, SessionStatus::Created);
}

#[tokio::test]
async fn test_promoted_file_is_permanent_and_not_temporary() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    let data = pdf(1_000);
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("report.pdf", data.clone()))
        .await
        .unwrap();

    h.store.make_uploads_permanent(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Stored);

    assert!(h.store.get_temporary_uploads(&session).await.unwrap().is_empty());
    let permanent = h.store.get_permanent_uploads(&session).await.unwrap();
    assert_eq!(permanent.len(), 1);
    assert_eq!(permanent[0].name, "report.pdf");
    assert_eq!(permanent[0].tier, StorageTier::Permanent);
    assert_eq!(permanent[0].size, 1_000);

    assert!(!h.temp_root().join(&session.token).join("report.pdf").exists());
    assert!(h.permanent_root().join(&session.token).join("report.pdf").exists());
    assert_eq!(h.store.read_uploaded_file(&permanent[0]).await.unwrap(), data);

    let uploads = h.store.get_uploads(&session).await.unwrap();
    assert_eq!(uploads, permanent);
}

#[tokio::test]
async fn test_make_uploads_permanent_is_a_no_op_when_stored() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    h.store.make_uploads_permanent(&mut session).await.unwrap();

    h.store.make_uploads_permanent(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Stored);
    assert_eq!(h.store.file_count(&session).await.unwrap(), 1);
}

#[tokio::test]
async fn test_stored_session_with_no_files_lists_empty() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    h.store.make_uploads_permanent(&mut session).await.unwrap();

    let file = h.store.get_file_by_name(&session, "a.pdf").await.unwrap().unwrap();
    h.store.delete_uploaded_file(file).await.unwrap();

    assert!(h.store.get_temporary_uploads(&session).await.unwrap().is_empty());
    assert!(h.store.get_permanent_uploads(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_temp_bytes_fail_the_copy() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    std::fs::remove_file(h.temp_root().join(&session.token).join("a.pdf")).unwrap();

    let err = h.store.make_uploads_permanent(&mut session).await.unwrap_err();
    assert!(matches!(err, UploadError::Storage(StorageError::NotFound(_))));
    assert_eq!(session.status, SessionStatus::CopyingFailed);
    assert_eq!(h.reload(&session).await.status, SessionStatus::CopyingFailed);

    // Nothing can be listed once copying failed.
    assert!(h.store.get_uploads(&session).await.is_err());
    assert!(h.store.make_uploads_permanent(&mut session).await.is_err());
}

#[tokio::test]
async fn test_listing_failure_leaves_session_uploading() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();

    h.store.connection().clone().close().await.unwrap();

    let err = h.store.make_uploads_permanent(&mut session).await.unwrap_err();
    assert!(matches!(err, UploadError::Database(_)));
    assert_eq!(session.status, SessionStatus::Uploading);

    let conn = h.reopen().await;
    let stored = upload_session::Entity::find()
        .filter(upload_session::Column::Token.eq(session.token.as_str()))
        .one(&conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SessionStatus::Uploading);
    assert!(h.temp_root().join(&session.token).join("a.pdf").exists());
}

#[tokio::test]
async fn test_expired_session_listings_raise() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();

    h.store.expire(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Expired);
    assert!(!h.temp_root().join(&session.token).join("a.pdf").exists());

    for result in [
        h.store.get_temporary_uploads(&session).await,
        h.store.get_permanent_uploads(&session).await,
        h.store.get_uploads(&session).await,
    ] {
        assert!(result.unwrap_err().is_state_violation());
    }

    let err = h
        .store
        .add_temp_file(&mut session, &IncomingFile::new("b.pdf", pdf(10)))
        .await
        .unwrap_err();
    assert!(err.is_state_violation());
    assert!(h.store.expire(&mut session).await.is_err());
}

#[tokio::test]
async fn test_copy_session_uploads_reports_missing_files() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("kept.pdf", pdf(10)))
        .await
        .unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("gone.png", png(10)))
        .await
        .unwrap();
    h.store.make_uploads_permanent(&mut session).await.unwrap();

    let gone = h.store.get_file_by_name(&session, "gone.png").await.unwrap().unwrap();
    std::fs::remove_file(h.permanent_root().join(&session.token).join("gone.png")).unwrap();
    assert!(!h.store.file_exists(&gone).await.unwrap());

    let destination = h.dir.path().join("export");
    let report = h
        .store
        .copy_session_uploads(&mut session, &destination)
        .await
        .unwrap();

    assert_eq!(report.copied, vec![destination.join("kept.pdf")]);
    assert_eq!(report.missing, vec!["gone.png".to_string()]);
    assert_eq!(session.status, SessionStatus::Stored);
    assert_eq!(std::fs::read(destination.join("kept.pdf")).unwrap(), pdf(10));
}

#[tokio::test]
async fn test_copy_session_uploads_unwritable_destination_fails() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    h.store.make_uploads_permanent(&mut session).await.unwrap();

    // A regular file where the destination directory should be.
    let destination = h.dir.path().join("export");
    std::fs::write(&destination, b"not a directory").unwrap();

    let err = h
        .store
        .copy_session_uploads(&mut session, &destination.join("nested"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Storage(StorageError::CopyFailed { .. })));
    assert_eq!(session.status, SessionStatus::CopyingFailed);
    assert_eq!(h.reload(&session).await.status, SessionStatus::CopyingFailed);

    // The permanent copy is untouched.
    assert!(h.permanent_root().join(&session.token).join("a.pdf").exists());
}

#[tokio::test]
async fn test_copy_session_uploads_requires_stored() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();

    let err = h
        .store
        .copy_session_uploads(&mut session, h.dir.path())
        .await
        .unwrap_err();
    assert!(err.is_state_violation());
}

#[tokio::test]
async fn test_reset_clears_files_and_returns_to_created() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    h.store.make_uploads_permanent(&mut session).await.unwrap();

    h.store.reset(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Created);
    assert!(!h.permanent_root().join(&session.token).join("a.pdf").exists());
    assert!(h.store.get_uploads(&session).await.unwrap().is_empty());

    // Resetting a fresh session changes nothing.
    h.store.reset(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Created);

    // The session can be used again.
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("b.pdf", pdf(10)))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Uploading);
}

#[tokio::test]
async fn test_expiry_window() {
    let h = setup().await;
    let session = h.store.new_session(None).await.unwrap();
    let window = Duration::minutes(h.store.settings().expire_after_inactive_minutes);

    assert_eq!(
        h.store.expires_at(&session),
        session.last_upload_interaction_time + window
    );
    assert!(!h.store.is_expired(&session, Utc::now()));
    assert!(h
        .store
        .is_expired(&session, session.last_upload_interaction_time + window));
}

#[tokio::test]
async fn test_expire_inactive_sessions_sweeps_only_idle_ones() {
    let h = setup().await;
    let idle = h.store.new_session(None).await.unwrap();
    let idle = h
        .set_last_interaction(idle, Utc::now() - Duration::days(2))
        .await;
    let mut idle_uploading = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut idle_uploading, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    let idle_uploading = h
        .set_last_interaction(idle_uploading, Utc::now() - Duration::days(3))
        .await;
    let active = h.store.new_session(None).await.unwrap();

    let expirable = h.store.expirable_sessions().await.unwrap();
    assert_eq!(expirable.len(), 2);

    assert_eq!(h.store.expire_inactive_sessions().await.unwrap(), 2);
    assert_eq!(h.reload(&idle).await.status, SessionStatus::Expired);
    assert_eq!(h.reload(&idle_uploading).await.status, SessionStatus::Expired);
    assert_eq!(h.reload(&active).await.status, SessionStatus::Created);
    assert!(!h
        .temp_root()
        .join(&idle_uploading.token)
        .join("a.pdf")
        .exists());

    assert_eq!(h.store.expire_inactive_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_session_removes_rows_and_bytes() {
    let h = setup().await;
    let mut session = h.store.new_session(None).await.unwrap();
    h.store
        .add_temp_file(&mut session, &IncomingFile::new("a.pdf", pdf(10)))
        .await
        .unwrap();
    let token = session.token.clone();

    h.store.delete_session(session).await.unwrap();

    assert!(h.store.get_session(&token).await.unwrap().is_none());
    assert!(!h.temp_root().join(&token).join("a.pdf").exists());
}
