//! Database entity models for upload-sessions-seaorm-store.
//!
//! This module contains the Sea-ORM entity definitions backing the upload
//! session store. An upload session owns zero or more uploaded files; each
//! file record is tagged with the storage tier (temporary or permanent) its
//! bytes live in.

/// Upload session entity and its status enum.
///
/// One row per submitter's in-progress (or finished) upload.
pub mod upload_session;

/// Uploaded file entity and its storage tier enum.
pub mod uploaded_file;
