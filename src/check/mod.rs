//! Upload acceptance checks.
//!
//! [`accept_file`] judges a candidate on its own (size, name, type) and
//! [`accept_session`] judges it against the session it would join (count,
//! cumulative size, duplicate names). Both run an ordered list of independent
//! checks and stop at the first rejection.
//!
//! Rejections are values, not errors: each carries a short message meant for
//! the submitter and a verbose one meant for logs.

mod filename;
mod mime;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::UploadLimits;
use crate::summary::bytes_to_mb;

pub use mime::{expected_mime_types, sniffing_available, SNIFF_LENGTH};

/// Outcome of an acceptance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceptance {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose_error: Option<String>,
}

impl Acceptance {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            error: None,
            verbose_error: None,
        }
    }

    pub fn reject(error: impl Into<String>, verbose_error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            error: Some(error.into()),
            verbose_error: Some(verbose_error.into()),
        }
    }
}

/// What the checks get to see of an incoming file.
#[derive(Debug, Clone, Copy)]
pub struct FileCandidate<'a> {
    pub name: &'a str,
    /// Declared size in bytes. Signed so that nonsense sizes can be rejected
    /// rather than wrapped.
    pub size: i64,
    /// Leading bytes of the content for type sniffing, when available.
    pub head: Option<&'a [u8]>,
}

impl<'a> FileCandidate<'a> {
    pub fn new(name: &'a str, size: i64) -> Self {
        Self {
            name,
            size,
            head: None,
        }
    }

    pub fn with_head(mut self, head: &'a [u8]) -> Self {
        self.head = Some(head);
        self
    }
}

/// The parts of a session the session-level checks need.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub file_count: u64,
    pub total_size: i64,
    /// Names of the session's temporary uploads.
    pub file_names: HashSet<String>,
}

impl SessionSnapshot {
    pub fn from_files<'a>(files: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut snapshot = Self::default();
        for (name, size) in files {
            snapshot.file_count += 1;
            snapshot.total_size += size;
            snapshot.file_names.insert(name.to_string());
        }
        snapshot
    }
}

/// A single file-level check.
pub type FileCheck = fn(&FileCandidate<'_>, &UploadLimits) -> Acceptance;

/// A single session-level check.
pub type SessionCheck = fn(&FileCandidate<'_>, &SessionSnapshot, &UploadLimits) -> Acceptance;

/// File-level checks, in the order they run.
pub const FILE_CHECKS: &[FileCheck] = &[
    check_size,
    filename::check_name_sanity,
    filename::check_control_characters,
    filename::check_absolute_path,
    filename::check_path_traversal,
    filename::check_reserved_name,
    check_extension,
    mime::check_mime_type,
];

/// Session-level checks, in the order they run.
pub const SESSION_CHECKS: &[SessionCheck] = &[
    check_file_count,
    check_total_size,
    check_duplicate_name,
];

/// Run every file-level check, returning the first rejection.
pub fn accept_file(candidate: &FileCandidate<'_>, limits: &UploadLimits) -> Acceptance {
    FILE_CHECKS
        .iter()
        .map(|check| check(candidate, limits))
        .find(|verdict| !verdict.accepted)
        .unwrap_or_else(Acceptance::accept)
}

/// Run every session-level check, returning the first rejection.
pub fn accept_session(
    candidate: &FileCandidate<'_>,
    session: &SessionSnapshot,
    limits: &UploadLimits,
) -> Acceptance {
    SESSION_CHECKS
        .iter()
        .map(|check| check(candidate, session, limits))
        .find(|verdict| !verdict.accepted)
        .unwrap_or_else(Acceptance::accept)
}

/// Lower-cased extension after the last dot, if there is a non-empty one.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}

fn check_size(candidate: &FileCandidate<'_>, limits: &UploadLimits) -> Acceptance {
    if candidate.size < 0 {
        return Acceptance::reject(
            "Invalid file size",
            format!(
                "File \"{}\" reported a negative size ({})",
                candidate.name, candidate.size
            ),
        );
    }

    if candidate.size == 0 {
        return Acceptance::reject(
            "File is empty",
            format!("File \"{}\" is empty", candidate.name),
        );
    }

    let max = limits.max_single_upload_bytes();
    if candidate.size > max {
        return Acceptance::reject(
            format!(
                "File is too big ({:.2}MB). Max filesize: {}MB",
                bytes_to_mb(candidate.size),
                limits.max_single_upload_size_mb
            ),
            format!(
                "File \"{}\" is {} bytes, over the {} byte single-file limit",
                candidate.name, candidate.size, max
            ),
        );
    }

    Acceptance::accept()
}

fn check_extension(candidate: &FileCandidate<'_>, limits: &UploadLimits) -> Acceptance {
    let Some(extension) = file_extension(candidate.name) else {
        return Acceptance::reject(
            "File does not have a file extension",
            format!("File \"{}\" does not have a file extension", candidate.name),
        );
    };

    if !limits.is_accepted_extension(&extension) {
        return Acceptance::reject(
            format!("Files with \"{}\" extension are not allowed.", extension),
            format!(
                "File \"{}\" has extension \"{}\", which is not in the accepted list",
                candidate.name, extension
            ),
        );
    }

    Acceptance::accept()
}

fn check_file_count(
    candidate: &FileCandidate<'_>,
    session: &SessionSnapshot,
    limits: &UploadLimits,
) -> Acceptance {
    if session.file_count >= limits.max_total_upload_count {
        return Acceptance::reject(
            format!(
                "You can not upload anymore files. Max number of files: {}",
                limits.max_total_upload_count
            ),
            format!(
                "File \"{}\" would exceed the limit of {} files per session",
                candidate.name, limits.max_total_upload_count
            ),
        );
    }

    Acceptance::accept()
}

fn check_total_size(
    candidate: &FileCandidate<'_>,
    session: &SessionSnapshot,
    limits: &UploadLimits,
) -> Acceptance {
    let ceiling = limits.max_session_bytes();
    let remaining = ceiling - session.total_size;

    if candidate.size > remaining {
        return Acceptance::reject(
            format!(
                "Maximum total upload size ({}MB) exceeded",
                bytes_to_mb(ceiling).round()
            ),
            format!(
                "File \"{}\" ({} bytes) does not fit in the remaining {} bytes of the session",
                candidate.name,
                candidate.size,
                remaining.max(0)
            ),
        );
    }

    Acceptance::accept()
}

fn check_duplicate_name(
    candidate: &FileCandidate<'_>,
    session: &SessionSnapshot,
    _limits: &UploadLimits,
) -> Acceptance {
    if session.file_names.contains(candidate.name) {
        return Acceptance::reject(
            "A file with the same name has already been uploaded",
            format!(
                "A file named \"{}\" is already part of this session",
                candidate.name
            ),
        );
    }

    Acceptance::accept()
}
