//! Checks on the submitted file name.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use super::{Acceptance, FileCandidate};
use crate::config::UploadLimits;

/// Device names Windows refuses as file names, with or without extension.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Fragments that must not appear in a name after decoding.
const TRAVERSAL_FRAGMENTS: &[&str] = &["..", "/", "\\"];

pub(super) fn check_name_sanity(candidate: &FileCandidate<'_>, limits: &UploadLimits) -> Acceptance {
    if candidate.name.trim().is_empty() {
        return Acceptance::reject("File name is empty", "File name is empty or blank");
    }

    let length = candidate.name.chars().count();
    if length > limits.max_filename_length {
        return Acceptance::reject(
            format!(
                "File name is too long. Max length: {} characters",
                limits.max_filename_length
            ),
            format!(
                "File name is {} characters, over the {} character limit",
                length, limits.max_filename_length
            ),
        );
    }

    Acceptance::accept()
}

pub(super) fn check_control_characters(
    candidate: &FileCandidate<'_>,
    _limits: &UploadLimits,
) -> Acceptance {
    if let Some(c) = candidate.name.chars().find(|c| c.is_control()) {
        return Acceptance::reject(
            "File name contains invalid characters",
            format!(
                "File name {:?} contains control character U+{:04X}",
                candidate.name, c as u32
            ),
        );
    }

    Acceptance::accept()
}

pub(super) fn check_absolute_path(
    candidate: &FileCandidate<'_>,
    _limits: &UploadLimits,
) -> Acceptance {
    let name = candidate.name;
    let bytes = name.as_bytes();
    let drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';

    if name.starts_with('/') || name.starts_with('\\') || drive_prefix {
        return Acceptance::reject(
            "File name cannot be an absolute path",
            format!("File name \"{}\" is an absolute path", name),
        );
    }

    Acceptance::accept()
}

pub(super) fn check_path_traversal(
    candidate: &FileCandidate<'_>,
    _limits: &UploadLimits,
) -> Acceptance {
    for form in decoded_forms(candidate.name) {
        if let Some(fragment) = TRAVERSAL_FRAGMENTS.iter().find(|f| form.contains(**f)) {
            return Acceptance::reject(
                "File name contains invalid path characters",
                format!(
                    "File name \"{}\" contains \"{}\" once decoded as \"{}\"",
                    candidate.name, fragment, form
                ),
            );
        }
    }

    Acceptance::accept()
}

pub(super) fn check_reserved_name(
    candidate: &FileCandidate<'_>,
    _limits: &UploadLimits,
) -> Acceptance {
    let stem = candidate
        .name
        .split('.')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();

    if WINDOWS_RESERVED_NAMES.contains(&stem.as_str()) {
        return Acceptance::reject(
            "File name is reserved",
            format!(
                "File name \"{}\" uses the reserved device name {}",
                candidate.name, stem
            ),
        );
    }

    Acceptance::accept()
}

/// The raw name, its percent-decoding, and the decoding of that.
fn decoded_forms(name: &str) -> [Cow<'_, str>; 3] {
    let once = percent_decode_str(name).decode_utf8_lossy();
    let twice = percent_decode_str(&once).decode_utf8_lossy().into_owned();
    [Cow::Borrowed(name), Cow::Owned(once.into_owned()), Cow::Owned(twice)]
}
