//! Content sniffing cross-checked against the claimed extension.
//!
//! Sniffing needs the `mime-sniff` feature (backed by `infer`). Without it the
//! check passes every file: the portal stays usable, with one fewer guard.

use super::{file_extension, Acceptance, FileCandidate};
use crate::config::UploadLimits;

/// Bytes of content the sniffer looks at.
pub const SNIFF_LENGTH: usize = 8192;

const TEXT_PLAIN: &str = "text/plain";
#[cfg(feature = "mime-sniff")]
const OCTET_STREAM: &str = "application/octet-stream";

/// MIME types a file with `extension` may sniff as. Empty when the extension
/// has no known signature, in which case the check does not apply.
pub fn expected_mime_types(extension: &str) -> &'static [&'static str] {
    match extension {
        "pdf" => &["application/pdf"],
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "zip" => &["application/zip"],
        "docx" => &[
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/zip",
        ],
        "xlsx" => &[
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/zip",
        ],
        "odt" => &["application/vnd.oasis.opendocument.text", "application/zip"],
        "mp3" => &["audio/mpeg"],
        "wav" => &["audio/x-wav", "audio/wav"],
        "flac" => &["audio/x-flac", "audio/flac"],
        "mkv" => &["video/x-matroska"],
        "mp4" => &["video/mp4"],
        "txt" | "csv" => &[TEXT_PLAIN, "text/csv"],
        "html" | "htm" => &["text/html", TEXT_PLAIN],
        _ => &[],
    }
}

/// Whether this build can sniff content at all.
pub fn sniffing_available() -> bool {
    cfg!(feature = "mime-sniff")
}

pub(super) fn check_mime_type(candidate: &FileCandidate<'_>, _limits: &UploadLimits) -> Acceptance {
    let (Some(head), Some(extension)) = (candidate.head, file_extension(candidate.name)) else {
        return Acceptance::accept();
    };

    let expected = expected_mime_types(&extension);
    if expected.is_empty() {
        return Acceptance::accept();
    }

    let Some(detected) = sniff(head) else {
        return Acceptance::accept();
    };

    if expected.contains(&detected) {
        return Acceptance::accept();
    }

    Acceptance::reject(
        format!(
            "File content does not match its \"{}\" extension",
            extension
        ),
        format!(
            "File \"{}\" was detected as {}, expected one of: {}",
            candidate.name,
            detected,
            expected.join(", ")
        ),
    )
}

/// Best guess at the content type of `head`, or `None` when sniffing is
/// compiled out.
#[cfg(feature = "mime-sniff")]
fn sniff(head: &[u8]) -> Option<&'static str> {
    let head = &head[..head.len().min(SNIFF_LENGTH)];
    match infer::get(head) {
        Some(kind) => Some(kind.mime_type()),
        // No binary signature: call it text if it decodes and has no NULs.
        None if looks_like_text(head) => Some(TEXT_PLAIN),
        None => Some(OCTET_STREAM),
    }
}

/// Valid UTF-8 without NULs. A sequence cut short by the end of `head` still
/// counts, since the head is a prefix of the file.
#[cfg(feature = "mime-sniff")]
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

#[cfg(not(feature = "mime-sniff"))]
fn sniff(_head: &[u8]) -> Option<&'static str> {
    None
}
