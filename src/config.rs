//! Upload configuration.
//!
//! Limits are plain values injected into the validators and the store; nothing
//! reads process-wide settings at check time. [`UploadSettings::from_env`]
//! builds the whole thing from environment variables (and `.env`).

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default values used when a variable is not set.
pub mod defaults {
    pub const MAX_SINGLE_UPLOAD_SIZE_MB: u64 = 64;
    pub const MAX_TOTAL_UPLOAD_SIZE_MB: u64 = 256;
    pub const MAX_TOTAL_UPLOAD_COUNT: u64 = 40;
    pub const MAX_FILENAME_LENGTH: usize = 255;
    pub const EXPIRE_AFTER_INACTIVE_MINUTES: i64 = 1440;
    pub const TEMP_STORAGE_FOLDER: &str = "media/temp";
    pub const UPLOAD_STORAGE_FOLDER: &str = "media/uploaded_files";
    pub const CLAMAV_HOST: &str = "localhost";
    pub const CLAMAV_PORT: u16 = 3310;
    /// clamd's default `StreamMaxLength` is 25MB.
    pub const CLAMAV_MAX_SCAN_SIZE_MB: u64 = 25;
    pub const CLAMAV_TIMEOUT_SECS: u64 = 30;
    pub const ACCEPTED_FILE_FORMATS: &str = "Archive:zip;\
        Audio:mp3,wav,flac;\
        Document:docx,odt,pdf,txt,html;\
        Image:jpg,jpeg,png,gif;\
        Spreadsheet:xlsx,csv;\
        Video:mkv,mp4";
}

/// Megabytes are decimal throughout (1 MB = 1,000,000 bytes).
pub fn mb_to_bytes(mb: u64) -> i64 {
    (mb as i64).saturating_mul(1_000_000)
}

/// Size and type limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    pub max_single_upload_size_mb: u64,
    pub max_total_upload_size_mb: u64,
    pub max_total_upload_count: u64,
    pub max_filename_length: usize,
    /// Group name (e.g. "Document") to lower-case extensions.
    pub accepted_file_types: BTreeMap<String, Vec<String>>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_single_upload_size_mb: defaults::MAX_SINGLE_UPLOAD_SIZE_MB,
            max_total_upload_size_mb: defaults::MAX_TOTAL_UPLOAD_SIZE_MB,
            max_total_upload_count: defaults::MAX_TOTAL_UPLOAD_COUNT,
            max_filename_length: defaults::MAX_FILENAME_LENGTH,
            // The built-in list is known to parse.
            accepted_file_types: parse_accepted_file_types(defaults::ACCEPTED_FILE_FORMATS)
                .unwrap_or_default(),
        }
    }
}

impl UploadLimits {
    pub fn max_single_upload_bytes(&self) -> i64 {
        mb_to_bytes(self.max_single_upload_size_mb)
    }

    /// The session-wide ceiling: the larger of the single-file and total limits.
    pub fn max_session_bytes(&self) -> i64 {
        mb_to_bytes(
            self.max_single_upload_size_mb
                .max(self.max_total_upload_size_mb),
        )
    }

    /// The group an extension belongs to, if it is accepted at all.
    pub fn group_for_extension(&self, extension: &str) -> Option<&str> {
        let extension = extension.to_lowercase();
        self.accepted_file_types
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| *e == extension))
            .map(|(group, _)| group.as_str())
    }

    pub fn is_accepted_extension(&self, extension: &str) -> bool {
        self.group_for_extension(extension).is_some()
    }
}

/// ClamAV daemon connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClamAvSettings {
    pub host: String,
    pub port: u16,
    pub max_scan_size_mb: u64,
    pub timeout_secs: u64,
}

impl Default for ClamAvSettings {
    fn default() -> Self {
        Self {
            host: defaults::CLAMAV_HOST.to_string(),
            port: defaults::CLAMAV_PORT,
            max_scan_size_mb: defaults::CLAMAV_MAX_SCAN_SIZE_MB,
            timeout_secs: defaults::CLAMAV_TIMEOUT_SECS,
        }
    }
}

/// Everything the upload store needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    pub limits: UploadLimits,
    /// Root directory for files of sessions that are still uploading.
    pub temp_storage_root: PathBuf,
    /// Root directory for files of finalized sessions.
    pub upload_storage_root: PathBuf,
    pub expire_after_inactive_minutes: i64,
    /// `None` disables malware scanning.
    pub clamav: Option<ClamAvSettings>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            temp_storage_root: PathBuf::from(defaults::TEMP_STORAGE_FOLDER),
            upload_storage_root: PathBuf::from(defaults::UPLOAD_STORAGE_FOLDER),
            expire_after_inactive_minutes: defaults::EXPIRE_AFTER_INACTIVE_MINUTES,
            clamav: None,
        }
    }
}

impl UploadSettings {
    /// Load settings from environment variables, reading `.env` if present.
    ///
    /// Environment variables:
    /// - `MAX_SINGLE_UPLOAD_SIZE_MB` (default: 64)
    /// - `MAX_TOTAL_UPLOAD_SIZE_MB` (default: 256)
    /// - `MAX_TOTAL_UPLOAD_COUNT` (default: 40)
    /// - `ACCEPTED_FILE_FORMATS`: `Group:ext,ext;Group:ext`
    /// - `UPLOAD_SESSION_EXPIRE_AFTER_INACTIVE_MINUTES` (default: 1440)
    /// - `TEMP_STORAGE_FOLDER`, `UPLOAD_STORAGE_FOLDER`
    /// - `CLAMAV_ENABLED` (`true`/`false`, default: false)
    /// - `CLAMAV_HOST`, `CLAMAV_PORT`, `CLAMAV_MAX_SCAN_SIZE_MB`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let accepted_file_types = parse_accepted_file_types(
            &env::var("ACCEPTED_FILE_FORMATS")
                .unwrap_or_else(|_| defaults::ACCEPTED_FILE_FORMATS.to_string()),
        )?;

        let limits = UploadLimits {
            max_single_upload_size_mb: parse_var(
                "MAX_SINGLE_UPLOAD_SIZE_MB",
                defaults::MAX_SINGLE_UPLOAD_SIZE_MB,
            )?,
            max_total_upload_size_mb: parse_var(
                "MAX_TOTAL_UPLOAD_SIZE_MB",
                defaults::MAX_TOTAL_UPLOAD_SIZE_MB,
            )?,
            max_total_upload_count: parse_var(
                "MAX_TOTAL_UPLOAD_COUNT",
                defaults::MAX_TOTAL_UPLOAD_COUNT,
            )?,
            max_filename_length: defaults::MAX_FILENAME_LENGTH,
            accepted_file_types,
        };

        let clamav = if parse_var("CLAMAV_ENABLED", false)? {
            Some(ClamAvSettings {
                host: env::var("CLAMAV_HOST").unwrap_or_else(|_| defaults::CLAMAV_HOST.to_string()),
                port: parse_var("CLAMAV_PORT", defaults::CLAMAV_PORT)?,
                max_scan_size_mb: parse_var(
                    "CLAMAV_MAX_SCAN_SIZE_MB",
                    defaults::CLAMAV_MAX_SCAN_SIZE_MB,
                )?,
                timeout_secs: defaults::CLAMAV_TIMEOUT_SECS,
            })
        } else {
            None
        };

        let settings = Self {
            limits,
            temp_storage_root: env::var("TEMP_STORAGE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::TEMP_STORAGE_FOLDER)),
            upload_storage_root: env::var("UPLOAD_STORAGE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::UPLOAD_STORAGE_FOLDER)),
            expire_after_inactive_minutes: parse_var(
                "UPLOAD_SESSION_EXPIRE_AFTER_INACTIVE_MINUTES",
                defaults::EXPIRE_AFTER_INACTIVE_MINUTES,
            )?,
            clamav,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make every upload fail or mix the tiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.limits.max_single_upload_size_mb == 0 {
            errors.push("MAX_SINGLE_UPLOAD_SIZE_MB must be greater than zero".to_string());
        }
        if self.limits.max_total_upload_count == 0 {
            errors.push("MAX_TOTAL_UPLOAD_COUNT must be greater than zero".to_string());
        }
        if self.limits.accepted_file_types.is_empty() {
            errors.push("ACCEPTED_FILE_FORMATS lists no file types".to_string());
        }
        if self.expire_after_inactive_minutes <= 0 {
            errors.push(
                "UPLOAD_SESSION_EXPIRE_AFTER_INACTIVE_MINUTES must be greater than zero"
                    .to_string(),
            );
        }
        if self.temp_storage_root == self.upload_storage_root {
            errors.push(format!(
                "TEMP_STORAGE_FOLDER and UPLOAD_STORAGE_FOLDER are both '{}'",
                self.temp_storage_root.display()
            ));
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

/// Parse `Group:ext,ext;Group:ext` into a group-to-extensions map.
///
/// Extensions are lower-cased and may carry a leading dot.
pub fn parse_accepted_file_types(
    raw: &str,
) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let mut groups = BTreeMap::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (group, extensions) =
            entry
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "ACCEPTED_FILE_FORMATS",
                    value: entry.to_string(),
                })?;

        let group = group.trim();
        let extensions: Vec<String> = extensions
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if group.is_empty() || extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "ACCEPTED_FILE_FORMATS",
                value: entry.to_string(),
            });
        }

        groups
            .entry(group.to_string())
            .or_insert_with(Vec::new)
            .extend(extensions);
    }

    Ok(groups)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Upload configuration is invalid:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}
