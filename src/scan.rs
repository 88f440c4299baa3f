//! Malware scanning collaborator.
//!
//! The store hands every admitted upload to a [`MalwareScanner`] before any
//! bytes reach storage. A scanner either returns `Ok(())` or says why the file
//! cannot be taken: infected content, a scanner that cannot be reached, or a
//! file too large to scan at all.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::UploadSettings;

/// Reasons a scan did not clear a file.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanner flagged the content. Carries the signature name.
    #[error("file rejected by malware scan: {0}")]
    Rejected(String),

    #[error("malware scanner unavailable: {0}")]
    Unreachable(String),

    #[error("file of {size} bytes exceeds the {limit} byte scan limit")]
    TooLarge { size: u64, limit: u64 },
}

#[async_trait]
pub trait MalwareScanner: Send + Sync + Debug {
    async fn check_for_malware(&self, name: &str, data: &[u8]) -> Result<(), ScanError>;
}

/// Lets everything through. Used when scanning is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScanner;

#[async_trait]
impl MalwareScanner for DisabledScanner {
    async fn check_for_malware(&self, name: &str, _data: &[u8]) -> Result<(), ScanError> {
        tracing::trace!(file = name, "Malware scanning disabled, skipping");
        Ok(())
    }
}

/// Build the scanner the settings ask for.
///
/// Settings that enable ClamAV in a build without the `clamav` feature fall
/// back to [`DisabledScanner`] with a warning.
pub fn scanner_from_settings(settings: &UploadSettings) -> Arc<dyn MalwareScanner> {
    match &settings.clamav {
        #[cfg(feature = "clamav")]
        Some(clamav) => Arc::new(clamav::ClamAvScanner::from_settings(clamav)),
        #[cfg(not(feature = "clamav"))]
        Some(_) => {
            tracing::warn!("CLAMAV_ENABLED is set but the clamav feature is not compiled in");
            Arc::new(DisabledScanner)
        }
        None => Arc::new(DisabledScanner),
    }
}

#[cfg(feature = "clamav")]
pub use clamav::ClamAvScanner;

#[cfg(feature = "clamav")]
mod clamav {
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use clamav_client::{clean, Tcp};

    use super::{MalwareScanner, ScanError};
    use crate::config::{mb_to_bytes, ClamAvSettings};

    /// clamd's reply when a stream goes over `StreamMaxLength`.
    const SIZE_LIMIT_REPLY: &str = "size limit exceeded";

    /// Scans over clamd's TCP `INSTREAM` command.
    #[derive(Debug, Clone)]
    pub struct ClamAvScanner {
        host: String,
        port: u16,
        max_scan_bytes: u64,
        timeout: Duration,
    }

    impl ClamAvScanner {
        pub fn from_settings(settings: &ClamAvSettings) -> Self {
            Self {
                host: settings.host.clone(),
                port: settings.port,
                max_scan_bytes: mb_to_bytes(settings.max_scan_size_mb).max(0) as u64,
                timeout: Duration::from_secs(settings.timeout_secs),
            }
        }
    }

    #[async_trait]
    impl MalwareScanner for ClamAvScanner {
        async fn check_for_malware(&self, name: &str, data: &[u8]) -> Result<(), ScanError> {
            let size = data.len() as u64;
            if size > self.max_scan_bytes {
                return Err(ScanError::TooLarge {
                    size,
                    limit: self.max_scan_bytes,
                });
            }

            let start = Instant::now();
            let address = format!("{}:{}", self.host, self.port);
            let data = data.to_vec();

            // The sync client keeps the future Send; run it off the runtime.
            let scan = tokio::task::spawn_blocking(move || {
                let connection = Tcp {
                    host_address: address.as_str(),
                };
                clamav_client::scan_buffer(data.as_slice(), connection, None)
            });

            let response = match tokio::time::timeout(self.timeout, scan).await {
                Ok(Ok(Ok(response))) => response,
                Ok(Ok(Err(e))) => {
                    tracing::error!(file = name, error = %e, "ClamAV scan failed");
                    return Err(ScanError::Unreachable(e.to_string()));
                }
                Ok(Err(e)) => {
                    tracing::error!(file = name, error = %e, "ClamAV scan task panicked");
                    return Err(ScanError::Unreachable(e.to_string()));
                }
                Err(_) => {
                    tracing::error!(
                        file = name,
                        timeout_secs = self.timeout.as_secs(),
                        "ClamAV scan timed out"
                    );
                    return Err(ScanError::Unreachable(format!(
                        "scan timed out after {} seconds",
                        self.timeout.as_secs()
                    )));
                }
            };

            let reply = String::from_utf8_lossy(&response).trim().to_string();
            if reply.contains(SIZE_LIMIT_REPLY) {
                return Err(ScanError::TooLarge {
                    size,
                    limit: self.max_scan_bytes,
                });
            }

            match clean(&response) {
                Ok(true) => {
                    tracing::debug!(
                        file = name,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "File scan completed: clean"
                    );
                    Ok(())
                }
                Ok(false) => {
                    let signature = signature_name(&reply);
                    tracing::warn!(file = name, signature = %signature, "File scan detected malware");
                    Err(ScanError::Rejected(signature))
                }
                Err(e) => {
                    tracing::error!(file = name, error = %e, "Failed to parse ClamAV response");
                    Err(ScanError::Unreachable(format!(
                        "unreadable ClamAV response: {}",
                        e
                    )))
                }
            }
        }
    }

    /// `stream: Eicar-Signature FOUND` -> `Eicar-Signature`.
    fn signature_name(reply: &str) -> String {
        reply
            .split_once(':')
            .map(|(_, rest)| rest.trim().trim_end_matches("FOUND").trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

}
