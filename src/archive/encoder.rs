//! Three-tier archive packing
//!
//! 1. The backend with the preferred payload, under a deadline.
//! 2. On an unsupported-payload error (never on a timeout), the backend with
//!    the alternate payload, under the same deadline.
//! 3. The hand-written STORE encoder.
//!
//! Only a failure of the STORE encoder is fatal.

use crate::archive::backend::{ArchiveBackend, ZipCrateBackend};
use crate::archive::store::encode_store;
use crate::archive::ZipEntry;
use crate::config::{ArchivePayload, ExportConfig};
use crate::ArchiveError;
use std::sync::Arc;
use std::time::Duration;

/// Which tier produced an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderTier {
    Primary,
    Secondary,
    Manual,
}

impl std::fmt::Display for EncoderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Manual => write!(f, "manual-store"),
        }
    }
}

/// A finished archive
#[derive(Debug, Clone)]
pub struct PackedArchive {
    pub bytes: Vec<u8>,
    pub tier: EncoderTier,
}

pub struct ArchiveEncoder {
    backend: Arc<dyn ArchiveBackend>,
    deadline: Duration,
    payload: ArchivePayload,
}

impl ArchiveEncoder {
    pub fn new(backend: Arc<dyn ArchiveBackend>, deadline: Duration, payload: ArchivePayload) -> Self {
        Self {
            backend,
            deadline,
            payload,
        }
    }

    /// Default encoder: the `zip` crate backend with configured deadline and payload
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            Arc::new(ZipCrateBackend),
            config.archive_deadline(),
            config.archive_payload,
        )
    }

    async fn attempt(
        &self,
        entries: &Arc<[ZipEntry]>,
        payload: ArchivePayload,
    ) -> Result<Vec<u8>, ArchiveError> {
        match tokio::time::timeout(self.deadline, self.backend.encode(entries.clone(), payload)).await
        {
            Ok(result) => result,
            Err(_) => Err(ArchiveError::Timeout(self.deadline)),
        }
    }

    /// Packs `entries` into a ZIP archive
    pub async fn pack(&self, entries: Vec<ZipEntry>) -> Result<PackedArchive, ArchiveError> {
        let entries: Arc<[ZipEntry]> = Arc::from(entries);

        match self.attempt(&entries, self.payload).await {
            Ok(bytes) => {
                return Ok(PackedArchive {
                    bytes,
                    tier: EncoderTier::Primary,
                })
            }
            Err(ArchiveError::UnsupportedPayload(reason)) => {
                let alternate = self.payload.alternate();
                tracing::warn!(
                    "Archive payload {} unsupported ({}), retrying as {}",
                    self.payload,
                    reason,
                    alternate
                );
                match self.attempt(&entries, alternate).await {
                    Ok(bytes) => {
                        return Ok(PackedArchive {
                            bytes,
                            tier: EncoderTier::Secondary,
                        })
                    }
                    Err(e) => tracing::warn!("Secondary archive tier failed: {}", e),
                }
            }
            Err(e) => tracing::warn!("Primary archive tier failed: {}", e),
        }

        tracing::warn!("Falling back to uncompressed STORE archive");
        let bytes = encode_store(&entries)?;
        Ok(PackedArchive {
            bytes,
            tier: EncoderTier::Manual,
        })
    }
}
