//! Library-backed archive encoding
//!
//! The [`ArchiveBackend`] seam lets the encoder treat the compression
//! library as an unreliable collaborator: it may hang, or may not support a
//! payload representation.

use crate::archive::ZipEntry;
use crate::config::ArchivePayload;
use crate::ArchiveError;
use async_trait::async_trait;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Compression library collaborator
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Encodes `entries` into a ZIP byte stream using `payload` as the
    /// intermediate representation
    ///
    /// Returns [`ArchiveError::UnsupportedPayload`] when the representation
    /// is not available here.
    async fn encode(
        &self,
        entries: Arc<[ZipEntry]>,
        payload: ArchivePayload,
    ) -> Result<Vec<u8>, ArchiveError>;
}

/// Deflate encoder built on the `zip` crate
///
/// Runs on the blocking pool. `Blob` spools through an anonymous temporary
/// file, `Bytes` writes into memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCrateBackend;

impl ZipCrateBackend {
    fn write_entries<W: Write + Seek>(sink: W, entries: &[ZipEntry]) -> Result<W, ArchiveError> {
        let mut writer = ZipWriter::new(sink);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in entries {
            writer
                .start_file(entry.path.as_str(), options)
                .map_err(|e| ArchiveError::Encode(e.to_string()))?;
            writer.write_all(&entry.data)?;
        }

        writer
            .finish()
            .map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    fn encode_blocking(
        entries: &[ZipEntry],
        payload: ArchivePayload,
    ) -> Result<Vec<u8>, ArchiveError> {
        match payload {
            ArchivePayload::Bytes => {
                let cursor = Self::write_entries(Cursor::new(Vec::new()), entries)?;
                Ok(cursor.into_inner())
            }
            ArchivePayload::Blob => {
                let file = tempfile::tempfile()
                    .map_err(|e| ArchiveError::UnsupportedPayload(format!("blob: {}", e)))?;
                let mut file = Self::write_entries(file, entries)?;
                file.seek(SeekFrom::Start(0))?;
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

#[async_trait]
impl ArchiveBackend for ZipCrateBackend {
    async fn encode(
        &self,
        entries: Arc<[ZipEntry]>,
        payload: ArchivePayload,
    ) -> Result<Vec<u8>, ArchiveError> {
        tokio::task::spawn_blocking(move || Self::encode_blocking(&entries, payload))
            .await
            .map_err(|e| ArchiveError::Encode(format!("encoder task failed: {}", e)))?
    }
}
