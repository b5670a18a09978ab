//! ZIP archive assembly
//!
//! Entries are packed by [`ArchiveEncoder`], which falls back from the
//! `zip` crate to a hand-written STORE writer when the library hangs or
//! cannot produce the requested payload.

mod backend;
mod encoder;
mod store;

pub use backend::{ArchiveBackend, ZipCrateBackend};
pub use encoder::{ArchiveEncoder, EncoderTier, PackedArchive};
pub use store::{crc32, encode_store};

/// One file inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Forward-slash path inside the archive
    pub path: String,
    pub data: Vec<u8>,
}

impl ZipEntry {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// A UTF-8 text entry
    pub fn text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(path, text.into().into_bytes())
    }
}
