//! Transcript intake: raw bytes → decoded text → command blocks.
//!
//! A transcript is a captured terminal session against one switch. The
//! [`TranscriptSource`] owns the raw bytes (the content hash is computed over
//! them, never over decoded text), [`reader`] decodes them, and [`segment`]
//! cuts the text at device prompts.

pub mod reader;
pub mod segment;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{TranscriptError, TranscriptResult};

pub use reader::{DEFAULT_MAX_BYTES, DecodedText, TextEncoding, decode};
pub use segment::{CommandBlock, split_blocks};

/// Raw transcript bytes plus the identifier they were read from.
#[derive(Debug, Clone)]
pub struct TranscriptSource {
    /// File path or caller-supplied label; recorded in the ledger and on
    /// every neighbor observation.
    pub origin: String,
    pub bytes: Vec<u8>,
}

impl TranscriptSource {
    /// Wrap in-memory bytes.
    pub fn from_bytes(origin: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            origin: origin.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file, refusing anything larger than `max_bytes`.
    ///
    /// The size is checked from metadata before any content is read.
    pub fn read(path: &Path, max_bytes: u64) -> TranscriptResult<Self> {
        let io_err = |source| TranscriptError::Io {
            path: path.display().to_string(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > max_bytes {
            return Err(TranscriptError::SourceTooLarge {
                origin: path.display().to_string(),
                size,
                limit: max_bytes,
            });
        }
        let bytes = std::fs::read(path).map_err(io_err)?;
        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            "read transcript"
        );
        Ok(Self {
            origin: path.display().to_string(),
            bytes,
        })
    }

    /// Fail if the in-memory content exceeds `max_bytes`.
    pub fn check_size(&self, max_bytes: u64) -> TranscriptResult<()> {
        let size = self.bytes.len() as u64;
        if size > max_bytes {
            return Err(TranscriptError::SourceTooLarge {
                origin: self.origin.clone(),
                size,
                limit: max_bytes,
            });
        }
        Ok(())
    }

    /// Hex SHA-256 of the raw bytes.
    pub fn content_hash(&self) -> String {
        content_hash(&self.bytes)
    }

    /// Decode the bytes to text.
    pub fn decode(&self) -> DecodedText<'_> {
        decode(&self.bytes)
    }

    /// Device name implied by the origin (see [`device_name_from_origin`]).
    pub fn device_name(&self) -> Option<String> {
        device_name_from_origin(&self.origin)
    }
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive a device name from a file path or label.
///
/// Captures are conventionally named `{device}_{yyyymmdd_hhmm}.log`: the part
/// of the file stem before the first `_` is the device. A stem without `_` is
/// used whole.
pub fn device_name_from_origin(origin: &str) -> Option<String> {
    let stem = Path::new(origin).file_stem()?.to_str()?;
    let name = stem.split('_').next().unwrap_or(stem).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
