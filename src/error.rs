//! Rich diagnostic error types for switch-topo.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TopoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Anomaly(#[from] crate::anomaly::AnomalyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] crate::export::ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] crate::paths::PathError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(topo::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(topo::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try again with a fresh database file. \
             If the problem persists, file a bug report."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(topo::store::serde),
        help(
            "Failed to serialize or deserialize a stored row. \
             This usually means the database was written by an incompatible version. \
             Re-import the transcripts into a new database."
        )
    )]
    Serialization { message: String },

    #[error("{entity} not found: {key}")]
    #[diagnostic(
        code(topo::store::not_found),
        help("The requested {entity} does not exist. List what is stored with `topo devices`.")
    )]
    NotFound { entity: String, key: String },

    #[error("duplicate {entity}: {key}")]
    #[diagnostic(
        code(topo::store::duplicate),
        help("A {entity} with this key already exists and may not be written twice.")
    )]
    DuplicateKey { entity: String, key: String },
}

// ---------------------------------------------------------------------------
// Transcript errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TranscriptError {
    #[error("transcript too large: \"{origin}\" is {size} bytes, limit is {limit} bytes")]
    #[diagnostic(
        code(topo::transcript::too_large),
        help(
            "Split the capture into smaller files, or raise `max_source_bytes` \
             in the configuration file."
        )
    )]
    SourceTooLarge { origin: String, size: u64, limit: u64 },

    #[error("failed to read transcript \"{path}\"")]
    #[diagnostic(
        code(topo::transcript::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("import of \"{origin}\" rolled back")]
    #[diagnostic(
        code(topo::import::transaction),
        help(
            "A write failed while importing; nothing from this transcript was stored. \
             Fix the underlying storage problem and import again."
        )
    )]
    TransactionFailed {
        origin: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot derive a device name from \"{origin}\"")]
    #[diagnostic(
        code(topo::import::no_device),
        help("Pass the device name explicitly with --device.")
    )]
    NoDeviceName { origin: String },
}

/// Convenience alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convenience alias for transcript reading.
pub type TranscriptResult<T> = std::result::Result<T, TranscriptError>;

/// Convenience alias for the import pipeline.
pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Convenience alias for functions returning switch-topo results.
pub type TopoResult<T> = std::result::Result<T, TopoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_topo_error() {
        let err = StoreError::NotFound {
            entity: "link".into(),
            key: "A GE1 -> B GE2".into(),
        };
        let topo: TopoError = err.into();
        assert!(matches!(topo, TopoError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn transcript_error_converts_through_import() {
        let err = TranscriptError::SourceTooLarge {
            origin: "core.log".into(),
            size: 10,
            limit: 5,
        };
        let import: ImportError = err.into();
        assert!(matches!(
            import,
            ImportError::Transcript(TranscriptError::SourceTooLarge { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = TranscriptError::SourceTooLarge {
            origin: "core.log".into(),
            size: 200,
            limit: 100,
        };
        let msg = format!("{err}");
        assert!(msg.contains("core.log"));
        assert!(msg.contains("200"));
        assert!(msg.contains("100"));
    }
}
