//! Error types for the anomaly rule engine.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::StoreError;

/// Errors from anomaly detection.
#[derive(Debug, Error, Diagnostic)]
pub enum AnomalyError {
    #[error("device not found: \"{device}\"")]
    #[diagnostic(
        code(topo::anomaly::device_not_found),
        help("Import a transcript for \"{device}\" first, or list known devices with `topo devices`.")
    )]
    DeviceNotFound { device: String },

    #[error("unknown anomaly policy \"{value}\"")]
    #[diagnostic(
        code(topo::anomaly::policy),
        help("Use `accumulate` to keep history or `replace` to keep only the latest run.")
    )]
    UnknownPolicy { value: String },

    #[error(transparent)]
    #[diagnostic(
        code(topo::anomaly::store),
        help("Reading the graph or writing anomalies failed.")
    )]
    Store(#[from] StoreError),
}

/// Result type for anomaly detection.
pub type AnomalyResult<T> = std::result::Result<T, AnomalyError>;
