//! Error types for diagram export.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::StoreError;

/// Errors from the topology exporter.
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("no device to export")]
    #[diagnostic(
        code(topo::export::no_seeds),
        help("Name at least one device, e.g. `topo export Core`.")
    )]
    NoSeeds,

    #[error("device not found: \"{device}\"")]
    #[diagnostic(
        code(topo::export::device_not_found),
        help("The device has neither been imported nor been seen as a neighbor. List known devices with `topo devices`.")
    )]
    DeviceNotFound { device: String },

    #[error("unknown diagram format \"{value}\"")]
    #[diagnostic(
        code(topo::export::format),
        help("Supported formats: mermaid, markdown, dot.")
    )]
    UnknownFormat { value: String },

    #[error("failed to write diagram to \"{path}\"")]
    #[diagnostic(
        code(topo::export::io),
        help("Check that the output directory is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(
        code(topo::export::store),
        help("Reading links from the store failed.")
    )]
    Store(#[from] StoreError),
}

/// Result type for diagram export.
pub type ExportResult<T> = std::result::Result<T, ExportError>;
