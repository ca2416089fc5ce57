//! Typed error model for the scan engine.
//!
//! Error kinds map directly onto the propagation rules described for the
//! engine: configuration and extraction failures are fatal for a scan;
//! per-file and per-layer failures are logged by the caller and never
//! constructed as a fatal [`ScanError`].

use std::path::PathBuf;

/// Errors that can abort a scan (or startup, for catalog loading).
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A rule file failed to parse, or a rule's regex failed to compile.
    #[error("configuration error in {path}: {message}")]
    Configuration { path: PathBuf, message: String },

    /// The scan request itself was malformed (e.g. a relative local path).
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    /// Materializing or untarring an image failed; the whole scan is aborted.
    #[error("image extraction failed: {0}")]
    Extraction(String),

    /// The manifest inside an image tarball was missing or did not contain
    /// exactly one entry.
    #[error("image manifest error: {0}")]
    Manifest(String),

    /// A scan with this `scan_id` is already registered.
    #[error("scan '{0}' is already running")]
    DuplicateScan(String),

    /// Generic I/O failure that prevents the scan from starting at all
    /// (e.g. the temp workspace could not be created).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScanResult<T> = Result<T, ScanError>;
