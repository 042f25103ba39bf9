//! Error types for the office2md library.
//!
//! The taxonomy mirrors how failures propagate through the pipeline:
//!
//! * Per-file failures (`NotFound`, `ConversionFailed`, `WriteFailed`) are
//!   caught by the coordinator and folded into that file's
//!   [`crate::coordinator::ConversionResult`] — one bad file never aborts a
//!   batch.
//!
//! * `ExtractionFailed` is non-fatal by contract: the image pipeline degrades
//!   to reference rewriting and the conversion continues. It exists as a
//!   variant so the extractor boundary has a typed error to return.
//!
//! * Cleanup failures during deletion handling are logged with `warn!` and
//!   never surface as an error at all — the source file is already gone, so
//!   there is nothing to roll back.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the office2md library.
#[derive(Debug, Error)]
pub enum Office2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file vanished between discovery and processing.
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    // ── Converter errors ──────────────────────────────────────────────────
    /// Every converter strategy failed or timed out.
    ///
    /// `hint` points at the most likely installation problem: a present but
    /// non-executing embedded binary suggests missing system libraries or an
    /// architecture mismatch; an absent binary suggests a broken install.
    #[error("Conversion failed for '{path}': {last_error}\n{hint}")]
    ConversionFailed {
        path: PathBuf,
        last_error: String,
        hint: String,
    },

    /// A single strategy's subprocess exceeded the wall-clock timeout.
    /// The invoker treats this as that strategy's failure and moves on.
    #[error("Converter timed out after {secs}s for '{path}'")]
    ConverterTimeout { path: PathBuf, secs: u64 },

    // ── Extractor errors ──────────────────────────────────────────────────
    /// Image extraction subprocess failed. Never fatal to a conversion.
    #[error("Image extraction failed for '{path}': {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read a source file for copying.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File metadata could not be read during the staleness check.
    /// Propagated as a task failure, never a silent skip.
    #[error("Failed to read metadata for '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_failed_display_carries_hint() {
        let e = Office2MdError::ConversionFailed {
            path: PathBuf::from("/p/report.docx"),
            last_error: "exit status 1".into(),
            hint: "Check the installation.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.docx"), "got: {msg}");
        assert!(msg.contains("Check the installation."));
    }

    #[test]
    fn timeout_display() {
        let e = Office2MdError::ConverterTimeout {
            path: PathBuf::from("big.pptx"),
            secs: 180,
        };
        assert!(e.to_string().contains("180s"));
    }

    #[test]
    fn write_failed_preserves_source() {
        use std::error::Error;
        let e = Office2MdError::WriteFailed {
            path: PathBuf::from("kb/report.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
    }
}
