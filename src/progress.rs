//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the coordinator works through files.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: hosts can forward
//! events to a status bar, a notification toast, a log pane, or a terminal
//! progress bar without the library knowing anything about how the host
//! communicates. Whether to announce every file or only a batch summary is
//! the consumer's decision — batch runs fire `on_batch_start`/
//! `on_batch_complete` around the per-file events, so a consumer that wants
//! suppressed per-file notifications in batch mode simply ignores the
//! per-file events between the two.

use std::path::Path;

/// Called by the coordinator as it processes files.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Processing is strictly sequential, so no
/// synchronisation is required in implementations.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when processing of a single file begins.
    fn on_file_start(&self, input: &Path) {
        let _ = input;
    }

    /// Called when a file was converted or copied successfully.
    fn on_file_complete(&self, input: &Path, output: &Path) {
        let _ = (input, output);
    }

    /// Called when a file was skipped (internal path, up-to-date output,
    /// ignored extension). `reason` is a short human-readable label.
    fn on_file_skipped(&self, input: &Path, reason: &str) {
        let _ = (input, reason);
    }

    /// Called when processing a file failed.
    fn on_file_error(&self, input: &Path, error: &str) {
        let _ = (input, error);
    }

    /// Called once before a folder batch starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called once after a folder batch finishes.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}
