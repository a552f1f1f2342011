//! Progress reporting for the upload pipeline.
//!
//! [`ProgressCallback`] decouples the uploader from any rendering backend
//! (`indicatif` bars, log lines, or silence). The uploader reports absolute
//! positions: `set_total` once up front, then `set_position` after each
//! persisted chunk, so any renderer sees a monotonic fraction that never
//! exceeds the total.

use std::sync::Arc;

/// Receiver for progress updates from a long-running operation.
///
/// Implementations must be `Send + Sync` so a single callback can be shared
/// across await points via `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the progress indicator.
    fn finish_and_clear(&self);
}

/// A [`ProgressCallback`] that ignores every update.
///
/// Used by tests and by CLI paths that log instead of drawing bars.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
