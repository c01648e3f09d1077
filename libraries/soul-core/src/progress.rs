//! Progress reporting for long-running analysis

use std::sync::Arc;

/// Progress sink receiving values in `[0.0, 1.0]`
///
/// Called on the analysis worker thread; implementations should only hand the
/// value off (e.g. to a channel) and return.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Owned progress callback for async entry points
pub type ProgressCallback = Arc<ProgressFn>;

/// Report `value` (clamped to `[0.0, 1.0]`) if a sink is present
pub fn report_progress(sink: Option<&ProgressFn>, value: f64) {
    if let Some(sink) = sink {
        sink(value.clamp(0.0, 1.0));
    }
}
