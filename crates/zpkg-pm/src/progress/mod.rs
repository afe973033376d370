//! Progress reporting and cooperative cancellation.

mod reporter;

pub use reporter::{CleanupGuard, ProgressReporter, ProgressState, ProgressTracker};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle for one progress activity on a [`ProgressChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// Where progress updates are delivered.
pub trait ProgressChannel: Send + Sync {
    fn start(&self, initial: u32, message: &str) -> ProgressId;
    fn report(&self, id: ProgressId, percent: u32, message: &str);
    fn complete(&self, id: ProgressId, success: bool);

    /// The periodic ticker for `id` was released. Called once per activity.
    fn stopped(&self, _id: ProgressId) {}
}

fn next_id(counter: &AtomicU64) -> ProgressId {
    ProgressId(counter.fetch_add(1, Ordering::Relaxed) + 1)
}

/// Discards every update
#[derive(Debug, Default)]
pub struct NullProgress {
    next: AtomicU64,
}

impl ProgressChannel for NullProgress {
    fn start(&self, _initial: u32, _message: &str) -> ProgressId {
        next_id(&self.next)
    }

    fn report(&self, _id: ProgressId, _percent: u32, _message: &str) {}

    fn complete(&self, _id: ProgressId, _success: bool) {}
}

/// Sends updates to the `log` facade
#[derive(Debug, Default)]
pub struct LogProgress {
    next: AtomicU64,
}

impl ProgressChannel for LogProgress {
    fn start(&self, initial: u32, message: &str) -> ProgressId {
        let id = next_id(&self.next);
        log::info!("[{}] {} ({}%)", id.0, message, initial);
        id
    }

    fn report(&self, id: ProgressId, percent: u32, message: &str) {
        log::debug!("[{}] {} ({}%)", id.0, message, percent);
    }

    fn complete(&self, id: ProgressId, success: bool) {
        log::info!("[{}] {}", id.0, if success { "done" } else { "failed" });
    }

    fn stopped(&self, id: ProgressId) {
        log::debug!("[{}] ticker stopped", id.0);
    }
}

/// Set by the host to ask a running install to stop
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
