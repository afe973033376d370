//! Periodic progress ticker for long-running extract/copy work.
//!
//! The ticker runs as a tokio task. It never blocks the install itself and
//! communicates with it only through the [`CleanupGuard`] and the shared
//! [`ProgressState`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::{CancellationFlag, ProgressChannel, ProgressId};

/// Fraction of the activity added on every tick
const TICK_INCREMENT: f64 = 0.025;

/// Ticks never report at or above this; the rest is reserved for completion
const COMPLETION_RESERVE: f64 = 90.0;

const TICK_MESSAGE: &str = "Copying files ...";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Maps a 0..1 fraction onto a slice of the overall progress bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTracker {
    pub start_percent: f64,
    pub end_percent: f64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self { start_percent: 0.0, end_percent: 100.0 }
    }
}

impl ProgressTracker {
    pub fn convert_percent_to_progress(&self, fraction: f64) -> f64 {
        let progress = self.start_percent + (self.end_percent - self.start_percent) * fraction;
        progress.clamp(self.start_percent, self.end_percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub id: ProgressId,
    /// Always within 0..=100
    pub percent_done: f64,
    pub canceled: bool,
}

type ReleaseAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct GuardState {
    done: bool,
    release: Option<ReleaseAction>,
}

/// One-shot release of a background resource.
///
/// However many paths call [`CleanupGuard::release`], the armed action runs at
/// most once. A panic inside the action is contained and logged.
#[derive(Default)]
pub struct CleanupGuard {
    state: Mutex<GuardState>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the action to run on release.
    ///
    /// If the guard was already released, the action runs immediately.
    pub fn arm(&self, release: impl FnOnce() + Send + 'static) {
        let mut state = lock(&self.state);
        if state.done {
            run_best_effort(Box::new(release));
        } else {
            state.release = Some(Box::new(release));
        }
    }

    /// Returns true only for the call that performed the release
    pub fn release(&self) -> bool {
        let mut state = lock(&self.state);
        if state.done {
            return false;
        }

        state.done = true;
        if let Some(release) = state.release.take() {
            run_best_effort(release);
        }
        true
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).done
    }

    /// Run `f` while holding the guard, unless it has been released
    fn while_active(&self, f: impl FnOnce()) -> bool {
        let state = lock(&self.state);
        if state.done {
            return false;
        }
        f();
        drop(state);
        true
    }
}

fn run_best_effort(release: ReleaseAction) {
    if panic::catch_unwind(AssertUnwindSafe(release)).is_err() {
        log::debug!("Progress timer release panicked; ignoring");
    }
}

/// Drives a periodic progress update for one install.
pub struct ProgressReporter {
    id: ProgressId,
    channel: Arc<dyn ProgressChannel>,
    guard: Arc<CleanupGuard>,
    state: Arc<Mutex<ProgressState>>,
    completed: AtomicBool,
}

impl ProgressReporter {
    /// Start reporting on `channel`; must be called from within a tokio runtime
    pub fn start(
        channel: Arc<dyn ProgressChannel>,
        cancel: CancellationFlag,
        interval: Duration,
        message: &str,
    ) -> Self {
        let id = channel.start(0, message);
        let guard = Arc::new(CleanupGuard::new());
        let state = Arc::new(Mutex::new(ProgressState {
            id,
            percent_done: 0.0,
            canceled: false,
        }));

        let task = tokio::spawn(tick_loop(
            channel.clone(),
            cancel,
            guard.clone(),
            state.clone(),
            interval,
        ));
        let stopped = channel.clone();
        guard.arm(move || {
            task.abort();
            stopped.stopped(id);
        });

        Self {
            id,
            channel,
            guard,
            state,
            completed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ProgressId {
        self.id
    }

    pub fn state(&self) -> ProgressState {
        *lock(&self.state)
    }

    pub fn is_stopped(&self) -> bool {
        self.guard.is_released()
    }

    /// Stop ticking. Safe to call any number of times, from any path.
    pub fn stop(&self) -> bool {
        self.guard.release()
    }

    /// Stop ticking and report completion, once
    pub fn complete(&self, success: bool) {
        self.stop();
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }

        if success {
            lock(&self.state).percent_done = 100.0;
        }
        self.channel.complete(self.id, success);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop(
    channel: Arc<dyn ProgressChannel>,
    cancel: CancellationFlag,
    guard: Arc<CleanupGuard>,
    state: Arc<Mutex<ProgressState>>,
    interval: Duration,
) {
    let tracker = ProgressTracker::default();
    let mut fraction = 0.0;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        fraction += TICK_INCREMENT;
        let progress = tracker.convert_percent_to_progress(fraction);

        let active = guard.while_active(|| {
            let mut current = lock(&state);
            if progress < COMPLETION_RESERVE {
                current.percent_done = progress;
                channel.report(current.id, progress as u32, TICK_MESSAGE);
            }
        });
        if !active {
            break;
        }

        if cancel.is_canceled() {
            log::debug!("Cancellation requested, stopping progress updates");
            lock(&state).canceled = true;
            guard.release();
            break;
        }
    }
}
