//! Progress bars for install operations.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::progress::{ProgressChannel, ProgressId};

/// Renders each progress activity as an indicatif bar
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<ProgressId, ProgressBar>>,
    next: AtomicU64,
    enabled: bool,
}

impl TerminalProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            next: AtomicU64::new(0),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn create_bar(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(100));
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn with_bar(&self, id: ProgressId, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bar) = bars.get(&id) {
            f(bar);
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProgressChannel for TerminalProgress {
    fn start(&self, initial: u32, message: &str) -> ProgressId {
        let id = ProgressId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let bar = self.create_bar(message);
        bar.set_position(u64::from(initial.min(100)));

        self.bars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, bar);
        id
    }

    fn report(&self, id: ProgressId, percent: u32, _message: &str) {
        self.with_bar(id, |bar| bar.set_position(u64::from(percent.min(100))));
    }

    fn complete(&self, id: ProgressId, success: bool) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id);

        if let Some(bar) = bar {
            if success {
                bar.set_position(100);
                bar.finish_and_clear();
            } else {
                bar.abandon_with_message(style("failed").red().to_string());
            }
        }
    }
}
