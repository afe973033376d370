//! Terminal front-ends for library interfaces.

mod progress;

pub use progress::TerminalProgress;
