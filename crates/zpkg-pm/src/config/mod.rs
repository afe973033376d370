//! Configuration management.
//!
//! Values are layered, highest priority last:
//!
//! 1. Built-in defaults
//! 2. Global `config.json` in the platform config directory (or `ZPKG_HOME`)
//! 3. A file passed explicitly (`--config`)
//! 4. Environment variables (`ZPKG_*`)
//!
//! Command-line flags are merged on top by the CLI as [`ConfigSource::Command`].

mod config;
mod source;

pub use config::{Config, InstallOptions, DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_PROVIDER_NAME};
pub use source::{ConfigLoader, ConfigSource, RawConfig};
