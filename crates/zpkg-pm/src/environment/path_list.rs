//! Idempotent maintenance of a delimited search-path variable.
//!
//! Failures to read or write a store never abort the surrounding operation;
//! they come back as warnings on the [`EnvironmentUpdate`].

use std::sync::Arc;

use super::store::{EnvironmentScope, EnvironmentStores, KeyValueStore};
use crate::Warning;

/// Variable maintained by default
pub const PATH_KEY: &str = "PATH";

#[cfg(windows)]
pub const DEFAULT_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const DEFAULT_SEPARATOR: char = ':';

/// Characters ignored at the end of a segment when comparing entries
const TRAILING_TRIM: &[char] = &['\\', '/', ' ', '\t'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathChange {
    /// The caller did not request path maintenance
    Disabled,
    /// Nothing needed to be written
    Unchanged,
    /// The new value that was written
    Written(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentUpdate {
    pub change: PathChange,
    pub warnings: Vec<Warning>,
}

impl EnvironmentUpdate {
    fn disabled() -> Self {
        Self { change: PathChange::Disabled, warnings: Vec::new() }
    }

    fn unchanged() -> Self {
        Self { change: PathChange::Unchanged, warnings: Vec::new() }
    }

    fn failed(warning: Warning) -> Self {
        Self { change: PathChange::Unchanged, warnings: vec![warning] }
    }

    pub fn is_written(&self) -> bool {
        matches!(self.change, PathChange::Written(_))
    }
}

fn normalize(segment: &str) -> String {
    segment.trim().trim_end_matches(TRAILING_TRIM).to_lowercase()
}

pub struct PathListEnvironment {
    stores: EnvironmentStores,
    separator: char,
    add_enabled: bool,
    remove_enabled: bool,
}

impl PathListEnvironment {
    pub fn new(stores: EnvironmentStores) -> Self {
        Self {
            stores,
            separator: DEFAULT_SEPARATOR,
            add_enabled: false,
            remove_enabled: false,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_add_to_path(mut self, enabled: bool) -> Self {
        self.add_enabled = enabled;
        self
    }

    pub fn with_remove_from_path(mut self, enabled: bool) -> Self {
        self.remove_enabled = enabled;
        self
    }

    pub fn add_enabled(&self) -> bool {
        self.add_enabled
    }

    pub fn remove_enabled(&self) -> bool {
        self.remove_enabled
    }

    /// Whether `entry` is already one of the segments of `value`
    pub fn contains(&self, value: &str, entry: &str) -> bool {
        let target = normalize(entry);
        value.split(self.separator).any(|segment| normalize(segment) == target)
    }

    /// Append `entry` to the current value unless it is already listed.
    ///
    /// The current value is read from the process environment. The result is
    /// written to the store selected by `scope` (all users by default) and to
    /// the process environment.
    pub fn add(&self, scope: Option<EnvironmentScope>, entry: &str) -> EnvironmentUpdate {
        if !self.add_enabled {
            return EnvironmentUpdate::disabled();
        }

        let scope = scope.unwrap_or_default();
        let entry = entry.trim();

        let current = match self.stores.process.read(PATH_KEY) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                return EnvironmentUpdate::failed(Warning::environment(format!(
                    "Failed to read {} environment variable. {}",
                    PATH_KEY, e
                )))
            }
        };

        if self.contains(&current, entry) {
            log::debug!("Environment variable '{}' already contains '{}'", PATH_KEY, entry);
            return EnvironmentUpdate::unchanged();
        }

        let value = if current.trim().is_empty() {
            entry.to_string()
        } else {
            format!("{}{}{}", current, self.separator, entry)
        };

        log::debug!("Adding '{}' to {} environment variable ({})", entry, PATH_KEY, scope);

        let mut warnings = Vec::new();
        if let Err(warning) = self.write_to(self.stores.scope(scope), &value) {
            // The persisted store is the source of truth; leave the process alone
            return EnvironmentUpdate::failed(warning);
        }
        if let Err(warning) = self.write_to(&self.stores.process, &value) {
            warnings.push(warning);
        }

        EnvironmentUpdate { change: PathChange::Written(value), warnings }
    }

    /// Drop every segment equal to `entry`.
    ///
    /// The value is read from the `source` store, rebuilt without matching
    /// segments, and written to every store in `targets`. The process
    /// environment has the same entry removed from its own value.
    pub fn remove(
        &self,
        entry: &str,
        source: EnvironmentScope,
        targets: &[EnvironmentScope],
    ) -> EnvironmentUpdate {
        if !self.remove_enabled {
            return EnvironmentUpdate::disabled();
        }

        let current = match self.stores.scope(source).read(PATH_KEY) {
            Ok(Some(value)) if !value.trim().is_empty() => value,
            Ok(_) => {
                return EnvironmentUpdate::failed(Warning::environment(format!(
                    "Failed to retrieve {} environment variable from the {} store",
                    PATH_KEY, source
                )))
            }
            Err(e) => {
                return EnvironmentUpdate::failed(Warning::environment(format!(
                    "Failed to read {} environment variable. {}",
                    PATH_KEY, e
                )))
            }
        };

        let rebuilt = self.without(&current, entry);
        if rebuilt == current {
            log::debug!("'{}' is not listed in {} ({})", entry, PATH_KEY, source);
            return EnvironmentUpdate::unchanged();
        }

        log::debug!("Removing '{}' from {} environment variable", entry.trim(), PATH_KEY);

        let mut warnings: Vec<Warning> = targets
            .iter()
            .filter_map(|target| self.write_to(self.stores.scope(*target), &rebuilt).err())
            .collect();

        match self.stores.process.read(PATH_KEY) {
            Ok(Some(process_value)) => {
                let process_rebuilt = self.without(&process_value, entry);
                if process_rebuilt != process_value {
                    if let Err(warning) = self.write_to(&self.stores.process, &process_rebuilt) {
                        warnings.push(warning);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warnings.push(Warning::environment(format!(
                "Failed to read {} environment variable. {}",
                PATH_KEY, e
            ))),
        }

        EnvironmentUpdate { change: PathChange::Written(rebuilt), warnings }
    }

    /// `value` without `entry` or empty segments
    fn without(&self, value: &str, entry: &str) -> String {
        let target = normalize(entry);
        let separator = self.separator.to_string();

        value
            .split(self.separator)
            .filter(|segment| !segment.trim().is_empty() && normalize(segment) != target)
            .collect::<Vec<_>>()
            .join(&separator)
    }

    fn write_to(&self, store: &Arc<dyn KeyValueStore>, value: &str) -> Result<(), Warning> {
        store.write(PATH_KEY, value).map_err(|e| {
            Warning::environment(format!("Failed to update {} environment variable. {}", PATH_KEY, e))
        })
    }
}
