//! Confirmation before installing from an untrusted source.

/// Asks whether a package from `source` may be installed.
///
/// Declining is an ordinary answer, not an error.
pub trait TrustPrompt: Send + Sync {
    fn confirm(&self, name: &str, source: &str) -> bool;
}

/// Accepts every source
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysTrust;

impl TrustPrompt for AlwaysTrust {
    fn confirm(&self, _name: &str, _source: &str) -> bool {
        true
    }
}

/// Declines every source; used when no one can be asked
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverTrust;

impl TrustPrompt for NeverTrust {
    fn confirm(&self, name: &str, source: &str) -> bool {
        log::debug!("Declining untrusted source {} for {}", source, name);
        false
    }
}
