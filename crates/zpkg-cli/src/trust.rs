use console::style;
use dialoguer::Confirm;

use zpkg_pm::TrustPrompt;

/// Asks on the terminal before installing from an untrusted source
pub struct PromptTrust {
    interactive: bool,
}

impl PromptTrust {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

impl TrustPrompt for PromptTrust {
    fn confirm(&self, name: &str, source: &str) -> bool {
        if !self.interactive || !console::user_attended() {
            log::info!("Not asking about untrusted source {} in non-interactive mode", source);
            return false;
        }

        Confirm::new()
            .with_prompt(format!(
                "{} is installed from the untrusted source {}. Continue?",
                style(name).bold(),
                source
            ))
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
