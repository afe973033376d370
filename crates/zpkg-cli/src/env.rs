//! Env command - add or remove PATH entries without installing.

use anyhow::Result;
use clap::Subcommand;
use console::style;

use zpkg_pm::environment::{EnvironmentUpdate, PathChange};
use zpkg_pm::{Config, EnvironmentScope, PathListEnvironment};

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Append an entry to PATH unless it is already listed
    Add {
        entry: String,

        /// PATH store to update: all-users or current-user
        #[arg(long)]
        scope: Option<EnvironmentScope>,
    },

    /// Remove every occurrence of an entry from PATH
    Remove {
        entry: String,

        /// PATH store to update: all-users or current-user
        #[arg(long)]
        scope: Option<EnvironmentScope>,
    },
}

fn report(update: EnvironmentUpdate) -> i32 {
    for warning in &update.warnings {
        eprintln!("{} {}", style("Warning:").yellow(), warning);
    }

    match update.change {
        PathChange::Written(value) => {
            println!("{} PATH is now {}", style("Updated:").green(), value);
            0
        }
        PathChange::Unchanged if update.warnings.is_empty() => {
            println!("{} PATH already up to date", style("Info:").cyan());
            0
        }
        PathChange::Unchanged | PathChange::Disabled => 1,
    }
}

pub fn execute(command: EnvCommand, config: Config) -> Result<i32> {
    let environment = PathListEnvironment::new(config.environment_stores())
        .with_add_to_path(true)
        .with_remove_from_path(true);

    let update = match command {
        EnvCommand::Add { entry, scope } => environment.add(scope.or(config.scope), &entry),
        EnvCommand::Remove { entry, scope } => {
            let scope = scope.or(config.scope).unwrap_or_default();
            environment.remove(&entry, scope, &[scope])
        }
    };

    Ok(report(update))
}
