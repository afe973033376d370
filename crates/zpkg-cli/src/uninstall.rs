//! Uninstall command - remove an installation by identity token.

use anyhow::Result;
use clap::Args;
use console::style;

use zpkg_pm::config::RawConfig;
use zpkg_pm::{Config, ConfigSource};

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Identity token printed by `zpkg install`
    pub token: String,

    /// Remove the installed folder from PATH
    #[arg(long)]
    pub remove_from_path: bool,
}

pub async fn execute(args: UninstallArgs, mut config: Config) -> Result<i32> {
    config.merge(
        RawConfig {
            remove_from_path: args.remove_from_path.then_some(true),
            ..Default::default()
        },
        ConfigSource::Command,
    );

    let installer = crate::build_installer(&config, false, false)?;
    let uninstalled = installer.uninstall(&args.token).await?;

    println!(
        "{} Removed {} {} from {}",
        style("Success:").green(),
        uninstalled.identity.name,
        uninstalled.identity.version,
        uninstalled.identity.installed_path.display()
    );
    crate::print_warnings(&uninstalled.warnings);
    Ok(0)
}
