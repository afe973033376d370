//! Install command - place a package into `destination/name/version`.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;

use zpkg_pm::config::RawConfig;
use zpkg_pm::{Config, ConfigSource, EnvironmentScope, PackageDescriptor, PackageIdentity, Severity};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package manifest (JSON)
    pub manifest: PathBuf,

    /// Root directory the package is installed under
    #[arg(short = 'd', long)]
    pub destination: Option<PathBuf>,

    /// Add the installed folder to PATH
    #[arg(long)]
    pub add_to_path: bool,

    /// PATH store to update: all-users or current-user
    #[arg(long)]
    pub scope: Option<EnvironmentScope>,

    /// Install even if the version folder already has files
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Trust the package source without asking
    #[arg(long)]
    pub trust: bool,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// Do not ask any interactive question
    #[arg(short = 'n', long)]
    pub no_interaction: bool,
}

/// Flags given on the command line, as the highest-priority config layer
fn command_layer(args: &InstallArgs) -> RawConfig {
    RawConfig {
        add_to_path: args.add_to_path.then_some(true),
        scope: args.scope,
        trust_all: args.trust.then_some(true),
        ..Default::default()
    }
}

/// Pick the destination: flag, then manifest, then configuration
pub(crate) fn resolve_destination(descriptor: &mut PackageDescriptor, flag: Option<PathBuf>, config: &Config) {
    if let Some(destination) = flag {
        descriptor.destination = destination;
    } else if descriptor.destination_missing() {
        if let Some(destination) = &config.destination {
            descriptor.destination = destination.clone();
        }
    }
}

pub async fn execute(args: InstallArgs, mut config: Config) -> Result<i32> {
    let mut descriptor = PackageDescriptor::from_file(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    resolve_destination(&mut descriptor, args.destination.clone(), &config);

    config.merge(command_layer(&args), ConfigSource::Command);
    let installer = crate::build_installer(&config, !args.no_progress, !args.no_interaction)?;

    if !args.force {
        if let Some(record) = installer.installed(&descriptor).await? {
            println!(
                "{} {} {} is already installed at {}",
                style("Info:").cyan(),
                descriptor.name,
                descriptor.version,
                record.installed_path.display()
            );
            println!("{}", record.identity_token);
            return Ok(0);
        }
    }

    let identity = PackageIdentity::for_descriptor(&descriptor, config.provider_name.clone());
    match installer.install(&descriptor, identity).await {
        Ok(installed) => {
            println!(
                "{} Installed {} {} to {}",
                style("Success:").green(),
                descriptor.name,
                descriptor.version,
                installed.record.installed_path.display()
            );
            crate::print_warnings(&installed.warnings);
            println!("{}", installed.record.identity_token);
            Ok(0)
        }
        Err(e) if e.severity() == Severity::Warning => {
            eprintln!("{} {}", style("Warning:").yellow(), e.diagnostic());
            Ok(1)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to install {}", descriptor.name))),
    }
}
