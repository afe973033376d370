//! Status command - report an existing installation without downloading.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;

use zpkg_pm::{Config, PackageDescriptor};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Package manifest (JSON)
    pub manifest: PathBuf,

    /// Root directory the package is installed under
    #[arg(short = 'd', long)]
    pub destination: Option<PathBuf>,
}

pub async fn execute(args: StatusArgs, config: Config) -> Result<i32> {
    let mut descriptor = PackageDescriptor::from_file(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    crate::install::resolve_destination(&mut descriptor, args.destination, &config);

    let installer = crate::build_installer(&config, false, false)?;
    match installer.installed(&descriptor).await? {
        Some(record) => {
            println!(
                "{} {} {} is installed at {}",
                style("Installed:").green(),
                descriptor.name,
                descriptor.version,
                record.installed_path.display()
            );
            println!("{}", record.identity_token);
            Ok(0)
        }
        None => {
            println!("{} {} {} is not installed", style("Missing:").yellow(), descriptor.name, descriptor.version);
            Ok(1)
        }
    }
}
