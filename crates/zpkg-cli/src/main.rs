mod env;
mod install;
mod status;
mod trust;
mod uninstall;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use zpkg_pm::cli::TerminalProgress;
use zpkg_pm::downloader::SourceDownloader;
use zpkg_pm::progress::LogProgress;
use zpkg_pm::{CancellationFlag, Config, Installer, JsonRegistry, ProgressChannel, Warning};

#[derive(Parser, Debug)]
#[command(name = "zpkg")]
#[command(about = "Install and remove zip-distributed packages")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Additional configuration file (JSON)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a package described by a JSON manifest
    Install(install::InstallArgs),

    /// Remove an installed package by its identity token
    Uninstall(uninstall::UninstallArgs),

    /// Check whether a package is already installed
    Status(status::StatusArgs),

    /// Maintain the PATH variable directly
    #[command(subcommand)]
    Env(env::EnvCommand),
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    env_logger::Builder::from_env(env_logger::Env::new().filter_or("ZPKG_LOG", default))
        .format_timestamp(None)
        .init();
}

/// Installer wired to the configured registry and environment files.
///
/// Must be called from within the runtime: Ctrl-C is routed to the
/// installer's cancellation flag.
pub(crate) fn build_installer(config: &Config, progress: bool, interactive: bool) -> Result<Installer> {
    let cancel = CancellationFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Cancellation requested, stopping after the current step");
            flag.cancel();
        }
    });

    let progress: Arc<dyn ProgressChannel> = if progress {
        Arc::new(TerminalProgress::new(true))
    } else {
        Arc::new(LogProgress::default())
    };

    let http = config.http_client().context("Failed to create HTTP client")?;

    Installer::builder()
        .downloader(Arc::new(SourceDownloader::new(Arc::new(http))))
        .registry(Arc::new(JsonRegistry::new(&config.registry_file)))
        .environment(config.environment_stores())
        .trust(Arc::new(trust::PromptTrust::new(interactive)))
        .progress(progress)
        .options(config.install_options())
        .cancellation(cancel)
        .build()
        .context("Failed to initialise installer")
}

/// Print advisory warnings returned alongside a successful operation
pub(crate) fn print_warnings(warnings: &[Warning]) {
    for line in warning_lines(warnings) {
        eprintln!("{} {}", console::style("Warning:").yellow(), line);
    }
}

fn warning_lines(warnings: &[Warning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::build(args.config.as_deref(), true).context("Failed to load configuration")?;
    for source in config.sources() {
        log::debug!("Configuration source: {}", source.as_str());
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    match args.command {
        Commands::Install(install_args) => rt.block_on(install::execute(install_args, config)),
        Commands::Uninstall(uninstall_args) => rt.block_on(uninstall::execute(uninstall_args, config)),
        Commands::Status(status_args) => rt.block_on(status::execute(status_args, config)),
        Commands::Env(env_command) => env::execute(env_command, config),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
