use anyhow::Context;
use checkin::config::Config;
use checkin::error::ConfigError;
use checkin::notify::NotificationManager;
use checkin::report::RunReport;
use checkin::runner::CheckinRunner;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// Command-line arguments for the daily check-in run
#[derive(Parser)]
#[command(
    name = "checkin",
    about = "Daily cloud storage check-in, lottery draws and capacity report",
    long_about = "Signs every configured account in to the cloud storage service, \
                  draws the daily lotteries, signs in to family spaces and pushes \
                  a capacity report to the configured webhooks."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Run against an in-process mock service
    #[arg(long, help = "Use a mock storage service and send no notifications")]
    dry_run: bool,

    /// Skip webhook delivery
    #[arg(long, help = "Print the report without pushing it to webhooks")]
    no_notify: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// Missing files are allowed here; `load_config` warns and falls back
    /// to defaults plus environment overrides.
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn should_notify(&self) -> bool {
        !self.dry_run && !self.no_notify
    }
}

/// Load the file (if any), apply environment overrides, then validate
///
/// A missing or unreadable file falls back to defaults. A file that exists
/// but does not parse is an error.
fn load_config<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match std::fs::read_to_string(path) {
                Ok(contents) => Config::parse_unvalidated(&contents)?,
                Err(e) => {
                    warn!(
                        "Configuration file '{}' not readable ({}), using defaults",
                        path.display(),
                        e
                    );
                    Config::default()
                }
            }
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    config.apply_env_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}

async fn deliver(config: &Config, report: &RunReport) -> anyhow::Result<()> {
    let manager = NotificationManager::from_config(&config.notify)
        .context("failed to build webhook notifiers")?;

    let summary = manager.dispatch(&report.title(), &report.render()).await;
    if !summary.failed.is_empty() {
        warn!("Delivery failed for: {}", summary.failed.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting daily check-in");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match load_config(cli.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let runner = if cli.dry_run {
        info!("Dry run: using the mock storage service");
        CheckinRunner::dry_run(config.tasks.clone())
    } else {
        CheckinRunner::http(config.tasks.clone())
    };

    let report = runner.run(&config.accounts).await;

    println!("{}", report.title());
    println!();
    println!("{}", report.render());

    if cli.should_notify() {
        if let Err(e) = deliver(&config, &report).await {
            error!("{:#}", e);
        }
    } else {
        info!("Notifications disabled for this run");
    }

    if report.all_failed() {
        error!("Every account failed to log in");
        std::process::exit(1);
    }

    info!("Check-in complete");
}
