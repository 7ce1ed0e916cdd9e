mod cli;

use affiliate_rewards::settings::Settings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::rewards::RewardsCommands;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "affiliate-rewards",
    about = "Dev mining and dapp mining reward calculation for EMP affiliates",
    version,
    author,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables with AFFILIATES__ prefix (e.g., AFFILIATES__DATASET__PATH)
    2. .env file in the current directory
    3. Config file with -c option (TOML format)

Examples:
    # Dev mining rewards for a whitelist of EMPs
    affiliate-rewards dev-mining --params devmining.json

    # Dapp mining rewards for one EMP, written as csv
    affiliate-rewards -c config.toml dapp-mining --params dappmining.json -f csv -o out/"#
)]
pub struct Cli {
    /// Path to the configuration file (TOML format)
    ///
    /// If not provided, will attempt to load from environment variables
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Rewards(RewardsCommands),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let settings = if let Some(config_path) = &self.config {
            Settings::from_path(config_path)?
        } else {
            Settings::from_env()?
        };
        init_logging(&settings.log_level)?;
        debug!("Loaded {settings}");

        match self.command {
            Commands::Rewards(cmd) => cli::rewards::handle(&settings, cmd),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}

fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
