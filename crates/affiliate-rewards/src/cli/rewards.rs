use crate::cli::{
    common::{OutputOptions, payout_records, print_payouts, read_params},
    traits::Exportable,
};
use affiliate_rewards::{
    calculator::{
        dappmining::{DappMining, DappMiningConfig},
        devmining::{DevMining, DevMiningConfig, total_payout},
    },
    ingestor::dataset::Dataset,
    settings::Settings,
};
use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use tracing::info;

/// Reward calculation commands
#[derive(Subcommand, Debug)]
pub enum RewardsCommands {
    #[command(
        about = "Split a reward pool between EMP deployers by collateral value",
        after_help = r#"Examples:
    # Print rewards as pretty json
    dev-mining --params devmining.json

    # Write a csv of deployer and emp payouts
    dev-mining --params devmining.json -f csv -o out/"#
    )]
    DevMining {
        /// JSON file with the run parameters
        #[arg(short, long, value_name = "FILE")]
        params: PathBuf,

        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(
        about = "Split a reward pool between affiliate tags of a single EMP",
        after_help = r#"Examples:
    # Print rewards as pretty json
    dapp-mining --params dappmining.json

    # Write rewards to a specific file
    dapp-mining --params dappmining.json --output-file rewards.json"#
    )]
    DappMining {
        /// JSON file with the run parameters
        #[arg(short, long, value_name = "FILE")]
        params: PathBuf,

        #[command(flatten)]
        output: OutputOptions,
    },
}

pub fn handle(settings: &Settings, cmd: RewardsCommands) -> Result<()> {
    let dataset = Dataset::new(&settings.dataset.path);
    let defaults = settings.run_defaults()?;

    match cmd {
        RewardsCommands::DevMining { params, output } => {
            let config: DevMiningConfig = read_params(&params)?;
            let rewards = DevMining::new(dataset.clone(), dataset, defaults).get_rewards(&config)?;
            info!(
                "Dev mining paid {} of {} across {} deployers",
                total_payout(&rewards.deployer_payouts)?,
                config.total_rewards,
                rewards.deployer_payouts.len()
            );
            if !output.is_stdout() {
                print_payouts("Dev mining payouts", rewards.rows());
            }
            output.write(&rewards)
        }
        RewardsCommands::DappMining { params, output } => {
            let config: DappMiningConfig = read_params(&params)?;
            let rewards = DappMining::new(dataset, defaults).get_rewards(&config)?;
            if !output.is_stdout() {
                print_payouts("Tag payouts", payout_records("tag", &rewards.rewards));
            }
            output.write(&rewards)
        }
    }
}
