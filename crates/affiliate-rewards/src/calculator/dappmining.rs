use crate::{
    calculator::RunDefaults,
    error::{Error, Result},
    ingestor::{Queries, types::Block},
    models::{
        AttributionPercents, Balances,
        util::{from_wei, normalize_address, to_wei, wei},
    },
    processor::{
        accumulator::{process_attribution_stream, process_event_stream},
        attribution::EmpAttributions,
    },
};
use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::Zero;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, iter};
use tracing::{debug, info};

/// Fraction of the reward owed to each whitelisted tag, scaled by 1e18.
///
/// Each user's balance is split between affiliates by the user's attribution percents, and the
/// weighted balances are divided by the balance total only at the end.
pub fn calculate_block_reward<A: AttributionPercents>(
    attributions: &A,
    balances: &Balances,
    whitelist: &[String],
) -> Result<BTreeMap<String, BigInt>> {
    let mut rewards: BTreeMap<String, BigInt> = whitelist
        .iter()
        .map(|tag| (tag.clone(), BigInt::zero()))
        .collect();

    for (user, balance) in balances.iter() {
        let percents = attributions.attribution_percents(user, balance)?;
        for tag in whitelist {
            if let Some(percent) = percents.get(&normalize_address(tag)) {
                if let Some(reward) = rewards.get_mut(tag) {
                    *reward += balance * percent;
                }
            }
        }
    }

    let total = balances.total();
    if total.is_zero() {
        return Ok(rewards
            .into_keys()
            .map(|tag| (tag, BigInt::zero()))
            .collect());
    }
    Ok(rewards
        .into_iter()
        .map(|(tag, weighted)| (tag, weighted / total))
        .collect())
}

/// `amount * percent`, where `percent` is scaled by 1e18, as a decimal string
pub fn calculate_percent(amount: &Decimal, percent: &BigInt) -> String {
    from_wei(&(to_wei(amount) * percent / wei()))
}

/// Reward amount for every tag with a nonzero share
pub fn process_reward_data<A: AttributionPercents>(
    attributions: &A,
    balances: &Balances,
    whitelist: &[String],
    total_rewards: &Decimal,
) -> Result<BTreeMap<String, String>> {
    if *total_rewards <= Decimal::ZERO {
        return Err(Error::InvalidConfig(
            "total rewards must be greater than 0".to_string(),
        ));
    }
    let percentages = calculate_block_reward(attributions, balances, whitelist)?;
    Ok(percentages
        .into_iter()
        .filter(|(_, percent)| !percent.is_zero())
        .map(|(tag, percent)| {
            let amount = calculate_percent(total_rewards, &percent);
            (tag, amount)
        })
        .collect())
}

/// Run parameters for dapp mining of a single emp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DappMiningConfig {
    pub emp_address: String,
    /// Credited for minting that carried no affiliate tag
    pub default_address: String,
    /// Milliseconds
    pub start_time: u64,
    pub end_time: u64,
    pub whitelist: Vec<String>,
    pub total_rewards: Decimal,
    #[serde(default)]
    pub first_emp_date: Option<u64>,
}

impl DappMiningConfig {
    pub fn validate(&self) -> Result {
        if self.emp_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "emp address is required for reward calculation".to_string(),
            ));
        }
        if self.default_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "default address is required for untagged rewards".to_string(),
            ));
        }
        if self.end_time == 0 || self.end_time <= self.start_time {
            return Err(Error::InvalidConfig(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }
        if self.whitelist.is_empty() {
            return Err(Error::InvalidConfig(
                "whitelist of payout addresses is empty".to_string(),
            ));
        }
        if self.total_rewards <= Decimal::ZERO {
            return Err(Error::InvalidConfig(
                "total rewards must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Whitelist plus the default address, deduplicated in order
    pub fn payout_tags(&self) -> Vec<String> {
        self.whitelist
            .iter()
            .chain(iter::once(&self.default_address))
            .map(|tag| normalize_address(tag))
            .unique()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DappMiningRewards {
    pub start_block: Block,
    pub end_block: Block,
    pub rewards: BTreeMap<String, String>,
}

/// Dapp mining over a chain data source
pub struct DappMining<Q> {
    queries: Q,
    defaults: RunDefaults,
}

impl<Q: Queries> DappMining<Q> {
    pub fn new(queries: Q, defaults: RunDefaults) -> Self {
        Self { queries, defaults }
    }

    pub fn get_rewards(&self, config: &DappMiningConfig) -> Result<DappMiningRewards> {
        config.validate()?;
        let first_emp_date = config.first_emp_date.unwrap_or(self.defaults.first_emp_date);
        let emp = config.emp_address.as_str();

        info!(
            "Calculating dapp mining rewards for {} between {} and {}",
            emp, config.start_time, config.end_time
        );

        let start_block = self.queries.start_block(config.start_time)?;
        let end_block = self.queries.end_block(config.end_time)?;
        if start_block.number >= end_block.number {
            return Err(Error::InvalidWindow {
                start: start_block.number,
                end: end_block.number,
            });
        }

        let transactions: Vec<_> = self
            .queries
            .traces_by_contract(emp, first_emp_date, config.end_time)?
            .into_iter()
            .filter(|tx| tx.name == "create" && tx.succeeded())
            .collect();
        let logs = self
            .queries
            .logs_by_contract(emp, first_emp_date, config.end_time)?;
        debug!(
            "Fetched {} create calls and {} logs for {}",
            transactions.len(),
            logs.len(),
            emp
        );

        let (attributions, balances) = rayon::join(
            || {
                process_attribution_stream(
                    start_block.number,
                    end_block.number,
                    EmpAttributions::new(&config.default_address),
                    &transactions,
                )
            },
            || process_event_stream(start_block.number, end_block.number, &logs),
        );
        let attributions = attributions.map_err(|err| err.for_entity(emp, end_block.number))?;
        let balances = balances.map_err(|err| err.for_entity(emp, end_block.number))?;

        let rewards = process_reward_data(
            &attributions,
            &balances,
            &config.payout_tags(),
            &config.total_rewards,
        )
        .map_err(|err| err.for_entity(emp, end_block.number))?;

        info!(
            "Dapp mining rewards calculated for blocks {}..{} across {} tags",
            start_block.number,
            end_block.number,
            rewards.len()
        );
        Ok(DappMiningRewards {
            start_block,
            end_block,
            rewards,
        })
    }
}
