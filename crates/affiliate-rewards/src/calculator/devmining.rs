use crate::{
    calculator::RunDefaults,
    error::{Error, Result},
    ingestor::{PriceFeed, Queries, types::Block},
    models::{
        Prices,
        util::{from_wei, normalize_address, ten_pow, to_wei, wei},
    },
    processor::emp::EmpBalancesHistory,
};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Collateral value normalized to 18 decimals: `amount * price_wei / 10^decimals`
pub fn calculate_value(amount: &BigInt, price: &Decimal, decimals: u32) -> BigInt {
    amount * to_wei(price) / ten_pow(decimals)
}

/// Synthetic token value normalized to 18 decimals, with the synthetic priced in collateral:
/// `tokens * synthetic_price_wei * collateral_price_wei / (10^decimals * 1e18)`
pub fn calculate_synthetic_value(
    tokens: &BigInt,
    collateral_price: &Decimal,
    synthetic_price: &Decimal,
    synthetic_decimals: u32,
) -> BigInt {
    tokens * to_wei(synthetic_price) * to_wei(collateral_price) / (ten_pow(synthetic_decimals) * wei())
}

/// How the value locked in an emp is measured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Valuation {
    /// Collateral balances priced in the run currency
    Collateral,
    /// Outstanding synthetic tokens priced in collateral, then collateral in the run currency
    SyntheticInCollateral { prices: Prices, decimals: u32 },
    /// Outstanding synthetic tokens priced directly in the run currency
    SyntheticInCurrency { prices: Prices, decimals: u32 },
}

/// Run parameters for a dev mining distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevMiningConfig {
    pub total_rewards: Decimal,
    /// Milliseconds
    pub start_time: u64,
    pub end_time: u64,
    /// `[emp, payout]` pairs
    pub emp_whitelist: Vec<(String, String)>,
    /// Collateral token of each whitelisted emp, in whitelist order
    pub collateral_tokens: Vec<String>,
    pub collateral_token_decimals: Vec<u32>,
    #[serde(default)]
    pub snapshot_steps: Option<u64>,
    #[serde(default)]
    pub first_emp_date: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Synthetic token of each whitelisted emp. When present, emps are valued by their
    /// outstanding synthetic tokens instead of their locked collateral.
    #[serde(default)]
    pub synthetic_tokens: Vec<String>,
    #[serde(default)]
    pub synthetic_token_decimals: Vec<u32>,
    /// `[emp, price]` pairs used when an emp's synthetic price feed is unavailable
    #[serde(default)]
    pub fallback_prices: Vec<(String, Decimal)>,
}

impl DevMiningConfig {
    pub fn validate(&self) -> Result {
        if self.emp_whitelist.is_empty() {
            return Err(Error::InvalidConfig("emp whitelist is empty".to_string()));
        }
        for (emp, payout) in &self.emp_whitelist {
            if emp.trim().is_empty() || payout.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "each whitelisted emp must be an [emp, payout] pair of addresses".to_string(),
                ));
            }
        }
        if self.collateral_tokens.len() != self.emp_whitelist.len() {
            return Err(Error::InvalidConfig(format!(
                "expected {} collateral tokens, got {}",
                self.emp_whitelist.len(),
                self.collateral_tokens.len()
            )));
        }
        if self.collateral_token_decimals.len() != self.emp_whitelist.len() {
            return Err(Error::InvalidConfig(format!(
                "expected {} collateral token decimals, got {}",
                self.emp_whitelist.len(),
                self.collateral_token_decimals.len()
            )));
        }
        if self.end_time <= self.start_time {
            return Err(Error::InvalidConfig(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }
        if self.total_rewards <= Decimal::ZERO {
            return Err(Error::InvalidConfig(
                "total rewards must be greater than 0".to_string(),
            ));
        }
        if self.snapshot_steps == Some(0) {
            return Err(Error::InvalidConfig(
                "snapshot steps must be greater than 0".to_string(),
            ));
        }
        if self.values_synthetics()
            && (self.synthetic_tokens.len() != self.emp_whitelist.len()
                || self.synthetic_token_decimals.len() != self.emp_whitelist.len())
        {
            return Err(Error::InvalidConfig(format!(
                "expected {} synthetic tokens and decimals, got {} and {}",
                self.emp_whitelist.len(),
                self.synthetic_tokens.len(),
                self.synthetic_token_decimals.len()
            )));
        }
        if let Some((emp, _)) = self
            .fallback_prices
            .iter()
            .find(|(_, price)| *price <= Decimal::ZERO)
        {
            return Err(Error::InvalidConfig(format!(
                "fallback price for {emp} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// True when emps are valued by synthetic tokens rather than collateral
    pub fn values_synthetics(&self) -> bool {
        !self.synthetic_tokens.is_empty()
    }

    fn fallback_price(&self, emp: &str) -> Option<Decimal> {
        let emp = normalize_address(emp);
        self.fallback_prices
            .iter()
            .find(|(address, _)| normalize_address(address) == emp)
            .map(|(_, price)| *price)
    }
}

/// Everything `calculate_rewards` needs, already fetched
#[derive(Debug, Clone)]
pub struct DevMiningInputs {
    pub emp_whitelist: Vec<(String, String)>,
    pub snapshot_steps: u64,
    pub total_rewards: Decimal,
    pub collateral_token_prices: Vec<Prices>,
    pub collateral_token_decimals: Vec<u32>,
    /// One per whitelisted emp
    pub valuations: Vec<Valuation>,
    pub blocks: Vec<Block>,
    pub balance_histories: BTreeMap<String, EmpBalancesHistory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevMiningRewards {
    pub start_block: Block,
    pub end_block: Block,
    pub emp_to_deployer: BTreeMap<String, String>,
    pub deployer_payouts: BTreeMap<String, String>,
    pub emp_payouts: BTreeMap<String, String>,
}

fn emp_value(inputs: &DevMiningInputs, index: usize, emp: &str, block: &Block) -> Result<BigInt> {
    let history = inputs
        .balance_histories
        .get(emp)
        .ok_or_else(|| Error::MissingHistory(emp.to_string()))?;

    let snapshot = match history.history.lookup(block.number) {
        Ok(snapshot) => snapshot,
        // nothing locked before the first event
        Err(err) if err.is_missing_history() => return Ok(BigInt::zero()),
        Err(err) => return Err(err.for_entity(emp, block.number)),
    };
    if snapshot.payload.is_expired {
        return Ok(BigInt::zero());
    }

    let closest = |prices: &Prices| {
        prices
            .closest(block.timestamp)
            .map(|point| point.price)
            .map_err(|err| err.for_entity(emp, block.number))
    };
    let collateral_price = || {
        inputs
            .collateral_token_prices
            .get(index)
            .ok_or_else(|| Error::MissingPrices(emp.to_string()))
            .and_then(|prices| closest(prices))
    };

    let valuation = inputs
        .valuations
        .get(index)
        .ok_or_else(|| Error::MissingPrices(emp.to_string()))?;
    let value = match valuation {
        Valuation::Collateral => {
            let decimals = inputs
                .collateral_token_decimals
                .get(index)
                .ok_or_else(|| Error::MissingDecimals(emp.to_string()))?;
            calculate_value(
                &snapshot.payload.total_collateral(),
                &collateral_price()?,
                *decimals,
            )
        }
        Valuation::SyntheticInCollateral { prices, decimals } => calculate_synthetic_value(
            &snapshot.payload.total_tokens(),
            &collateral_price()?,
            &closest(prices)?,
            *decimals,
        ),
        Valuation::SyntheticInCurrency { prices, decimals } => {
            calculate_value(&snapshot.payload.total_tokens(), &closest(prices)?, *decimals)
        }
    };

    // a ledger settled below zero locks nothing
    if value.is_negative() {
        return Ok(BigInt::zero());
    }
    Ok(value)
}

/// Splits the reward pool between whitelisted emps in proportion to the value of their locked
/// collateral at every sampled block
pub fn calculate_rewards(inputs: &DevMiningInputs) -> Result<DevMiningRewards> {
    if inputs.snapshot_steps == 0 {
        return Err(Error::InvalidConfig(
            "snapshot steps must be greater than 0".to_string(),
        ));
    }
    let Some(first) = inputs.blocks.first() else {
        return Err(Error::InvalidConfig("no blocks to sample".to_string()));
    };

    let steps = usize::try_from(inputs.snapshot_steps)
        .map_err(|_| Error::InvalidConfig("snapshot steps too large".to_string()))?;
    let samples: Vec<&Block> = inputs.blocks.iter().step_by(steps).collect();
    let start_block = *first;
    let end_block = samples.last().copied().copied().unwrap_or(start_block);

    let rewards_per_block = to_wei(&inputs.total_rewards) / BigInt::from(inputs.blocks.len());
    let payout_per_snapshot = &rewards_per_block * BigInt::from(inputs.snapshot_steps);
    debug!(
        "Sampling {} of {} blocks, {} wei per snapshot",
        samples.len(),
        inputs.blocks.len(),
        payout_per_snapshot
    );

    let values_per_sample: Vec<Vec<BigInt>> = samples
        .par_iter()
        .map(|block| {
            inputs
                .emp_whitelist
                .iter()
                .enumerate()
                .map(|(index, (emp, _))| emp_value(inputs, index, emp, block))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let scale = wei();
    let mut emp_to_deployer = BTreeMap::new();
    let mut deployer_payouts: BTreeMap<String, BigInt> = BTreeMap::new();
    let mut emp_payouts: BTreeMap<String, BigInt> = BTreeMap::new();

    for values in &values_per_sample {
        let total_value_locked: BigInt = values.iter().sum();
        for ((emp, payout), value) in inputs.emp_whitelist.iter().zip(values) {
            let contribution = if total_value_locked.is_zero() {
                BigInt::zero()
            } else {
                value * &scale / &total_value_locked
            };
            let reward = contribution * &payout_per_snapshot / &scale;

            emp_to_deployer.insert(emp.clone(), payout.clone());
            *deployer_payouts.entry(payout.clone()).or_default() += &reward;
            *emp_payouts.entry(emp.clone()).or_default() += reward;
        }
    }

    let to_strings = |payouts: BTreeMap<String, BigInt>| -> BTreeMap<String, String> {
        payouts
            .into_iter()
            .map(|(address, amount)| (address, from_wei(&amount)))
            .collect()
    };

    Ok(DevMiningRewards {
        start_block,
        end_block,
        emp_to_deployer,
        deployer_payouts: to_strings(deployer_payouts),
        emp_payouts: to_strings(emp_payouts),
    })
}

/// Dev mining over a chain data source and a price feed
pub struct DevMining<Q, P> {
    queries: Q,
    price_feed: P,
    defaults: RunDefaults,
}

impl<Q: Queries, P: PriceFeed> DevMining<Q, P> {
    pub fn new(queries: Q, price_feed: P, defaults: RunDefaults) -> Self {
        Self {
            queries,
            price_feed,
            defaults,
        }
    }

    /// Replays every log of an emp from `start` to `end`
    pub fn balance_history(&self, emp: &str, start: u64, end: u64) -> Result<EmpBalancesHistory> {
        let logs = self.queries.logs_by_contract(emp, start, end)?;
        let mut history = EmpBalancesHistory::new();
        for log in &logs {
            history
                .handle_event(log)
                .map_err(|err| err.for_entity(emp, log.block_number))?;
        }
        history.finalize();
        debug!(
            "Built balance history for {} from {} logs ({} snapshots)",
            emp,
            logs.len(),
            history.history.len()
        );
        Ok(history)
    }

    pub fn collateral_prices(
        &self,
        token: &str,
        currency: &str,
        start: u64,
        end: u64,
    ) -> Result<Prices> {
        let prices = self
            .price_feed
            .historic_prices(token, currency, start, end)?;
        if prices.is_empty() {
            return Err(Error::MissingPrices(token.to_string()));
        }
        Ok(Prices::new(prices))
    }

    /// Prices an emp's synthetic token in its collateral when the synthetic feed has data.
    /// Otherwise falls back to a fixed price, then to the token's own price in `currency`.
    pub fn synthetic_valuation(
        &self,
        config: &DevMiningConfig,
        emp: &str,
        synthetic_token: &str,
        decimals: u32,
        currency: &str,
    ) -> Result<Valuation> {
        let (start, end) = (config.start_time, config.end_time);
        match self.price_feed.synthetic_prices(emp, start, end) {
            Ok(prices) if !prices.is_empty() => {
                return Ok(Valuation::SyntheticInCollateral {
                    prices: Prices::new(prices),
                    decimals,
                });
            }
            Ok(_) => warn!("Synthetic price feed for {} is empty", emp),
            Err(err) => warn!("Synthetic price feed for {} failed: {}", emp, err),
        }

        if let Some(price) = config.fallback_price(emp) {
            warn!("Using fallback price {} for {}", price, emp);
            return Ok(Valuation::SyntheticInCurrency {
                prices: Prices::new([(0u64, price)]),
                decimals,
            });
        }

        let prices = self
            .collateral_prices(synthetic_token, currency, start, end)
            .map_err(|err| err.for_entity(emp, 0))?;
        Ok(Valuation::SyntheticInCurrency { prices, decimals })
    }

    fn valuations(&self, config: &DevMiningConfig, currency: &str) -> Result<Vec<Valuation>> {
        if !config.values_synthetics() {
            return Ok(vec![Valuation::Collateral; config.emp_whitelist.len()]);
        }
        config
            .emp_whitelist
            .par_iter()
            .zip(config.synthetic_tokens.par_iter())
            .zip(config.synthetic_token_decimals.par_iter())
            .map(|(((emp, _), token), decimals)| {
                self.synthetic_valuation(config, emp, token, *decimals, currency)
            })
            .collect()
    }

    pub fn get_rewards(&self, config: &DevMiningConfig) -> Result<DevMiningRewards> {
        config.validate()?;
        let first_emp_date = config.first_emp_date.unwrap_or(self.defaults.first_emp_date);
        let snapshot_steps = config
            .snapshot_steps
            .unwrap_or(self.defaults.snapshot_steps);
        let currency = config
            .currency
            .as_deref()
            .unwrap_or(&self.defaults.currency);

        info!(
            "Calculating dev mining rewards for {} emps between {} and {}",
            config.emp_whitelist.len(),
            config.start_time,
            config.end_time
        );

        let ((prices, blocks), (histories, valuations)) = rayon::join(
            || {
                rayon::join(
                    || {
                        config
                            .collateral_tokens
                            .par_iter()
                            .map(|token| {
                                self.collateral_prices(
                                    token,
                                    currency,
                                    config.start_time,
                                    config.end_time,
                                )
                            })
                            .collect::<Result<Vec<_>>>()
                    },
                    || self.queries.blocks(config.start_time, config.end_time),
                )
            },
            || {
                rayon::join(
                    || {
                        config
                            .emp_whitelist
                            .par_iter()
                            .map(|(emp, _)| {
                                self.balance_history(emp, first_emp_date, config.end_time)
                                    .map(|history| (emp.clone(), history))
                            })
                            .collect::<Result<BTreeMap<_, _>>>()
                    },
                    || self.valuations(config, currency),
                )
            },
        );
        let blocks = blocks?;
        if blocks.is_empty() {
            return Err(Error::NoBlocks {
                start: config.start_time,
                end: config.end_time,
            });
        }

        let inputs = DevMiningInputs {
            emp_whitelist: config.emp_whitelist.clone(),
            snapshot_steps,
            total_rewards: config.total_rewards,
            collateral_token_prices: prices?,
            collateral_token_decimals: config.collateral_token_decimals.clone(),
            valuations: valuations?,
            blocks,
            balance_histories: histories?,
        };
        let rewards = calculate_rewards(&inputs)?;

        info!(
            "Dev mining rewards calculated for blocks {}..={} across {} deployers",
            rewards.start_block.number,
            rewards.end_block.number,
            rewards.deployer_payouts.len()
        );
        Ok(rewards)
    }
}

/// Sum of decimal payout strings, for reporting
pub fn total_payout(payouts: &BTreeMap<String, String>) -> Result<Decimal> {
    payouts.values().try_fold(Decimal::ZERO, |total, amount| {
        let amount: Decimal = amount
            .parse()
            .map_err(|_| Error::InvalidAmount(amount.clone()))?;
        if amount.is_sign_negative() {
            return Err(Error::InvalidAmount(amount.to_string()));
        }
        Ok(total + amount)
    })
}
