use crate::{
    error::{Error, Result},
    ingestor::types::{RawLog, RawTransaction},
    models::{AttributionLookback, Balances},
    processor::{
        attribution::EmpAttributions,
        emp::{EmpBalances, EmpEvent},
    },
};
use num_bigint::BigInt;
use num_traits::Signed;
use tracing::debug;

/// State that can be folded into a running sum weighted by a number of blocks
pub trait BlockWeighted: Default {
    fn accumulate(&self, blocks_elapsed: u64, sum: &mut Self) -> Result;
}

impl BlockWeighted for Balances {
    fn accumulate(&self, blocks_elapsed: u64, sum: &mut Self) -> Result {
        sum_balances(self, blocks_elapsed, sum)
    }
}

impl BlockWeighted for AttributionLookback {
    fn accumulate(&self, blocks_elapsed: u64, sum: &mut Self) -> Result {
        sum_attributions(self, blocks_elapsed, sum)
    }
}

/// Adds every balance multiplied by `blocks_elapsed` into `sum`.
///
/// Live ledgers may dip below zero when tokens bought elsewhere are settled after expiry. Those
/// balances weigh as zero.
pub fn sum_balances(balances: &Balances, blocks_elapsed: u64, sum: &mut Balances) -> Result {
    if blocks_elapsed == 0 {
        return Ok(());
    }
    let blocks = BigInt::from(blocks_elapsed);
    for (address, value) in balances.iter() {
        if value.is_negative() {
            continue;
        }
        let current = sum.get(address).cloned().unwrap_or_default();
        sum.set(address, current + value * &blocks)?;
    }
    Ok(())
}

/// Adds every attribution entry multiplied by `blocks_elapsed` into the entry of the same age in
/// `sum`, keeping each entry's affiliate
pub fn sum_attributions(
    attributions: &AttributionLookback,
    blocks_elapsed: u64,
    sum: &mut AttributionLookback,
) -> Result {
    if blocks_elapsed == 0 {
        return Ok(());
    }
    let blocks = BigInt::from(blocks_elapsed);
    for (user, events) in attributions.iter() {
        sum.align_with(user, events);
        for (index, event) in events.iter().enumerate() {
            let current = sum.get_by_index(user, index)?.amount.clone();
            sum.set_by_index(user, index, &event.affiliate, current + &event.amount * &blocks)?;
        }
    }
    Ok(())
}

/// Streaming block integral over `[start_block, end_block)`.
///
/// Call [`observe`](Self::observe) with the live state before applying each event, then
/// [`finalize`](Self::finalize) once the stream is exhausted. Blocks before the window only
/// change live state and blocks past the end are clamped to it.
#[derive(Debug, Clone)]
pub struct BlockWeightedAccumulator<T> {
    start_block: u64,
    end_block: u64,
    last_block: u64,
    previous_event: Option<u64>,
    sum: T,
}

impl<T: BlockWeighted> BlockWeightedAccumulator<T> {
    pub fn new(start_block: u64, end_block: u64) -> Result<Self> {
        Self::with_sum(start_block, end_block, T::default())
    }

    pub fn with_sum(start_block: u64, end_block: u64, sum: T) -> Result<Self> {
        if start_block >= end_block {
            return Err(Error::InvalidWindow {
                start: start_block,
                end: end_block,
            });
        }
        Ok(Self {
            start_block,
            end_block,
            last_block: start_block,
            previous_event: None,
            sum,
        })
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub fn end_block(&self) -> u64 {
        self.end_block
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    /// Weight `live` up to `block_number`. Must be called before the event at that block is
    /// applied.
    pub fn observe(&mut self, block_number: u64, live: &T) -> Result {
        if let Some(previous) = self.previous_event {
            if block_number < previous {
                return Err(Error::OutOfOrder {
                    block: block_number,
                    previous,
                });
            }
        }
        self.previous_event = Some(block_number);

        let target = block_number.min(self.end_block);
        if target > self.last_block {
            live.accumulate(target - self.last_block, &mut self.sum)?;
            self.last_block = target;
        }
        Ok(())
    }

    /// Weight the tail of the window and return the sum
    pub fn finalize(mut self, live: &T) -> Result<T> {
        if self.end_block > self.last_block {
            live.accumulate(self.end_block - self.last_block, &mut self.sum)?;
            self.last_block = self.end_block;
        }
        Ok(self.sum)
    }
}

/// Block weighted token balances of every sponsor over `[start_block, end_block)`
pub fn process_event_stream<'a>(
    start_block: u64,
    end_block: u64,
    events: impl IntoIterator<Item = &'a RawLog>,
) -> Result<Balances> {
    let mut accumulator = BlockWeightedAccumulator::<Balances>::new(start_block, end_block)?;
    let mut balances = EmpBalances::new();
    let mut count = 0usize;
    for log in events {
        let event = EmpEvent::try_from(log)?;
        accumulator.observe(log.block_number, &balances.tokens)?;
        balances.handle_event(&event)?;
        count += 1;
    }
    debug!(
        "Folded {} events over blocks {}..{}",
        count, start_block, end_block
    );
    accumulator.finalize(&balances.tokens)
}

/// Block weighted attributions of every user over `[start_block, end_block)`
pub fn process_attribution_stream<'a>(
    start_block: u64,
    end_block: u64,
    mut attributions: EmpAttributions<AttributionLookback>,
    transactions: impl IntoIterator<Item = &'a RawTransaction>,
) -> Result<AttributionLookback> {
    let mut accumulator =
        BlockWeightedAccumulator::<AttributionLookback>::new(start_block, end_block)?;
    let mut count = 0usize;
    for tx in transactions {
        accumulator.observe(tx.block_number, &attributions.attributions)?;
        attributions.handle_transaction(tx)?;
        count += 1;
    }
    debug!(
        "Folded {} transactions over blocks {}..{}",
        count, start_block, end_block
    );
    accumulator.finalize(&attributions.attributions)
}
