pub mod dataset;
pub mod types;

use crate::error::Result;
use mockall::automock;
use rust_decimal::Decimal;
use types::{Block, RawLog, RawTransaction};

/// Read access to indexed chain data. Time bounds are milliseconds, `[start, end)`.
#[automock]
pub trait Queries: Send + Sync {
    /// Decoded logs emitted by a contract, ordered by block
    fn logs_by_contract(&self, address: &str, start_ms: u64, end_ms: u64) -> Result<Vec<RawLog>>;

    /// Decoded calls made to a contract, including internal calls, ordered by block
    fn traces_by_contract(
        &self,
        address: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<RawTransaction>>;

    /// Blocks in ascending order
    fn blocks(&self, start_ms: u64, end_ms: u64) -> Result<Vec<Block>>;

    /// First block at or after `ms`
    fn start_block(&self, ms: u64) -> Result<Block>;

    /// Last block at or before `ms`
    fn end_block(&self, ms: u64) -> Result<Block>;
}

#[automock]
pub trait PriceFeed: Send + Sync {
    /// `(timestamp_ms, price)` pairs for a token quoted in `currency`
    fn historic_prices(
        &self,
        token: &str,
        currency: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<(u64, Decimal)>>;

    /// `(timestamp_ms, price)` pairs of an emp's synthetic token quoted in its collateral
    fn synthetic_prices(
        &self,
        emp: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<(u64, Decimal)>>;
}
