use crate::{
    error::{Error, Result},
    ingestor::{
        PriceFeed, Queries,
        types::{Block, RawLog, RawTransaction},
    },
    models::util::normalize_address,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Pre-fetched chain data and prices stored as JSON files:
///
/// ```text
/// <root>/blocks.json
/// <root>/logs/<contract>.json
/// <root>/traces/<contract>.json
/// <root>/prices/<token>.json
/// <root>/synthetic/<emp>.json
/// ```
///
/// File names are lowercased addresses. A contract without a logs or traces file has no activity.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn contract_file(&self, dir: &str, address: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.json", normalize_address(address)))
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        debug!("Reading dataset file {}", path.display());
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        if !path.exists() {
            debug!("Dataset file {} not found, treating as empty", path.display());
            return Ok(T::default());
        }
        Self::read(path)
    }

    fn read_prices(path: &Path, start_ms: u64, end_ms: u64) -> Result<Vec<(u64, Decimal)>> {
        let prices: Vec<(u64, Decimal)> = Self::read(path)?;
        Ok(prices
            .into_iter()
            .filter(|(timestamp, _)| in_window(*timestamp, start_ms, end_ms))
            .collect())
    }

    fn all_blocks(&self) -> Result<Vec<Block>> {
        let mut blocks: Vec<Block> = Self::read(&self.root.join("blocks.json"))?;
        blocks.sort_by_key(|block| block.number);
        Ok(blocks)
    }
}

fn in_window(timestamp: u64, start_ms: u64, end_ms: u64) -> bool {
    timestamp >= start_ms && timestamp < end_ms
}

impl Queries for Dataset {
    fn logs_by_contract(&self, address: &str, start_ms: u64, end_ms: u64) -> Result<Vec<RawLog>> {
        let logs: Vec<RawLog> = Self::read_or_default(&self.contract_file("logs", address))?;
        Ok(logs
            .into_iter()
            .filter(|log| in_window(log.block_timestamp, start_ms, end_ms))
            .collect())
    }

    fn traces_by_contract(
        &self,
        address: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<RawTransaction>> {
        let traces: Vec<RawTransaction> =
            Self::read_or_default(&self.contract_file("traces", address))?;
        Ok(traces
            .into_iter()
            .filter(|tx| in_window(tx.block_timestamp, start_ms, end_ms))
            .collect())
    }

    fn blocks(&self, start_ms: u64, end_ms: u64) -> Result<Vec<Block>> {
        Ok(self
            .all_blocks()?
            .into_iter()
            .filter(|block| in_window(block.timestamp, start_ms, end_ms))
            .collect())
    }

    fn start_block(&self, ms: u64) -> Result<Block> {
        self.all_blocks()?
            .into_iter()
            .find(|block| block.timestamp >= ms)
            .ok_or(Error::NoBlocks {
                start: ms,
                end: u64::MAX,
            })
    }

    fn end_block(&self, ms: u64) -> Result<Block> {
        self.all_blocks()?
            .into_iter()
            .rev()
            .find(|block| block.timestamp <= ms)
            .ok_or(Error::NoBlocks { start: 0, end: ms })
    }
}

impl PriceFeed for Dataset {
    fn historic_prices(
        &self,
        token: &str,
        _currency: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<(u64, Decimal)>> {
        let path = self.contract_file("prices", token);
        if !path.exists() {
            return Err(Error::MissingPrices(normalize_address(token)));
        }
        Self::read_prices(&path, start_ms, end_ms)
    }

    fn synthetic_prices(
        &self,
        emp: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<(u64, Decimal)>> {
        let path = self.contract_file("synthetic", emp);
        if !path.exists() {
            return Err(Error::MissingPrices(normalize_address(emp)));
        }
        Self::read_prices(&path, start_ms, end_ms)
    }
}
