#![allow(dead_code)]

use affiliate_rewards::{
    ingestor::{
        MockPriceFeed, MockQueries,
        types::{Block, RawLog, RawTransaction},
    },
    models::util::normalize_address,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;

/// Blocks `0..count` with timestamps equal to their numbers
pub fn blocks(count: u64) -> Vec<Block> {
    (0..count)
        .map(|number| Block {
            number,
            timestamp: number,
        })
        .collect()
}

pub fn log(block: u64, name: &str, args: &[&str]) -> RawLog {
    RawLog::new(block, name, args.iter().map(|arg| json!(arg)).collect())
}

pub fn position_created(block: u64, sponsor: &str, collateral: u64, tokens: u64) -> RawLog {
    RawLog::new(
        block,
        "PositionCreated",
        vec![json!(sponsor), json!(collateral), json!(tokens)],
    )
}

pub fn create(
    block: u64,
    user: &str,
    collateral: u64,
    tokens: u64,
    tag: Option<&str>,
) -> RawTransaction {
    RawTransaction::new(
        block,
        user,
        "create",
        vec![json!({ "rawValue": collateral.to_string() }), json!(tokens)],
        tag,
    )
}

/// Queries mock serving a fixed chain
#[derive(Default)]
pub struct Chain {
    pub blocks: Vec<Block>,
    pub logs: BTreeMap<String, Vec<RawLog>>,
    pub traces: BTreeMap<String, Vec<RawTransaction>>,
}

impl Chain {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    pub fn with_logs(mut self, contract: &str, logs: Vec<RawLog>) -> Self {
        self.logs.insert(normalize_address(contract), logs);
        self
    }

    pub fn with_traces(mut self, contract: &str, traces: Vec<RawTransaction>) -> Self {
        self.traces.insert(normalize_address(contract), traces);
        self
    }

    pub fn into_mock(self) -> MockQueries {
        let mut mock = MockQueries::new();

        let logs = self.logs;
        mock.expect_logs_by_contract()
            .returning(move |address, _, _| {
                Ok(logs.get(&normalize_address(address)).cloned().unwrap_or_default())
            });

        let traces = self.traces;
        mock.expect_traces_by_contract()
            .returning(move |address, _, _| {
                Ok(traces
                    .get(&normalize_address(address))
                    .cloned()
                    .unwrap_or_default())
            });

        let blocks = self.blocks;
        let window = blocks.clone();
        mock.expect_blocks().returning(move |start, end| {
            Ok(window
                .iter()
                .filter(|block| block.timestamp >= start && block.timestamp < end)
                .copied()
                .collect())
        });

        let first = blocks.clone();
        mock.expect_start_block().returning(move |ms| {
            first
                .iter()
                .find(|block| block.timestamp >= ms)
                .copied()
                .ok_or(affiliate_rewards::Error::NoBlocks { start: ms, end: ms })
        });

        let last = blocks;
        mock.expect_end_block().returning(move |ms| {
            last.iter()
                .rev()
                .find(|block| block.timestamp <= ms)
                .copied()
                .ok_or(affiliate_rewards::Error::NoBlocks { start: ms, end: ms })
        });

        mock
    }
}

/// Price feed quoting every token at a flat price from timestamp 0
pub fn flat_prices(price: Decimal) -> MockPriceFeed {
    let mut mock = MockPriceFeed::new();
    mock.expect_historic_prices()
        .returning(move |_, _, _, _| Ok(vec![(0, price)]));
    mock
}
