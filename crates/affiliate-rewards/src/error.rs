use num_bigint::BigInt;
use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("attribution index {index} not found for user {user}")]
    AttributionIndexNotFound { user: String, index: usize },
    #[error("balance already exists for {0}")]
    BalanceExists(String),
    #[error("balance does not exist for {0}")]
    BalanceNotFound(String),
    #[error("error processing {entity} at block {block}: {source}")]
    Entity {
        entity: String,
        block: u64,
        source: Box<Error>,
    },
    #[error("error in handler {event}: {source}")]
    Handler { event: String, source: Box<Error> },
    #[error("history does not go back far enough: requested block {requested}, first block {first}")]
    HistoryTooEarly { requested: u64, first: u64 },
    #[error("history is empty")]
    HistoryEmpty,
    #[error("history not found at block {0}")]
    HistoryNotFound(u64),
    #[error(
        "too few attribution events to sum to amount {requested} for user {user}: only {available} attributed"
    )]
    InsufficientAttributions {
        user: String,
        requested: BigInt,
        available: BigInt,
    },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid argument {index} for {name}: {reason}")]
    InvalidArgument {
        name: String,
        index: usize,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid block window: end block {end} must be greater than start block {start}")]
    InvalidWindow { start: u64, end: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing decimals for {0}")]
    MissingDecimals(String),
    #[error("transaction from {0} carries no affiliate")]
    MissingAffiliate(String),
    #[error("missing balance history for {0}")]
    MissingHistory(String),
    #[error("missing price history for {0}")]
    MissingPrices(String),
    #[error("negative amount {amount} not allowed for {address}")]
    NegativeAmount { address: String, amount: BigInt },
    #[error("balance for {address} cannot go below zero: {balance}")]
    NegativeBalance { address: String, balance: BigInt },
    #[error("no blocks found between {start} and {end}")]
    NoBlocks { start: u64, end: u64 },
    #[error("events out of order: block {block} follows block {previous}")]
    OutOfOrder { block: u64, previous: u64 },
    #[error("price history is empty")]
    PricesEmpty,
    #[error("price history does not go back far enough: requested {requested}, first {first}")]
    PriceTooEarly { requested: u64, first: u64 },
    #[error("no handler for event: {0}")]
    UnknownEvent(String),
}

impl Error {
    /// Scope an error to the entity and block that produced it
    pub fn for_entity(self, entity: impl Into<String>, block: u64) -> Self {
        Error::Entity {
            entity: entity.into(),
            block,
            source: Box::new(self),
        }
    }

    /// True when a history lookup failed only because the entity has no state yet
    pub fn is_missing_history(&self) -> bool {
        matches!(self, Error::HistoryEmpty | Error::HistoryTooEarly { .. })
    }
}
