use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

/// A decoded contract event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// A decoded contract call taken from the trace of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub from_address: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Affiliate tag appended to the call data, if any
    #[serde(default)]
    pub affiliate: Option<String>,
    /// Set when the call reverted
    #[serde(default)]
    pub error: Option<String>,
}

impl RawLog {
    pub fn new(block_number: u64, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            block_number,
            block_timestamp: block_number,
            name: name.into(),
            args,
        }
    }
}

impl RawTransaction {
    pub fn new(
        block_number: u64,
        from_address: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Value>,
        affiliate: Option<&str>,
    ) -> Self {
        Self {
            block_number,
            block_timestamp: block_number,
            from_address: from_address.into(),
            name: name.into(),
            args,
            affiliate: affiliate.map(str::to_string),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
