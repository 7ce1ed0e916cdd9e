pub mod constants;
pub mod dappmining;
pub mod devmining;

use crate::error::Result;
use constants::{DEFAULT_CURRENCY, DEFAULT_SNAPSHOT_STEPS, date_to_ms};

/// Values used when a run configuration leaves them out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDefaults {
    /// Start of history queries, milliseconds
    pub first_emp_date: u64,
    pub snapshot_steps: u64,
    pub currency: String,
}

impl RunDefaults {
    pub fn new(first_emp_date: &str, snapshot_steps: u64, currency: &str) -> Result<Self> {
        Ok(Self {
            first_emp_date: date_to_ms(first_emp_date)?,
            snapshot_steps,
            currency: currency.to_string(),
        })
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            // 2020-01-01T00:00:00Z
            first_emp_date: 1_577_836_800_000,
            snapshot_steps: DEFAULT_SNAPSHOT_STEPS,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}
