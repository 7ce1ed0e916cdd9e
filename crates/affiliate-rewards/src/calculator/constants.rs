use crate::error::{Error, Result};
use chrono::NaiveDate;

// History queries start here, no EMP was deployed earlier
pub const DEFAULT_FIRST_EMP_DATE: &str = "2020-01-01";

// Sample every block
pub const DEFAULT_SNAPSHOT_STEPS: u64 = 1;

pub const DEFAULT_CURRENCY: &str = "usd";

/// Midnight UTC of a `YYYY-MM-DD` date, in milliseconds
pub fn date_to_ms(date: &str) -> Result<u64> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|err| Error::InvalidConfig(format!("invalid date {date}: {err}")))?;
    let millis = parsed
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidConfig(format!("invalid date {date}")))?
        .and_utc()
        .timestamp_millis();
    u64::try_from(millis).map_err(|_| Error::InvalidConfig(format!("date {date} is before 1970")))
}
