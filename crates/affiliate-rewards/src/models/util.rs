use crate::error::{Error, Result};
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;

// Fixed point scale used for prices, shares and payouts
pub const WEI_DECIMALS: u32 = 18;

/// 10^18
pub fn wei() -> BigInt {
    ten_pow(WEI_DECIMALS)
}

pub fn ten_pow(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

/// Canonical form for addresses used as attribution keys
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// floor(value * scale / total); returns zero when total is zero
pub fn percent(value: &BigInt, total: &BigInt, scale: &BigInt) -> BigInt {
    if total.is_zero() {
        return BigInt::zero();
    }
    value * scale / total
}

/// Convert a decimal into an 18 decimal fixed point integer, truncating extra precision
pub fn to_wei(value: &Decimal) -> BigInt {
    let mantissa = BigInt::from(value.mantissa());
    let scale = value.scale();
    if scale <= WEI_DECIMALS {
        mantissa * ten_pow(WEI_DECIMALS - scale)
    } else {
        mantissa / ten_pow(scale - WEI_DECIMALS)
    }
}

/// Render an 18 decimal fixed point integer as a decimal string without trailing zeros
pub fn from_wei(value: &BigInt) -> String {
    let scale = wei();
    let magnitude = value.abs();
    let whole = &magnitude / &scale;
    let fraction = &magnitude % &scale;

    let sign = if value.sign() == Sign::Minus { "-" } else { "" };
    if fraction.is_zero() {
        return format!("{sign}{whole}");
    }

    let digits = format!("{:0>width$}", fraction.to_string(), width = WEI_DECIMALS as usize);
    format!("{sign}{whole}.{}", digits.trim_end_matches('0'))
}

/// Parse a non-negative integer amount as it appears in decoded event arguments
pub fn parse_amount(raw: &str) -> Result<BigInt> {
    let trimmed = raw.trim();
    trimmed
        .parse::<BigInt>()
        .map_err(|_| Error::InvalidAmount(trimmed.to_string()))
}
