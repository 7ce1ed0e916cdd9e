use crate::{
    error::{Error, Result},
    models::util::{normalize_address, parse_amount},
};
use num_bigint::BigInt;
use serde_json::Value;

fn invalid(name: &str, index: usize, reason: impl Into<String>) -> Error {
    Error::InvalidArgument {
        name: name.to_string(),
        index,
        reason: reason.into(),
    }
}

fn arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a Value> {
    args.get(index)
        .ok_or_else(|| invalid(name, index, "missing argument"))
}

/// Address argument, normalized
pub fn address_arg(name: &str, args: &[Value], index: usize) -> Result<String> {
    match arg(name, args, index)? {
        Value::String(address) if !address.trim().is_empty() => Ok(normalize_address(address)),
        other => Err(invalid(name, index, format!("expected address, got {other}"))),
    }
}

/// Integer amount argument. Accepts decimal strings, JSON integers and `{ "rawValue": .. }`
/// wrappers around either.
pub fn amount_arg(name: &str, args: &[Value], index: usize) -> Result<BigInt> {
    amount_value(arg(name, args, index)?).map_err(|err| invalid(name, index, err.to_string()))
}

fn amount_value(value: &Value) -> Result<BigInt> {
    match value {
        Value::String(raw) => parse_amount(raw),
        Value::Number(number) if number.is_u64() || number.is_i64() => {
            parse_amount(&number.to_string())
        }
        Value::Object(fields) => match fields.get("rawValue") {
            Some(raw) => amount_value(raw),
            None => Err(Error::InvalidAmount(value.to_string())),
        },
        other => Err(Error::InvalidAmount(other.to_string())),
    }
}
