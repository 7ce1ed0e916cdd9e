use crate::{
    error::{Error, Result},
    models::util::to_wei,
};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: u64,
    pub price: Decimal,
}

impl From<(u64, Decimal)> for PricePoint {
    fn from((timestamp, price): (u64, Decimal)) -> Self {
        Self { timestamp, price }
    }
}

/// Time ordered price series, timestamps in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prices {
    points: Vec<PricePoint>,
}

impl Prices {
    pub fn new<P: Into<PricePoint>>(points: impl IntoIterator<Item = P>) -> Self {
        let mut points: Vec<PricePoint> = points.into_iter().map(Into::into).collect();
        points.sort_by_key(|point| point.timestamp);
        Self { points }
    }

    /// Point nearest to `timestamp`. When two points are equally close the later one wins.
    pub fn closest(&self, timestamp: u64) -> Result<&PricePoint> {
        if self.points.is_empty() {
            return Err(Error::PricesEmpty);
        }
        let index = self.points.partition_point(|point| point.timestamp < timestamp);
        let after = self.points.get(index);
        let before = index.checked_sub(1).and_then(|i| self.points.get(i));

        match (before, after) {
            (Some(before), Some(after)) => {
                if timestamp - before.timestamp < after.timestamp - timestamp {
                    Ok(before)
                } else {
                    Ok(after)
                }
            }
            (Some(point), None) | (None, Some(point)) => Ok(point),
            (None, None) => Err(Error::PricesEmpty),
        }
    }

    /// Most recent point at or before `timestamp`
    pub fn lookup(&self, timestamp: u64) -> Result<&PricePoint> {
        let first = self.points.first().ok_or(Error::PricesEmpty)?;
        let index = self.points.partition_point(|point| point.timestamp <= timestamp);
        if index == 0 {
            return Err(Error::PriceTooEarly {
                requested: timestamp,
                first: first.timestamp,
            });
        }
        Ok(&self.points[index - 1])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }
}

pub fn price_to_wei(price: &Decimal) -> BigInt {
    to_wei(price)
}
