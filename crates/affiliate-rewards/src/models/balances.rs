use crate::{
    error::{Error, Result},
    models::util::percent,
};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::collections::BTreeMap;

/// Per address balance table with an incrementally maintained total
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    balances: BTreeMap<String, BigInt>,
    total: BigInt,
    allow_negative: bool,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that tolerates balances below zero
    pub fn allowing_negative() -> Self {
        Self {
            allow_negative: true,
            ..Self::default()
        }
    }

    pub fn allow_negative(&self) -> bool {
        self.allow_negative
    }

    pub fn has(&self, address: &str) -> bool {
        self.balances.contains_key(address)
    }

    pub fn create(&mut self, address: &str) -> Result<&BigInt> {
        if self.has(address) {
            return Err(Error::BalanceExists(address.to_string()));
        }
        Ok(self
            .balances
            .entry(address.to_string())
            .or_insert_with(BigInt::zero))
    }

    pub fn get(&self, address: &str) -> Result<&BigInt> {
        self.balances
            .get(address)
            .ok_or_else(|| Error::BalanceNotFound(address.to_string()))
    }

    pub fn get_or_create(&mut self, address: &str) -> &BigInt {
        self.balances
            .entry(address.to_string())
            .or_insert_with(BigInt::zero)
    }

    pub fn set(&mut self, address: &str, value: BigInt) -> Result<&BigInt> {
        if !self.allow_negative && value.is_negative() {
            return Err(Error::NegativeBalance {
                address: address.to_string(),
                balance: value,
            });
        }
        let entry = self
            .balances
            .entry(address.to_string())
            .or_insert_with(BigInt::zero);
        self.total += &value - &*entry;
        *entry = value;
        Ok(entry)
    }

    pub fn add(&mut self, address: &str, amount: &BigInt) -> Result<&BigInt> {
        self.check_amount(address, amount)?;
        let entry = self
            .balances
            .entry(address.to_string())
            .or_insert_with(BigInt::zero);
        *entry += amount;
        self.total += amount;
        Ok(entry)
    }

    pub fn sub(&mut self, address: &str, amount: &BigInt) -> Result<&BigInt> {
        self.check_amount(address, amount)?;
        let next = self.balances.get(address).cloned().unwrap_or_default() - amount;
        if !self.allow_negative && next.is_negative() {
            return Err(Error::NegativeBalance {
                address: address.to_string(),
                balance: next,
            });
        }
        self.total -= amount;
        let entry = self
            .balances
            .entry(address.to_string())
            .or_insert_with(BigInt::zero);
        *entry = next;
        Ok(entry)
    }

    pub fn snapshot(&self) -> BTreeMap<String, BigInt> {
        self.balances.clone()
    }

    pub fn total(&self) -> &BigInt {
        &self.total
    }

    /// Share of the total held by an address, expressed against `scale`
    pub fn percent(&self, address: &str, scale: &BigInt) -> Result<BigInt> {
        Ok(percent(self.get(address)?, &self.total, scale))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.balances.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BigInt)> {
        self.balances.iter()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    fn check_amount(&self, address: &str, amount: &BigInt) -> Result {
        if amount.is_negative() {
            return Err(Error::NegativeAmount {
                address: address.to_string(),
                amount: amount.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::util::wei;

    fn sum_of(balances: &Balances) -> BigInt {
        balances.iter().map(|(_, value)| value.clone()).sum()
    }

    #[test]
    fn test_add_and_sub() {
        let mut balances = Balances::new();
        balances.add("a", &BigInt::from(10)).unwrap();
        balances.add("b", &BigInt::from(5)).unwrap();
        balances.sub("a", &BigInt::from(3)).unwrap();

        assert_eq!(balances.get("a").unwrap(), &BigInt::from(7));
        assert_eq!(balances.get("b").unwrap(), &BigInt::from(5));
        assert_eq!(balances.total(), &BigInt::from(12));
        assert_eq!(balances.total(), &sum_of(&balances));
    }

    #[test]
    fn test_rejects_negative_amounts() {
        let mut balances = Balances::new();
        assert!(matches!(
            balances.add("a", &BigInt::from(-1)),
            Err(Error::NegativeAmount { .. })
        ));
        assert!(matches!(
            balances.sub("a", &BigInt::from(-1)),
            Err(Error::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_sub_below_zero() {
        let mut balances = Balances::new();
        balances.add("a", &BigInt::from(1)).unwrap();
        assert!(matches!(
            balances.sub("a", &BigInt::from(2)),
            Err(Error::NegativeBalance { .. })
        ));
        // failed mutation leaves state untouched
        assert_eq!(balances.get("a").unwrap(), &BigInt::from(1));
        assert_eq!(balances.total(), &BigInt::from(1));
    }

    #[test]
    fn test_allowing_negative() {
        let mut balances = Balances::allowing_negative();
        balances.sub("a", &BigInt::from(2)).unwrap();
        balances.set("b", BigInt::from(-3)).unwrap();
        assert_eq!(balances.get("a").unwrap(), &BigInt::from(-2));
        assert_eq!(balances.total(), &BigInt::from(-5));
        assert_eq!(balances.total(), &sum_of(&balances));
    }

    #[test]
    fn test_set_updates_total() {
        let mut balances = Balances::new();
        balances.add("a", &BigInt::from(10)).unwrap();
        balances.set("a", BigInt::from(4)).unwrap();
        balances.set("b", BigInt::from(6)).unwrap();
        assert_eq!(balances.total(), &BigInt::from(10));
        assert!(balances.set("c", BigInt::from(-1)).is_err());
        assert!(!balances.has("c"));
    }

    #[test]
    fn test_create_and_get() {
        let mut balances = Balances::new();
        assert!(matches!(balances.get("a"), Err(Error::BalanceNotFound(_))));
        assert_eq!(balances.create("a").unwrap(), &BigInt::zero());
        assert!(matches!(balances.create("a"), Err(Error::BalanceExists(_))));
        assert_eq!(balances.get_or_create("b"), &BigInt::zero());
        assert_eq!(balances.len(), 2);
    }

    #[test]
    fn test_percent() {
        let mut balances = Balances::new();
        balances.add("a", &BigInt::from(1)).unwrap();
        balances.add("b", &BigInt::from(3)).unwrap();
        assert_eq!(
            balances.percent("a", &wei()).unwrap(),
            BigInt::from(250_000_000_000_000_000u64)
        );
        assert_eq!(balances.snapshot().len(), 2);
    }
}
