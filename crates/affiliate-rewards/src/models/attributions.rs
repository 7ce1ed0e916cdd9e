use crate::{
    error::{Error, Result},
    models::util::{normalize_address, percent, wei},
};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::collections::{BTreeMap, VecDeque};

// key: affiliate, value: amount or share
pub type AffiliateAmounts = BTreeMap<String, BigInt>;

/// Mutation seam shared by attribution stores
pub trait Attribute {
    fn attribute(&mut self, user: &str, affiliate: &str, amount: &BigInt) -> Result;
}

/// Per affiliate shares of a user's `amount`, scaled by the store's fixed point scale
pub trait AttributionPercents {
    fn attribution_percents(&self, user: &str, amount: &BigInt) -> Result<AffiliateAmounts>;
}

/// Shares of `total` for each entry, dividing last
fn calculate_shares(amounts: &AffiliateAmounts, total: &BigInt, scale: &BigInt) -> AffiliateAmounts {
    if total.is_zero() {
        return AffiliateAmounts::new();
    }
    amounts
        .iter()
        .map(|(affiliate, amount)| (affiliate.clone(), percent(amount, total, scale)))
        .collect()
}

fn check_amount(user: &str, amount: &BigInt) -> Result {
    if amount.is_negative() {
        return Err(Error::NegativeAmount {
            address: user.to_string(),
            amount: amount.clone(),
        });
    }
    Ok(())
}

/// Cumulative attribution per (user, affiliate)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAttributions {
    attributions: BTreeMap<String, AffiliateAmounts>,
    scale: BigInt,
}

impl Default for SharedAttributions {
    fn default() -> Self {
        Self::with_scale(wei())
    }
}

impl SharedAttributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale(scale: BigInt) -> Self {
        Self {
            attributions: BTreeMap::new(),
            scale,
        }
    }

    pub fn get_attribution(&self, user: &str, affiliate: &str) -> BigInt {
        self.attributions
            .get(&normalize_address(user))
            .and_then(|affiliates| affiliates.get(&normalize_address(affiliate)))
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of everything attributed for a user across affiliates
    pub fn get_sum(&self, user: &str) -> BigInt {
        self.attributions
            .get(&normalize_address(user))
            .map(|affiliates| affiliates.values().sum())
            .unwrap_or_default()
    }

    pub fn calculate_share(&self, user: &str, affiliate: &str) -> BigInt {
        percent(
            &self.get_attribution(user, affiliate),
            &self.get_sum(user),
            &self.scale,
        )
    }

    pub fn calculate_shares(&self, user: &str) -> AffiliateAmounts {
        match self.attributions.get(&normalize_address(user)) {
            Some(affiliates) => calculate_shares(affiliates, &self.get_sum(user), &self.scale),
            None => AffiliateAmounts::new(),
        }
    }

    /// user -> affiliate -> share for every user
    pub fn snapshot(&self) -> BTreeMap<String, AffiliateAmounts> {
        self.attributions
            .keys()
            .map(|user| (user.clone(), self.calculate_shares(user)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AffiliateAmounts)> {
        self.attributions.iter()
    }

    pub fn users(&self) -> impl Iterator<Item = &String> {
        self.attributions.keys()
    }
}

impl Attribute for SharedAttributions {
    fn attribute(&mut self, user: &str, affiliate: &str, amount: &BigInt) -> Result {
        check_amount(user, amount)?;
        *self
            .attributions
            .entry(normalize_address(user))
            .or_default()
            .entry(normalize_address(affiliate))
            .or_default() += amount;
        Ok(())
    }
}

impl AttributionPercents for SharedAttributions {
    fn attribution_percents(&self, user: &str, _amount: &BigInt) -> Result<AffiliateAmounts> {
        Ok(self.calculate_shares(user))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionEvent {
    pub affiliate: String,
    pub amount: BigInt,
}

/// Per user attribution stack, newest event first.
///
/// Lookups consume the most recent attributions before older ones, so the affiliate that
/// brought in the latest tokens is credited first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionLookback {
    events: BTreeMap<String, VecDeque<AttributionEvent>>,
    scale: BigInt,
}

impl Default for AttributionLookback {
    fn default() -> Self {
        Self::with_scale(wei())
    }
}

impl AttributionLookback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale(scale: BigInt) -> Self {
        Self {
            events: BTreeMap::new(),
            scale,
        }
    }

    /// Events for a user, index 0 is the most recent
    pub fn events(&self, user: &str) -> Option<&VecDeque<AttributionEvent>> {
        self.events.get(&normalize_address(user))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VecDeque<AttributionEvent>)> {
        self.events.iter()
    }

    pub fn get_by_index(&self, user: &str, index: usize) -> Result<&AttributionEvent> {
        self.events(user)
            .and_then(|events| events.get(index))
            .ok_or_else(|| Error::AttributionIndexNotFound {
                user: normalize_address(user),
                index,
            })
    }

    /// Overwrite an existing entry in place
    pub fn set_by_index(
        &mut self,
        user: &str,
        index: usize,
        affiliate: &str,
        amount: BigInt,
    ) -> Result {
        check_amount(user, &amount)?;
        let user = normalize_address(user);
        let event = self
            .events
            .get_mut(&user)
            .and_then(|events| events.get_mut(index))
            .ok_or_else(|| Error::AttributionIndexNotFound {
                user: user.clone(),
                index,
            })?;
        event.affiliate = normalize_address(affiliate);
        event.amount = amount;
        Ok(())
    }

    /// Prepend zero amount entries so that this store has as many entries for `user` as `live`,
    /// matching entries by age.
    pub fn align_with(&mut self, user: &str, live: &VecDeque<AttributionEvent>) {
        let events = self.events.entry(normalize_address(user)).or_default();
        let missing = live.len().saturating_sub(events.len());
        for event in live.iter().take(missing).rev() {
            events.push_front(AttributionEvent {
                affiliate: event.affiliate.clone(),
                amount: BigInt::zero(),
            });
        }
    }

    /// Total ever attributed to a user
    pub fn get_sum(&self, user: &str) -> BigInt {
        self.events(user)
            .map(|events| events.iter().map(|event| &event.amount).sum())
            .unwrap_or_default()
    }

    /// Sum of every entry crediting `affiliate` for `user`
    pub fn get_attribution(&self, user: &str, affiliate: &str) -> BigInt {
        let affiliate = normalize_address(affiliate);
        self.events(user)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.affiliate == affiliate)
                    .map(|event| &event.amount)
                    .sum()
            })
            .unwrap_or_default()
    }

    /// Consume `amount` from the newest events backwards, the last one possibly partially
    pub fn get_attributions(&self, user: &str, amount: &BigInt) -> Result<AffiliateAmounts> {
        let mut result = AffiliateAmounts::new();
        if amount.is_zero() {
            return Ok(result);
        }

        let mut remaining = amount.clone();
        if let Some(events) = self.events(user) {
            for event in events {
                let consumed = if event.amount < remaining {
                    event.amount.clone()
                } else {
                    remaining.clone()
                };
                remaining -= &consumed;
                *result.entry(event.affiliate.clone()).or_default() += consumed;
                if remaining.is_zero() {
                    return Ok(result);
                }
            }
        }

        Err(Error::InsufficientAttributions {
            user: normalize_address(user),
            requested: amount.clone(),
            available: self.get_sum(user),
        })
    }

    pub fn get_attribution_percents(&self, user: &str, amount: &BigInt) -> Result<AffiliateAmounts> {
        let attributions = self.get_attributions(user, amount)?;
        Ok(calculate_shares(&attributions, amount, &self.scale))
    }
}

impl Attribute for AttributionLookback {
    fn attribute(&mut self, user: &str, affiliate: &str, amount: &BigInt) -> Result {
        check_amount(user, amount)?;
        self.events
            .entry(normalize_address(user))
            .or_default()
            .push_front(AttributionEvent {
                affiliate: normalize_address(affiliate),
                amount: amount.clone(),
            });
        Ok(())
    }
}

impl AttributionPercents for AttributionLookback {
    fn attribution_percents(&self, user: &str, amount: &BigInt) -> Result<AffiliateAmounts> {
        self.get_attribution_percents(user, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: u64) -> BigInt {
        BigInt::from(value)
    }

    #[test]
    fn test_shared_attributions() {
        let mut attributions = SharedAttributions::new();
        attributions.attribute("a", "Dev1", &amount(1)).unwrap();
        attributions.attribute("a", "dev1", &amount(1)).unwrap();
        attributions.attribute("a", "Dev2", &amount(2)).unwrap();

        assert_eq!(attributions.get_attribution("A", "DEV1"), amount(2));
        assert_eq!(attributions.get_attribution("a", "missing"), BigInt::zero());
        assert_eq!(
            attributions.calculate_share("a", "dev2"),
            amount(500_000_000_000_000_000)
        );

        let snapshot = attributions.snapshot();
        assert_eq!(snapshot["a"]["dev1"], amount(500_000_000_000_000_000));
        assert_eq!(snapshot["a"]["dev2"], amount(500_000_000_000_000_000));
    }

    #[test]
    fn test_shared_zero_sum_has_no_shares() {
        let mut attributions = SharedAttributions::new();
        attributions.attribute("a", "dev", &BigInt::zero()).unwrap();
        assert!(attributions.calculate_shares("a").is_empty());
        assert!(attributions.calculate_shares("unknown").is_empty());
        assert!(attributions.calculate_share("a", "dev").is_zero());
    }

    #[test]
    fn test_shared_rejects_negative() {
        let mut attributions = SharedAttributions::new();
        assert!(attributions.attribute("a", "dev", &BigInt::from(-1)).is_err());
    }

    #[test]
    fn test_lookback_consumes_newest_first() {
        let mut attributions = AttributionLookback::new();
        attributions.attribute("a", "a", &amount(5)).unwrap();
        attributions.attribute("a", "b", &amount(5)).unwrap();

        let result = attributions.get_attributions("a", &amount(8)).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result["b"], amount(5));
        assert_eq!(result["a"], amount(3));

        let result = attributions.get_attributions("a", &amount(5)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["b"], amount(5));
    }

    #[test]
    fn test_lookback_sums_repeated_affiliates() {
        let mut attributions = AttributionLookback::new();
        attributions.attribute("a", "x", &amount(2)).unwrap();
        attributions.attribute("a", "y", &amount(2)).unwrap();
        attributions.attribute("a", "x", &amount(2)).unwrap();

        let result = attributions.get_attributions("a", &amount(6)).unwrap();
        assert_eq!(result["x"], amount(4));
        assert_eq!(result["y"], amount(2));
        assert_eq!(attributions.get_attribution("a", "x"), amount(4));
    }

    #[test]
    fn test_lookback_insufficient() {
        let mut attributions = AttributionLookback::new();
        attributions.attribute("a", "x", &amount(2)).unwrap();
        assert!(matches!(
            attributions.get_attributions("a", &amount(3)),
            Err(Error::InsufficientAttributions { .. })
        ));
        assert!(matches!(
            attributions.get_attributions("nobody", &amount(1)),
            Err(Error::InsufficientAttributions { .. })
        ));
        assert!(attributions.get_attributions("nobody", &BigInt::zero()).unwrap().is_empty());
    }

    #[test]
    fn test_lookback_percents() {
        let mut attributions = AttributionLookback::new();
        attributions.attribute("a", "x", &amount(10)).unwrap();
        attributions.attribute("a", "y", &amount(1)).unwrap();

        let percents = attributions.get_attribution_percents("a", &amount(4)).unwrap();
        assert_eq!(percents["y"], amount(250_000_000_000_000_000));
        assert_eq!(percents["x"], amount(750_000_000_000_000_000));
    }

    #[test]
    fn test_lookback_index_access() {
        let mut attributions = AttributionLookback::new();
        attributions.attribute("User", "x", &amount(1)).unwrap();
        attributions.attribute("user", "y", &amount(2)).unwrap();

        assert_eq!(attributions.get_by_index("user", 0).unwrap().affiliate, "y");
        assert_eq!(attributions.get_by_index("user", 1).unwrap().affiliate, "x");
        assert!(attributions.get_by_index("user", 2).is_err());

        attributions.set_by_index("user", 1, "x", amount(10)).unwrap();
        assert_eq!(attributions.get_by_index("user", 1).unwrap().amount, amount(10));
        assert!(attributions.set_by_index("user", 5, "x", amount(1)).is_err());
    }

    #[test]
    fn test_align_with_matches_event_age() {
        let mut live = AttributionLookback::new();
        live.attribute("u", "old", &amount(1)).unwrap();

        let mut sum = AttributionLookback::new();
        sum.align_with("u", live.events("u").unwrap());
        sum.set_by_index("u", 0, "old", amount(7)).unwrap();

        live.attribute("u", "new", &amount(1)).unwrap();
        sum.align_with("u", live.events("u").unwrap());

        assert_eq!(sum.get_by_index("u", 0).unwrap().affiliate, "new");
        assert!(sum.get_by_index("u", 0).unwrap().amount.is_zero());
        assert_eq!(sum.get_by_index("u", 1).unwrap().affiliate, "old");
        assert_eq!(sum.get_by_index("u", 1).unwrap().amount, amount(7));
    }
}
