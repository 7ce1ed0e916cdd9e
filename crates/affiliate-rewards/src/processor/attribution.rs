use crate::{
    error::{Error, Result},
    ingestor::types::RawTransaction,
    models::{
        AffiliateAmounts, Attribute, AttributionLookback, SharedAttributions, SparseHistory,
        util::normalize_address,
    },
    processor::util::{address_arg, amount_arg},
};
use num_bigint::BigInt;
use std::collections::BTreeMap;
use tracing::debug;

/// Contract calls that can carry an affiliate tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributedCall {
    Create { collateral: BigInt, tokens: BigInt },
    Deposit { collateral: BigInt },
    DepositTo { sponsor: String, collateral: BigInt },
    TransferPositionPassedRequest { new_sponsor: String },
}

impl TryFrom<&RawTransaction> for AttributedCall {
    type Error = Error;

    fn try_from(tx: &RawTransaction) -> Result<Self> {
        let name = tx.name.as_str();
        let args = tx.args.as_slice();
        let call = match name {
            "create" => AttributedCall::Create {
                collateral: amount_arg(name, args, 0)?,
                tokens: amount_arg(name, args, 1)?,
            },
            "deposit" => AttributedCall::Deposit {
                collateral: amount_arg(name, args, 0)?,
            },
            "depositTo" => AttributedCall::DepositTo {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
            },
            "transferPositionPassedRequest" => AttributedCall::TransferPositionPassedRequest {
                new_sponsor: address_arg(name, args, 0)?,
            },
            other => return Err(Error::UnknownEvent(other.to_string())),
        };
        Ok(call)
    }
}

fn tagged_affiliate(tx: &RawTransaction) -> Option<&str> {
    tx.affiliate
        .as_deref()
        .map(str::trim)
        .filter(|affiliate| !affiliate.is_empty())
}

/// Credits synthetic tokens minted through `create` to the affiliate tagged on the call.
/// Untagged calls are credited to the default affiliate.
#[derive(Debug, Clone)]
pub struct EmpAttributions<A: Attribute = AttributionLookback> {
    pub attributions: A,
    default_affiliate: String,
}

impl<A: Attribute + Default> EmpAttributions<A> {
    pub fn new(default_affiliate: &str) -> Self {
        Self::with_store(default_affiliate, A::default())
    }
}

impl<A: Attribute> EmpAttributions<A> {
    pub fn with_store(default_affiliate: &str, attributions: A) -> Self {
        Self {
            attributions,
            default_affiliate: normalize_address(default_affiliate),
        }
    }

    pub fn default_affiliate(&self) -> &str {
        &self.default_affiliate
    }

    pub fn handle_transaction(&mut self, tx: &RawTransaction) -> Result {
        if tx.name != "create" {
            return Ok(());
        }
        if !tx.succeeded() {
            debug!("Skipping reverted create at block {}", tx.block_number);
            return Ok(());
        }
        let AttributedCall::Create { tokens, .. } = AttributedCall::try_from(tx)? else {
            return Ok(());
        };
        let affiliate = tagged_affiliate(tx).unwrap_or(&self.default_affiliate);
        self.attributions
            .attribute(&tx.from_address, affiliate, &tokens)
    }

    pub fn into_inner(self) -> A {
        self.attributions
    }
}

pub type SharesSnapshot = BTreeMap<String, AffiliateAmounts>;

/// Cumulative collateral attributions with a share snapshot per block
#[derive(Debug, Clone, Default)]
pub struct AttributionHistory {
    pub attributions: SharedAttributions,
    pub history: SparseHistory<SharesSnapshot>,
    last_block: Option<u64>,
}

impl AttributionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_transaction(&mut self, tx: &RawTransaction) -> Result {
        match self.last_block {
            Some(last) if tx.block_number < last => {
                return Err(Error::OutOfOrder {
                    block: tx.block_number,
                    previous: last,
                });
            }
            Some(last) if tx.block_number > last => {
                self.record(last);
                self.last_block = Some(tx.block_number);
            }
            Some(_) => {}
            None => self.last_block = Some(tx.block_number),
        }

        let affiliate = tagged_affiliate(tx)
            .ok_or_else(|| Error::MissingAffiliate(normalize_address(&tx.from_address)))?;
        let call = AttributedCall::try_from(tx)?;
        self.handle_call(&tx.from_address, affiliate, &call)
    }

    pub fn handle_call(&mut self, user: &str, affiliate: &str, call: &AttributedCall) -> Result {
        match call {
            AttributedCall::Create { collateral, .. }
            | AttributedCall::Deposit { collateral }
            | AttributedCall::DepositTo { collateral, .. } => {
                self.attributions.attribute(user, affiliate, collateral)
            }
            AttributedCall::TransferPositionPassedRequest { new_sponsor } => {
                self.attributions
                    .attribute(new_sponsor, affiliate, &BigInt::default())
            }
        }
    }

    pub fn finalize(&mut self) {
        if let Some(last) = self.last_block {
            if !self.history.has(last) {
                self.record(last);
            }
        }
    }

    fn record(&mut self, block_number: u64) {
        self.history
            .insert(block_number, self.attributions.snapshot());
    }
}
