use crate::{
    error::{Error, Result},
    ingestor::types::RawLog,
    models::{Balances, SparseHistory},
    processor::util::{address_arg, amount_arg},
};
use num_bigint::BigInt;
use std::collections::BTreeMap;
use tracing::debug;

/// Events emitted by an expiring multi party contract. Variants without fields do not move
/// balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmpEvent {
    RequestTransferPosition,
    RequestTransferPositionExecuted {
        old_sponsor: String,
        new_sponsor: String,
    },
    RequestTransferPositionCanceled,
    Deposit {
        sponsor: String,
        collateral: BigInt,
    },
    Withdrawal {
        sponsor: String,
        collateral: BigInt,
    },
    RequestWithdrawal,
    RequestWithdrawalExecuted {
        sponsor: String,
        collateral: BigInt,
    },
    RequestWithdrawalCanceled,
    PositionCreated {
        sponsor: String,
        collateral: BigInt,
        tokens: BigInt,
    },
    NewSponsor,
    EndedSponsorPosition,
    Redeem {
        sponsor: String,
        collateral: BigInt,
        tokens: BigInt,
    },
    ContractExpired,
    SettleExpiredPosition {
        caller: String,
        collateral: BigInt,
        tokens: BigInt,
    },
    LiquidationCreated {
        sponsor: String,
        tokens_outstanding: BigInt,
        liquidated_collateral: BigInt,
    },
    LiquidationWithdrawn,
    LiquidationDisputed,
    FinalFeesPaid,
}

impl EmpEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EmpEvent::RequestTransferPosition => "RequestTransferPosition",
            EmpEvent::RequestTransferPositionExecuted { .. } => "RequestTransferPositionExecuted",
            EmpEvent::RequestTransferPositionCanceled => "RequestTransferPositionCanceled",
            EmpEvent::Deposit { .. } => "Deposit",
            EmpEvent::Withdrawal { .. } => "Withdrawal",
            EmpEvent::RequestWithdrawal => "RequestWithdrawal",
            EmpEvent::RequestWithdrawalExecuted { .. } => "RequestWithdrawalExecuted",
            EmpEvent::RequestWithdrawalCanceled => "RequestWithdrawalCanceled",
            EmpEvent::PositionCreated { .. } => "PositionCreated",
            EmpEvent::NewSponsor => "NewSponsor",
            EmpEvent::EndedSponsorPosition => "EndedSponsorPosition",
            EmpEvent::Redeem { .. } => "Redeem",
            EmpEvent::ContractExpired => "ContractExpired",
            EmpEvent::SettleExpiredPosition { .. } => "SettleExpiredPosition",
            EmpEvent::LiquidationCreated { .. } => "LiquidationCreated",
            EmpEvent::LiquidationWithdrawn => "LiquidationWithdrawn",
            EmpEvent::LiquidationDisputed => "LiquidationDisputed",
            EmpEvent::FinalFeesPaid => "FinalFeesPaid",
        }
    }
}

impl TryFrom<&RawLog> for EmpEvent {
    type Error = Error;

    fn try_from(log: &RawLog) -> Result<Self> {
        let name = log.name.as_str();
        let args = log.args.as_slice();
        let event = match name {
            "RequestTransferPosition" => EmpEvent::RequestTransferPosition,
            "RequestTransferPositionExecuted" => EmpEvent::RequestTransferPositionExecuted {
                old_sponsor: address_arg(name, args, 0)?,
                new_sponsor: address_arg(name, args, 1)?,
            },
            "RequestTransferPositionCanceled" => EmpEvent::RequestTransferPositionCanceled,
            "Deposit" => EmpEvent::Deposit {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
            },
            "Withdrawal" => EmpEvent::Withdrawal {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
            },
            "RequestWithdrawal" => EmpEvent::RequestWithdrawal,
            "RequestWithdrawalExecuted" => EmpEvent::RequestWithdrawalExecuted {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
            },
            "RequestWithdrawalCanceled" => EmpEvent::RequestWithdrawalCanceled,
            "PositionCreated" => EmpEvent::PositionCreated {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
                tokens: amount_arg(name, args, 2)?,
            },
            "NewSponsor" => EmpEvent::NewSponsor,
            "EndedSponsorPosition" => EmpEvent::EndedSponsorPosition,
            "Redeem" => EmpEvent::Redeem {
                sponsor: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
                tokens: amount_arg(name, args, 2)?,
            },
            "ContractExpired" => EmpEvent::ContractExpired,
            "SettleExpiredPosition" => EmpEvent::SettleExpiredPosition {
                caller: address_arg(name, args, 0)?,
                collateral: amount_arg(name, args, 1)?,
                tokens: amount_arg(name, args, 2)?,
            },
            // (sponsor, liquidator, liquidationId, tokensOutstanding, lockedCollateral,
            //  liquidatedCollateral, liquidationTime)
            "LiquidationCreated" => EmpEvent::LiquidationCreated {
                sponsor: address_arg(name, args, 0)?,
                tokens_outstanding: amount_arg(name, args, 3)?,
                liquidated_collateral: amount_arg(name, args, 5)?,
            },
            "LiquidationWithdrawn" => EmpEvent::LiquidationWithdrawn,
            "LiquidationDisputed" => EmpEvent::LiquidationDisputed,
            "FinalFeesPaid" => EmpEvent::FinalFeesPaid,
            other => return Err(Error::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

/// Live collateral and token balances of every sponsor in one contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmpBalances {
    pub collateral: Balances,
    pub tokens: Balances,
    is_expired: bool,
}

impl Default for EmpBalances {
    fn default() -> Self {
        // Settling an expired contract can burn more than a holder minted, so both ledgers
        // accept negative balances.
        Self {
            collateral: Balances::allowing_negative(),
            tokens: Balances::allowing_negative(),
            is_expired: false,
        }
    }
}

impl EmpBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired
    }

    pub fn handle_event(&mut self, event: &EmpEvent) -> Result {
        self.apply(event).map_err(|err| Error::Handler {
            event: event.name().to_string(),
            source: Box::new(err),
        })
    }

    fn apply(&mut self, event: &EmpEvent) -> Result {
        match event {
            EmpEvent::RequestTransferPositionExecuted {
                old_sponsor,
                new_sponsor,
            } => {
                let collateral = self.collateral.get(old_sponsor)?.clone();
                let tokens = self.tokens.get(old_sponsor)?.clone();
                self.collateral.set(old_sponsor, BigInt::default())?;
                self.collateral.set(new_sponsor, collateral)?;
                self.tokens.set(old_sponsor, BigInt::default())?;
                self.tokens.set(new_sponsor, tokens)?;
            }
            EmpEvent::Deposit {
                sponsor,
                collateral,
            } => {
                self.collateral.add(sponsor, collateral)?;
            }
            EmpEvent::Withdrawal {
                sponsor,
                collateral,
            }
            | EmpEvent::RequestWithdrawalExecuted {
                sponsor,
                collateral,
            } => {
                self.collateral.sub(sponsor, collateral)?;
            }
            EmpEvent::PositionCreated {
                sponsor,
                collateral,
                tokens,
            } => {
                self.collateral.add(sponsor, collateral)?;
                self.tokens.add(sponsor, tokens)?;
            }
            EmpEvent::Redeem {
                sponsor,
                collateral,
                tokens,
            } => {
                self.collateral.sub(sponsor, collateral)?;
                self.tokens.sub(sponsor, tokens)?;
            }
            EmpEvent::ContractExpired => {
                self.is_expired = true;
            }
            EmpEvent::SettleExpiredPosition {
                caller,
                collateral,
                tokens,
            } => {
                self.collateral.sub(caller, collateral)?;
                self.tokens.sub(caller, tokens)?;
            }
            EmpEvent::LiquidationCreated {
                sponsor,
                tokens_outstanding,
                liquidated_collateral,
            } => {
                self.collateral.sub(sponsor, liquidated_collateral)?;
                self.tokens.sub(sponsor, tokens_outstanding)?;
            }
            EmpEvent::RequestTransferPosition
            | EmpEvent::RequestTransferPositionCanceled
            | EmpEvent::RequestWithdrawal
            | EmpEvent::RequestWithdrawalCanceled
            | EmpEvent::NewSponsor
            | EmpEvent::EndedSponsorPosition
            | EmpEvent::LiquidationWithdrawn
            | EmpEvent::LiquidationDisputed
            | EmpEvent::FinalFeesPaid => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmpBalancesSnapshot {
    pub block_timestamp: u64,
    pub collateral: BTreeMap<String, BigInt>,
    pub tokens: BTreeMap<String, BigInt>,
    pub is_expired: bool,
}

impl EmpBalancesSnapshot {
    pub fn total_collateral(&self) -> BigInt {
        self.collateral.values().sum()
    }

    pub fn total_tokens(&self) -> BigInt {
        self.tokens.values().sum()
    }
}

/// Contract balances with a snapshot at the last event of every block that had events
#[derive(Debug, Clone, Default)]
pub struct EmpBalancesHistory {
    pub balances: EmpBalances,
    pub history: SparseHistory<EmpBalancesSnapshot>,
    last_block: Option<(u64, u64)>,
}

impl EmpBalancesHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, log: &RawLog) -> Result {
        let event = EmpEvent::try_from(log)?;
        self.apply(log.block_number, log.block_timestamp, &event)
    }

    /// Apply an event, first recording the state of the previous block if this event starts a
    /// new one
    pub fn apply(&mut self, block_number: u64, block_timestamp: u64, event: &EmpEvent) -> Result {
        match self.last_block {
            Some((last, _)) if block_number < last => {
                return Err(Error::OutOfOrder {
                    block: block_number,
                    previous: last,
                });
            }
            Some((last, last_timestamp)) if block_number > last => {
                self.record(last, last_timestamp);
                self.last_block = Some((block_number, block_timestamp));
            }
            Some(_) => {}
            None => self.last_block = Some((block_number, block_timestamp)),
        }
        self.balances.handle_event(event)
    }

    /// Record the final state. No-op if nothing was handled or the last block is already recorded.
    pub fn finalize(&mut self) {
        if let Some((last, last_timestamp)) = self.last_block {
            if !self.history.has(last) {
                self.record(last, last_timestamp);
            }
        }
    }

    pub fn last_block(&self) -> Option<u64> {
        self.last_block.map(|(number, _)| number)
    }

    fn record(&mut self, block_number: u64, block_timestamp: u64) {
        debug!(
            "Recording balances snapshot at block {} ({} sponsors)",
            block_number,
            self.balances.collateral.len()
        );
        self.history.insert(
            block_number,
            EmpBalancesSnapshot {
                block_timestamp,
                collateral: self.balances.collateral.snapshot(),
                tokens: self.balances.tokens.snapshot(),
                is_expired: self.balances.is_expired(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(block: u64, name: &str, args: Vec<serde_json::Value>) -> RawLog {
        RawLog::new(block, name, args)
    }

    #[test]
    fn test_decode_events() {
        let event = EmpEvent::try_from(&log(
            1,
            "PositionCreated",
            vec![json!("0xAA"), json!("2"), json!(1)],
        ))
        .unwrap();
        assert_eq!(
            event,
            EmpEvent::PositionCreated {
                sponsor: "0xaa".to_string(),
                collateral: BigInt::from(2),
                tokens: BigInt::from(1),
            }
        );

        let event = EmpEvent::try_from(&log(
            1,
            "LiquidationCreated",
            vec![
                json!("s"),
                json!("l"),
                json!("0"),
                json!("7"),
                json!("9"),
                json!({ "rawValue": "8" }),
                json!("100"),
            ],
        ))
        .unwrap();
        assert_eq!(
            event,
            EmpEvent::LiquidationCreated {
                sponsor: "s".to_string(),
                tokens_outstanding: BigInt::from(7),
                liquidated_collateral: BigInt::from(8),
            }
        );
        assert_eq!(event.name(), "LiquidationCreated");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            EmpEvent::try_from(&log(1, "Unknown", vec![])),
            Err(Error::UnknownEvent(_))
        ));
        assert!(matches!(
            EmpEvent::try_from(&log(1, "Deposit", vec![json!("a")])),
            Err(Error::InvalidArgument { index: 1, .. })
        ));
    }

    #[test]
    fn test_balances_follow_events() {
        let mut balances = EmpBalances::new();
        let events = [
            EmpEvent::PositionCreated {
                sponsor: "a".into(),
                collateral: BigInt::from(10),
                tokens: BigInt::from(5),
            },
            EmpEvent::Deposit {
                sponsor: "a".into(),
                collateral: BigInt::from(5),
            },
            EmpEvent::Withdrawal {
                sponsor: "a".into(),
                collateral: BigInt::from(3),
            },
            EmpEvent::Redeem {
                sponsor: "a".into(),
                collateral: BigInt::from(2),
                tokens: BigInt::from(1),
            },
            EmpEvent::RequestTransferPositionExecuted {
                old_sponsor: "a".into(),
                new_sponsor: "b".into(),
            },
        ];
        for event in &events {
            balances.handle_event(event).unwrap();
        }
        assert_eq!(balances.collateral.get("a").unwrap(), &BigInt::from(0));
        assert_eq!(balances.collateral.get("b").unwrap(), &BigInt::from(10));
        assert_eq!(balances.tokens.get("b").unwrap(), &BigInt::from(4));
        assert_eq!(balances.collateral.total(), &BigInt::from(10));
        assert!(!balances.is_expired());

        balances.handle_event(&EmpEvent::ContractExpired).unwrap();
        assert!(balances.is_expired());
    }

    fn funded(sponsor: &str, collateral: u64, tokens: u64) -> EmpBalances {
        let mut balances = EmpBalances::new();
        balances
            .handle_event(&EmpEvent::PositionCreated {
                sponsor: sponsor.into(),
                collateral: BigInt::from(collateral),
                tokens: BigInt::from(tokens),
            })
            .unwrap();
        balances
    }

    #[test]
    fn test_liquidation_removes_collateral_and_tokens() {
        let mut balances = funded("a", 20, 10);
        balances
            .handle_event(&EmpEvent::try_from(&log(
                1,
                "LiquidationCreated",
                vec![
                    json!("a"),
                    json!("liquidator"),
                    json!("0"),
                    json!("6"),
                    json!("20"),
                    json!("12"),
                    json!("100"),
                ],
            ))
            .unwrap())
            .unwrap();
        assert_eq!(balances.collateral.get("a").unwrap(), &BigInt::from(8));
        assert_eq!(balances.tokens.get("a").unwrap(), &BigInt::from(4));
        assert_eq!(balances.collateral.total(), &BigInt::from(8));
        assert_eq!(balances.tokens.total(), &BigInt::from(4));
    }

    #[test]
    fn test_request_withdrawal_executed() {
        let mut balances = funded("a", 20, 10);
        balances
            .handle_event(&EmpEvent::RequestWithdrawal)
            .unwrap();
        assert_eq!(balances.collateral.total(), &BigInt::from(20));

        balances
            .handle_event(&EmpEvent::RequestWithdrawalExecuted {
                sponsor: "a".into(),
                collateral: BigInt::from(15),
            })
            .unwrap();
        assert_eq!(balances.collateral.get("a").unwrap(), &BigInt::from(5));
        assert_eq!(balances.collateral.total(), &BigInt::from(5));
        // tokens are untouched by collateral withdrawals
        assert_eq!(balances.tokens.get("a").unwrap(), &BigInt::from(10));
    }

    #[test]
    fn test_transfer_moves_tokens() {
        let mut balances = funded("a", 20, 10);
        balances.tokens.add("b", &BigInt::from(3)).unwrap();
        balances
            .handle_event(&EmpEvent::RequestTransferPositionExecuted {
                old_sponsor: "a".into(),
                new_sponsor: "c".into(),
            })
            .unwrap();
        assert_eq!(balances.tokens.get("a").unwrap(), &BigInt::from(0));
        assert_eq!(balances.tokens.get("c").unwrap(), &BigInt::from(10));
        assert_eq!(balances.tokens.get("b").unwrap(), &BigInt::from(3));
        assert_eq!(balances.tokens.total(), &BigInt::from(13));
        assert_eq!(balances.collateral.get("c").unwrap(), &BigInt::from(20));
        assert_eq!(balances.collateral.total(), &BigInt::from(20));
    }

    #[test]
    fn test_transfer_from_unknown_sponsor_leaves_state() {
        let mut balances = funded("a", 20, 10);
        let before = balances.clone();
        assert!(
            balances
                .handle_event(&EmpEvent::RequestTransferPositionExecuted {
                    old_sponsor: "unknown".into(),
                    new_sponsor: "c".into(),
                })
                .is_err()
        );
        assert_eq!(balances, before);
        assert!(!balances.tokens.has("c"));
    }

    #[test]
    fn test_settlement_may_go_negative() {
        let mut balances = EmpBalances::new();
        balances
            .handle_event(&EmpEvent::SettleExpiredPosition {
                caller: "x".into(),
                collateral: BigInt::from(1),
                tokens: BigInt::from(1),
            })
            .unwrap();
        assert_eq!(balances.tokens.get("x").unwrap(), &BigInt::from(-1));
    }

    #[test]
    fn test_handler_errors_name_event() {
        let mut balances = EmpBalances::new();
        let err = balances
            .handle_event(&EmpEvent::RequestTransferPositionExecuted {
                old_sponsor: "missing".into(),
                new_sponsor: "b".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Handler { ref event, .. } if event == "RequestTransferPositionExecuted"));
    }

    #[test]
    fn test_history_snapshots_previous_block() {
        let mut history = EmpBalancesHistory::new();
        history
            .handle_event(&log(0, "PositionCreated", vec![json!("a"), json!("2"), json!("1")]))
            .unwrap();
        history
            .handle_event(&log(0, "Deposit", vec![json!("a"), json!("1")]))
            .unwrap();
        history
            .handle_event(&log(4, "SettleExpiredPosition", vec![json!("a"), json!("3"), json!("1")]))
            .unwrap();
        assert_eq!(history.history.len(), 1);

        history.finalize();
        history.finalize();
        assert_eq!(history.history.len(), 2);

        let first = history.history.lookup(3).unwrap();
        assert_eq!(first.block_number, 0);
        assert_eq!(first.payload.total_collateral(), BigInt::from(3));
        let last = history.history.lookup(9).unwrap();
        assert_eq!(last.payload.total_collateral(), BigInt::from(0));
        assert_eq!(last.payload.total_tokens(), BigInt::from(0));
    }

    #[test]
    fn test_history_rejects_out_of_order() {
        let mut history = EmpBalancesHistory::new();
        history
            .handle_event(&log(5, "ContractExpired", vec![]))
            .unwrap();
        assert!(matches!(
            history.handle_event(&log(4, "ContractExpired", vec![])),
            Err(Error::OutOfOrder {
                block: 4,
                previous: 5
            })
        ));
    }

    #[test]
    fn test_finalize_empty_history() {
        let mut history = EmpBalancesHistory::new();
        history.finalize();
        assert!(history.history.is_empty());
        assert_eq!(history.last_block(), None);
    }
}
