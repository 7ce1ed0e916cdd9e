mod common;

use affiliate_rewards::{
    Error,
    calculator::{
        RunDefaults,
        dappmining::{DappMining, DappMiningConfig},
    },
};
use common::{Chain, blocks, create, log, position_created};
use rust_decimal::dec;

const EMP: &str = "0xEMP";

fn config(whitelist: &[&str]) -> DappMiningConfig {
    DappMiningConfig {
        emp_address: EMP.to_string(),
        default_address: "0xDEF".to_string(),
        start_time: 0,
        end_time: 9,
        whitelist: whitelist.iter().map(|tag| tag.to_string()).collect(),
        total_rewards: dec!(100),
        first_emp_date: Some(0),
    }
}

fn chain() -> Chain {
    Chain::new(blocks(10))
        .with_traces(
            EMP,
            vec![
                create(0, "0xuser1", 10, 100, Some("0xD1")),
                create(0, "0xuser2", 10, 100, Some("0xd2")),
                create(5, "0xuser3", 5, 50, None),
            ],
        )
        .with_logs(
            EMP,
            vec![
                position_created(0, "0xuser1", 10, 100),
                position_created(0, "0xuser2", 10, 100),
                position_created(5, "0xuser3", 5, 50),
            ],
        )
}

#[test]
fn test_rewards_follow_weighted_balances() {
    let dappmining = DappMining::new(chain().into_mock(), RunDefaults::default());
    let rewards = dappmining.get_rewards(&config(&["0xD1", "0xD2"])).unwrap();

    assert_eq!(rewards.start_block.number, 0);
    assert_eq!(rewards.end_block.number, 9);
    assert_eq!(rewards.rewards.len(), 3);
    assert_eq!(rewards.rewards["0xd1"], "45");
    assert_eq!(rewards.rewards["0xd2"], "45");
    assert_eq!(rewards.rewards["0xdef"], "10");
}

#[test]
fn test_tags_outside_whitelist_are_not_paid() {
    let dappmining = DappMining::new(chain().into_mock(), RunDefaults::default());
    let rewards = dappmining.get_rewards(&config(&["0xd1", "0xnobody"])).unwrap();

    assert_eq!(rewards.rewards["0xd1"], "45");
    assert!(!rewards.rewards.contains_key("0xd2"));
    assert!(!rewards.rewards.contains_key("0xnobody"));
}

#[test]
fn test_reverted_creates_are_ignored() {
    let mut reverted = create(0, "0xuser1", 10, 100, Some("0xd2"));
    reverted.error = Some("revert".to_string());
    let chain = Chain::new(blocks(10))
        .with_traces(
            EMP,
            vec![reverted, create(0, "0xuser1", 10, 100, Some("0xd1"))],
        )
        .with_logs(EMP, vec![position_created(0, "0xuser1", 10, 100)]);
    let dappmining = DappMining::new(chain.into_mock(), RunDefaults::default());

    let rewards = dappmining.get_rewards(&config(&["0xd1", "0xd2"])).unwrap();
    assert_eq!(rewards.rewards["0xd1"], "100");
    assert!(!rewards.rewards.contains_key("0xd2"));
}

#[test]
fn test_single_block_window_fails() {
    let dappmining = DappMining::new(chain().into_mock(), RunDefaults::default());
    let mut config = config(&["0xd1"]);
    config.start_time = 9;
    config.end_time = 10;
    assert!(matches!(
        dappmining.get_rewards(&config),
        Err(Error::InvalidWindow { start: 9, end: 9 })
    ));
}

#[test]
fn test_unattributed_balance_fails() {
    let chain = Chain::new(blocks(10))
        .with_traces(EMP, vec![create(0, "0xuser1", 10, 10, Some("0xd1"))])
        .with_logs(EMP, vec![position_created(0, "0xuser1", 10, 100)]);
    let dappmining = DappMining::new(chain.into_mock(), RunDefaults::default());

    let err = dappmining.get_rewards(&config(&["0xd1"])).unwrap_err();
    assert!(matches!(err, Error::Entity { block: 9, .. }));
}

#[test]
fn test_settlement_after_expiry_keeps_sponsor_rewards() {
    let chain = Chain::new(blocks(10))
        .with_traces(EMP, vec![create(0, "0xsponsor", 10, 10, Some("0xd1"))])
        .with_logs(
            EMP,
            vec![
                position_created(0, "0xsponsor", 10, 10),
                log(2, "ContractExpired", &[]),
                log(3, "SettleExpiredPosition", &["0xbuyer", "4", "4"]),
            ],
        );
    let dappmining = DappMining::new(chain.into_mock(), RunDefaults::default());

    let rewards = dappmining.get_rewards(&config(&["0xd1"])).unwrap();
    assert_eq!(rewards.rewards.len(), 1);
    assert_eq!(rewards.rewards["0xd1"], "100");
}
