use crate::cli::{
    common::{PayoutRecord, payout_records},
    traits::Exportable,
};
use affiliate_rewards::calculator::{dappmining::DappMiningRewards, devmining::DevMiningRewards};

impl Exportable for DevMiningRewards {
    type Row = PayoutRecord;

    fn rows(&self) -> Vec<PayoutRecord> {
        let mut rows = payout_records("deployer", &self.deployer_payouts);
        rows.extend(payout_records("emp", &self.emp_payouts));
        rows
    }

    fn file_stem(&self) -> String {
        format!(
            "devmining-{}-{}",
            self.start_block.number, self.end_block.number
        )
    }
}

impl Exportable for DappMiningRewards {
    type Row = PayoutRecord;

    fn rows(&self) -> Vec<PayoutRecord> {
        payout_records("tag", &self.rewards)
    }

    fn file_stem(&self) -> String {
        format!(
            "dappmining-{}-{}",
            self.start_block.number, self.end_block.number
        )
    }
}
