//! Bounty locks granted for successful disputes.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::Epoch;

/// The on-chain lock a dispute bounty sits behind until it can be
/// redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyLock {
    /// Locked reward. Zero once redeemed.
    pub amount: U256,
    /// First epoch at which `redeemBounty` will succeed.
    pub redeem_after: Epoch,
    /// Address the bounty was granted to.
    pub bounty_hunter: Address,
}

impl BountyLock {
    /// Epochs left before the bounty can be redeemed, zero if already
    /// redeemable.
    pub fn epochs_until_redeemable(&self, current: Epoch) -> Epoch {
        self.redeem_after.saturating_sub(current)
    }

    /// True once the reward has been paid out (or was never granted).
    pub fn is_spent(&self) -> bool {
        self.amount == U256::ZERO
    }
}
