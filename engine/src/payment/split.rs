//! # Revenue Split
//!
//! The fund-split program divides a payment between author and platform:
//! `author = floor(amount * author_share_bps / 10_000)`, platform gets the
//! remainder. That program is not ours, so we don't trust it. Given the
//! observed total we recompute both shares and check each observed delta
//! against them.
//!
//! Tolerance is measured against the transferred total: with the defaults
//! (90 %, 1 %) and 1 000 units transferred, any author amount in 890..=910
//! passes.

use serde::{Deserialize, Serialize};

use crate::config::{
    BPS_DENOMINATOR, DEFAULT_AUTHOR_SHARE_BPS, DEFAULT_TOLERANCE_BPS, FUND_SPLIT_PROGRAM_ID,
};
use crate::crypto::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    /// Program whose invocation marks a payment as split.
    #[serde(default = "default_program_id")]
    pub program_id: Address,
    /// Wallet receiving the platform share.
    pub platform_wallet: Address,
    #[serde(default = "default_author_share_bps")]
    pub author_share_bps: u16,
    #[serde(default = "default_tolerance_bps")]
    pub tolerance_bps: u16,
}

fn default_program_id() -> Address {
    FUND_SPLIT_PROGRAM_ID
}

fn default_author_share_bps() -> u16 {
    DEFAULT_AUTHOR_SHARE_BPS
}

fn default_tolerance_bps() -> u16 {
    DEFAULT_TOLERANCE_BPS
}

impl RevenueSplit {
    /// The standard 90/10 split through the fund-split program.
    pub fn new(platform_wallet: Address) -> Self {
        Self {
            program_id: FUND_SPLIT_PROGRAM_ID,
            platform_wallet,
            author_share_bps: DEFAULT_AUTHOR_SHARE_BPS,
            tolerance_bps: DEFAULT_TOLERANCE_BPS,
        }
    }

    /// Expected `(author, platform)` shares of `transferred`.
    pub fn expected_shares(&self, transferred: u64) -> (u64, u64) {
        let author = u128::from(transferred) * u128::from(self.author_share_bps)
            / u128::from(BPS_DENOMINATOR);
        // author <= transferred because author_share_bps <= 10 000.
        let author = author as u64;
        (author, transferred - author)
    }

    /// Whether `observed` is close enough to `expected`.
    pub fn within_tolerance(&self, observed: i128, expected: u64, transferred: u64) -> bool {
        let drift = (observed - i128::from(expected)).unsigned_abs();
        drift * u128::from(BPS_DENOMINATOR)
            <= u128::from(transferred) * u128::from(self.tolerance_bps)
    }
}
