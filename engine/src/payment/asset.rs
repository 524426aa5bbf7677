//! The asset content is priced in.

use serde::{Deserialize, Serialize};

use crate::config::USDT_MINT;
use crate::crypto::{associated_token_address, Address, DerivationError};
use crate::ledger::TransactionFacts;

/// What a payment is made in.
///
/// Native payments credit the recipient's wallet directly. Token payments
/// credit the recipient's associated token account for `mint`, so that's
/// where we look for the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PaymentAsset {
    Native,
    Token { mint: Address },
}

impl Default for PaymentAsset {
    fn default() -> Self {
        PaymentAsset::Token { mint: USDT_MINT }
    }
}

impl PaymentAsset {
    /// The account whose balance moves when `owner` is paid.
    pub fn recipient_account(&self, owner: &Address) -> Result<Address, DerivationError> {
        match self {
            PaymentAsset::Native => Ok(*owner),
            PaymentAsset::Token { mint } => associated_token_address(owner, mint),
        }
    }

    /// Net amount `recipient_account` gained in this asset.
    pub fn observed_delta(&self, facts: &TransactionFacts, recipient_account: &Address) -> i128 {
        match self {
            PaymentAsset::Native => facts.native_delta(recipient_account),
            PaymentAsset::Token { mint } => facts.token_delta(recipient_account, mint),
        }
    }
}

impl std::fmt::Display for PaymentAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentAsset::Native => f.write_str("native"),
            PaymentAsset::Token { mint } => write!(f, "token({mint})"),
        }
    }
}
