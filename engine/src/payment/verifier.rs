//! # PaymentVerifier
//!
//! Decides whether a transaction pays for a content item and, if so, records
//! it exactly once. The pipeline fails closed: any step that can't prove the
//! payment rejects it.
//!
//! ```text
//! fetch facts ─▶ succeeded? ─▶ load item + owner + payer ─▶ payer signed?
//!     ─▶ owner's recipient account present? ─▶ transferred >= price?
//!     ─▶ (split invoked) shares within tolerance? ─▶ insert record
//! ```
//!
//! ## Replays
//!
//! There is no "has this reference been used?" pre-check. The store's
//! uniqueness constraint on the transaction reference is the single
//! authority: we insert, and a conflict means someone got there first. Two
//! racing verifications of one transaction therefore produce exactly one
//! record and one `AlreadyExists`.
//!
//! A reference is only credited to an identity whose wallet signed the
//! transaction, so a reference seen on chain can't be claimed by a third
//! party ahead of the real payer.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{PaymentAsset, RevenueSplit};
use crate::crypto::Address;
use crate::error::{Error, Result};
use crate::ledger::{LedgerObserver, TransactionFacts};
use crate::model::{PaymentRecord, ShareGrant};
use crate::storage::{Store, StoreError};

#[derive(Clone)]
pub struct PaymentVerifier {
    store: Arc<dyn Store>,
    observer: LedgerObserver,
    asset: PaymentAsset,
    split: Option<RevenueSplit>,
}

impl PaymentVerifier {
    pub fn new(
        store: Arc<dyn Store>,
        observer: LedgerObserver,
        asset: PaymentAsset,
        split: Option<RevenueSplit>,
    ) -> Self {
        Self {
            store,
            observer,
            asset,
            split,
        }
    }

    pub fn asset(&self) -> PaymentAsset {
        self.asset
    }

    /// Verify `reference` as payment by `payer_id` for `content_item_id` and
    /// persist the resulting record.
    pub async fn verify(
        &self,
        content_item_id: Uuid,
        payer_id: Uuid,
        reference: &str,
    ) -> Result<PaymentRecord> {
        self.settle(content_item_id, payer_id, reference, None).await
    }

    /// Like [`verify`](Self::verify), but `grant` is stored in the same
    /// transaction as the payment record. If the grant can't be written the
    /// payment isn't recorded either, so the reference can be tried again.
    pub async fn verify_with_grant(
        &self,
        content_item_id: Uuid,
        payer_id: Uuid,
        reference: &str,
        grant: &ShareGrant,
    ) -> Result<PaymentRecord> {
        self.settle(content_item_id, payer_id, reference, Some(grant)).await
    }

    #[instrument(skip(self, grant))]
    async fn settle(
        &self,
        content_item_id: Uuid,
        payer_id: Uuid,
        reference: &str,
        grant: Option<&ShareGrant>,
    ) -> Result<PaymentRecord> {
        let reference = reference.trim();
        let facts = self.observer.fetch_transaction(reference).await?;
        if !facts.succeeded {
            return Err(Error::validation("Transaction failed on-chain"));
        }

        let item = self
            .store
            .find_content(content_item_id)?
            .filter(|item| !item.is_deleted())
            .ok_or_else(|| Error::not_found("Content not found"))?;
        let owner = item
            .owner_id
            .map(|id| self.store.find_identity(id))
            .transpose()?
            .flatten()
            .ok_or_else(|| Error::not_found("Content owner not found"))?;
        let payer = self
            .store
            .find_identity(payer_id)?
            .ok_or_else(|| Error::not_found("Identity not found"))?;
        if !facts.is_signer(&payer.wallet_address) {
            warn!(content_id = %item.id, payer_id = %payer_id, "payment not signed by the payer");
            return Err(Error::validation("Transaction was not signed by the payer"));
        }

        let amount = self
            .check_transfer(&facts, item.price_amount, &owner.wallet_address)
            .map_err(|e| {
                warn!(content_id = %item.id, payer_id = %payer_id, reason = %e, "payment rejected");
                e
            })?;

        let record = PaymentRecord::new(item.id, payer_id, amount, reference);
        let inserted = match grant {
            Some(grant) => self.store.insert_payment_with_grant(&record, grant),
            None => self.store.insert_payment(&record),
        };
        inserted.map_err(|e| match e {
            StoreError::Conflict(what) => Error::AlreadyExists(what),
            other => other.into(),
        })?;

        info!(
            content_id = %item.id,
            payer_id = %payer_id,
            amount = amount,
            "payment verified"
        );
        Ok(record)
    }

    /// Check that `facts` pay at least `price` to `owner`, honoring the
    /// revenue split when the transaction went through it. Returns the
    /// transferred amount.
    pub fn check_transfer(&self, facts: &TransactionFacts, price: u64, owner: &Address) -> Result<u64> {
        let author_account = self.recipient_account(owner)?;
        if !facts.contains_account(&author_account) {
            return Err(Error::validation("Invalid payment recipient"));
        }
        let author_delta = self.asset.observed_delta(facts, &author_account);

        let split = self
            .split
            .as_ref()
            .filter(|split| facts.invokes(&split.program_id));
        let platform = match split {
            Some(split) => {
                let account = self.recipient_account(&split.platform_wallet)?;
                Some((split, self.asset.observed_delta(facts, &account)))
            }
            None => None,
        };

        let transferred = author_delta + platform.map_or(0, |(_, delta)| delta);
        if transferred < i128::from(price) {
            return Err(Error::validation("Insufficient payment amount"));
        }
        let transferred =
            u64::try_from(transferred).map_err(|_| Error::validation("Invalid payment amount"))?;

        if let Some((split, platform_delta)) = platform {
            let (author_share, platform_share) = split.expected_shares(transferred);
            let author_check = (
                split.within_tolerance(author_delta, author_share, transferred),
                "Author received an incorrect amount",
            );
            let platform_check = (
                split.within_tolerance(platform_delta, platform_share, transferred),
                "Platform received an incorrect amount",
            );
            // Both drifts mirror each other, so blame whichever party came up short.
            let checks = if platform_delta < i128::from(platform_share) {
                [platform_check, author_check]
            } else {
                [author_check, platform_check]
            };
            if let Some((_, message)) = checks.into_iter().find(|(ok, _)| !ok) {
                return Err(Error::validation(message));
            }
        }

        Ok(transferred)
    }

    fn recipient_account(&self, owner: &Address) -> Result<Address> {
        self.asset
            .recipient_account(owner)
            .map_err(|e| Error::Internal(format!("recipient derivation failed: {e}")))
    }
}
