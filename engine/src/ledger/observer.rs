//! # LedgerObserver
//!
//! The engine's only window onto the payment rail. It validates the
//! reference, bounds the lookup in time, and hands back parsed
//! [`TransactionFacts`]. It never writes anything anywhere.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Ledger, LedgerError, TransactionFacts};
use crate::config::TRANSACTION_REFERENCE_LENGTH;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct LedgerObserver {
    ledger: Arc<dyn Ledger>,
    timeout: Duration,
}

impl std::fmt::Debug for LedgerObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerObserver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Check that `reference` looks like a transaction signature: base58 of
/// exactly 64 bytes.
pub fn validate_reference(reference: &str) -> Result<()> {
    match bs58::decode(reference).into_vec() {
        Ok(bytes) if bytes.len() == TRANSACTION_REFERENCE_LENGTH => Ok(()),
        _ => Err(Error::validation("Invalid transaction signature")),
    }
}

impl LedgerObserver {
    pub fn new(ledger: Arc<dyn Ledger>, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    /// Fetch and parse the finalized transaction `reference`.
    ///
    /// * `Validation`: the reference isn't a signature.
    /// * `NotFound`: the rail doesn't know it, or it isn't finalized yet.
    /// * `Unavailable`: timeout or RPC failure.
    /// * `Internal`: the rail answered with something unparseable.
    pub async fn fetch_transaction(&self, reference: &str) -> Result<TransactionFacts> {
        let reference = reference.trim();
        validate_reference(reference)?;

        let lookup = self.ledger.get_finalized_transaction(reference);
        let raw = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result.map_err(|e| {
                warn!(reference = %reference, error = %e, "ledger lookup failed");
                Error::from(e)
            })?,
            Err(_) => {
                warn!(reference = %reference, timeout = ?self.timeout, "ledger lookup timed out");
                return Err(LedgerError::Timeout(self.timeout).into());
            }
        };

        let raw = raw.ok_or_else(|| Error::not_found("Transaction not found"))?;
        let facts = TransactionFacts::from_raw(reference, raw)?;
        debug!(
            reference = %reference,
            slot = facts.slot,
            succeeded = facts.succeeded,
            "transaction observed"
        );
        Ok(facts)
    }
}
