//! # SharableLinkIssuer
//!
//! Share grants turn "I can read this" into a bearer link anyone can open.
//! Owners share freely. Anyone else has to present the payment transaction
//! along with the request, and that transaction goes through the full
//! [`PaymentVerifier`] pipeline, so one payment buys one share at most. The
//! grant is written in the same store transaction as that payment, so a
//! failed write spends nothing.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Session;
use crate::config::seconds;
use crate::error::{Error, Result};
use crate::model::ShareGrant;
use crate::payment::PaymentVerifier;
use crate::storage::Store;

#[derive(Clone)]
pub struct SharableLinkIssuer {
    store: Arc<dyn Store>,
    verifier: PaymentVerifier,
    ttl: Option<Duration>,
}

impl SharableLinkIssuer {
    pub fn new(store: Arc<dyn Store>, verifier: PaymentVerifier, ttl_secs: Option<u64>) -> Self {
        Self {
            store,
            verifier,
            ttl: ttl_secs.map(seconds),
        }
    }

    /// Mint a share grant for `content_item_id` on behalf of `requester`.
    #[instrument(skip(self, requester), fields(requester = %requester.identity_id))]
    pub async fn issue(
        &self,
        content_item_id: Uuid,
        requester: &Session,
        reference: Option<&str>,
    ) -> Result<ShareGrant> {
        let item = self
            .store
            .find_content(content_item_id)?
            .filter(|item| !item.is_deleted())
            .ok_or_else(|| Error::not_found("Content not found"))?;

        let grant = ShareGrant::new(item.id, self.ttl);
        if item.is_owned_by(requester.identity_id) {
            self.store.insert_share_grant(&grant)?;
        } else {
            let reference = reference
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| Error::validation("Transaction signature is missing"))?;
            self.verifier
                .verify_with_grant(item.id, requester.identity_id, reference, &grant)
                .await?;
        }
        info!(content_id = %item.id, token = %grant.token, "share grant issued");
        Ok(grant)
    }

    /// The grant behind `token`, if it exists, belongs to `content_item_id`
    /// and hasn't expired.
    pub fn redeem(&self, token: &str, content_item_id: Uuid) -> Result<Option<ShareGrant>> {
        live_grant(self.store.as_ref(), token, content_item_id)
    }
}

/// Resolve a bearer share token against `content_item_id`. Tokens that
/// aren't UUIDs, are unknown, name another item or have expired yield
/// `None`.
pub fn live_grant(
    store: &dyn Store,
    token: &str,
    content_item_id: Uuid,
) -> Result<Option<ShareGrant>> {
    let Ok(token) = Uuid::parse_str(token.trim()) else {
        return Ok(None);
    };
    let now = Utc::now();
    Ok(store
        .find_share_grant(token)?
        .filter(|grant| grant.unlocks(content_item_id, now)))
}
