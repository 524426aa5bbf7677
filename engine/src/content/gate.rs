//! # ContentGate
//!
//! Decides how much of an item's body a requester gets to see. The rules
//! are checked in order and the first match wins:
//!
//! | # | Condition                                   | Result   |
//! |---|---------------------------------------------|----------|
//! | 1 | price is zero                               | full     |
//! | 2 | share token names a live grant for the item | full     |
//! | 3 | requester owns the item                     | full     |
//! | 4 | requester has a payment record for the item | full     |
//! | 5 | anything else (including anonymous readers) | preview  |
//!
//! The preview is the first [`PREVIEW_LENGTH`] Unicode scalar values of the
//! stored body, with no markup awareness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PREVIEW_LENGTH;
use crate::error::Result;
use crate::model::ContentItem;
use crate::share::live_grant;
use crate::storage::Store;

/// Which gate rule let the requester in, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessBasis {
    Free,
    ShareGrant,
    Owner,
    Paid,
    Preview,
}

impl AccessBasis {
    pub fn is_unlocked(self) -> bool {
        !matches!(self, AccessBasis::Preview)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessBasis::Free => "free",
            AccessBasis::ShareGrant => "share_grant",
            AccessBasis::Owner => "owner",
            AccessBasis::Paid => "paid",
            AccessBasis::Preview => "preview",
        }
    }
}

impl fmt::Display for AccessBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First [`PREVIEW_LENGTH`] characters of `body`.
pub fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_LENGTH).collect()
}

#[derive(Clone)]
pub struct ContentGate {
    store: Arc<dyn Store>,
}

impl ContentGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Which rule, if any, unlocks `item` for this requester.
    ///
    /// A share token that isn't a UUID, names another item or has expired is
    /// simply not a match; evaluation carries on with the next rule.
    pub fn access(
        &self,
        item: &ContentItem,
        requester: Option<Uuid>,
        share_token: Option<&str>,
    ) -> Result<AccessBasis> {
        if item.is_free() {
            return Ok(AccessBasis::Free);
        }

        if let Some(token) = share_token {
            if live_grant(self.store.as_ref(), token, item.id)?.is_some() {
                return Ok(AccessBasis::ShareGrant);
            }
        }

        if let Some(requester) = requester {
            if item.is_owned_by(requester) {
                return Ok(AccessBasis::Owner);
            }
            if self.store.has_payment(item.id, requester)? {
                return Ok(AccessBasis::Paid);
            }
        }

        Ok(AccessBasis::Preview)
    }

    /// The body text this requester is allowed to see.
    pub fn resolve_visible_body(
        &self,
        item: &ContentItem,
        requester: Option<Uuid>,
        share_token: Option<&str>,
    ) -> Result<String> {
        let basis = self.access(item, requester, share_token)?;
        Ok(if basis.is_unlocked() {
            item.body.clone()
        } else {
            preview(&item.body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Address;
    use crate::model::{NewContentItem, PaymentRecord, ShareGrant};
    use crate::storage::SledStore;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<SledStore>,
        gate: ContentGate,
        owner: Uuid,
        reader: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let owner = store.issue_challenge(&Address::new([1u8; 32]), "1").unwrap().id;
        let reader = store.issue_challenge(&Address::new([2u8; 32]), "2").unwrap().id;
        Fixture {
            gate: ContentGate::new(store.clone()),
            store,
            owner,
            reader,
        }
    }

    fn item(owner: Uuid, price: u64, body: &str) -> ContentItem {
        ContentItem::new(
            owner,
            NewContentItem {
                title: "Title".into(),
                body: body.into(),
                image_url: None,
                price_amount: price,
            },
        )
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let body = "é".repeat(400);
        let cut = preview(&body);
        assert_eq!(cut.chars().count(), PREVIEW_LENGTH);
        assert_eq!(cut.len(), PREVIEW_LENGTH * 2);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn free_items_are_open_to_everyone() {
        let fx = fixture();
        let item = item(fx.owner, 0, &"a".repeat(1000));
        assert_eq!(fx.gate.access(&item, None, None).unwrap(), AccessBasis::Free);
        assert_eq!(fx.gate.resolve_visible_body(&item, None, None).unwrap().len(), 1000);
    }

    #[test]
    fn anonymous_readers_get_the_preview() {
        let fx = fixture();
        let item = item(fx.owner, 10, &"a".repeat(1000));
        assert_eq!(fx.gate.access(&item, None, None).unwrap(), AccessBasis::Preview);
        assert_eq!(fx.gate.resolve_visible_body(&item, None, None).unwrap(), "a".repeat(300));
    }

    #[test]
    fn owner_and_payer_see_everything() {
        let fx = fixture();
        let item = item(fx.owner, 10, &"a".repeat(1000));
        fx.store.put_content(&item).unwrap();

        assert_eq!(fx.gate.access(&item, Some(fx.owner), None).unwrap(), AccessBasis::Owner);
        assert_eq!(fx.gate.access(&item, Some(fx.reader), None).unwrap(), AccessBasis::Preview);

        fx.store
            .insert_payment(&PaymentRecord::new(item.id, fx.reader, 10, "ref-1"))
            .unwrap();
        assert_eq!(fx.gate.access(&item, Some(fx.reader), None).unwrap(), AccessBasis::Paid);
    }

    #[test]
    fn payment_for_another_item_does_not_unlock() {
        let fx = fixture();
        let paid = item(fx.owner, 10, "paid body");
        let other = item(fx.owner, 10, "other body");
        fx.store
            .insert_payment(&PaymentRecord::new(paid.id, fx.reader, 10, "ref-2"))
            .unwrap();
        assert_eq!(fx.gate.access(&other, Some(fx.reader), None).unwrap(), AccessBasis::Preview);
    }

    #[test]
    fn live_share_grant_unlocks_for_anyone() {
        let fx = fixture();
        let item = item(fx.owner, 10, &"a".repeat(1000));
        let grant = ShareGrant::new(item.id, None);
        fx.store.insert_share_grant(&grant).unwrap();

        let token = grant.token.to_string();
        assert_eq!(fx.gate.access(&item, None, Some(&token)).unwrap(), AccessBasis::ShareGrant);
    }

    #[test]
    fn bad_share_tokens_fall_through_to_the_preview() {
        let fx = fixture();
        let item = item(fx.owner, 10, &"a".repeat(1000));
        let elsewhere = ShareGrant::new(Uuid::new_v4(), None);
        let mut expired = ShareGrant::new(item.id, Some(Duration::seconds(60)));
        expired.expires_at = Some(Utc::now() - Duration::seconds(1));
        fx.store.insert_share_grant(&elsewhere).unwrap();
        fx.store.insert_share_grant(&expired).unwrap();

        for token in [
            "not-a-uuid".to_string(),
            Uuid::new_v4().to_string(),
            elsewhere.token.to_string(),
            expired.token.to_string(),
        ] {
            assert_eq!(
                fx.gate.access(&item, None, Some(&token)).unwrap(),
                AccessBasis::Preview,
                "token {token} should not unlock"
            );
        }
    }

    #[test]
    fn expired_grant_still_lets_the_owner_in() {
        let fx = fixture();
        let item = item(fx.owner, 10, "body");
        let mut expired = ShareGrant::new(item.id, None);
        expired.expires_at = Some(Utc::now() - Duration::seconds(1));
        fx.store.insert_share_grant(&expired).unwrap();

        let token = expired.token.to_string();
        assert_eq!(
            fx.gate.access(&item, Some(fx.owner), Some(&token)).unwrap(),
            AccessBasis::Owner
        );
    }
}
