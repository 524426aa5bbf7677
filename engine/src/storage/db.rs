//! # SledStore: Embedded Record Store
//!
//! The in-tree [`Store`] implementation, built on sled's embedded key-value
//! store. All records are bincode-encoded.
//!
//! ## Tree Layout
//!
//! | Tree                  | Key                              | Value                   |
//! |-----------------------|----------------------------------|-------------------------|
//! | `identities`          | `identity_id` (16B)              | `bincode(Identity)`     |
//! | `identity_wallets`    | `wallet` (32B)                   | `identity_id` (16B)     |
//! | `usernames`           | lowercase username (UTF-8)       | `identity_id` (16B)     |
//! | `challenges`          | `identity_id` (16B)              | `bincode(Challenge)`    |
//! | `content`             | `content_id` (16B)               | `bincode(ContentItem)`  |
//! | `payments`            | `payment_id` (16B)               | `bincode(PaymentRecord)`|
//! | `payment_refs`        | transaction reference (UTF-8)    | `payment_id` (16B)      |
//! | `payments_by_content` | `content ‖ payer ‖ payment` (48B)| empty                   |
//! | `payments_by_payer`   | `payer ‖ payment` (32B)          | empty                   |
//! | `share_grants`        | `token` (16B)                    | `bincode(ShareGrant)`   |
//!
//! The two `payments_by_*` trees are pure indexes. Because the content id
//! leads the composite key, "has this reader paid for this item?" is a
//! single prefix scan.
//!
//! ## Atomicity
//!
//! Every write that touches a uniqueness rule runs inside one multi-tree
//! sled transaction: the existence check and all the index writes commit
//! together or not at all. sled transactions are serializable, so two racing
//! inserts of the same transaction reference cannot both commit.
//!
//! Challenges live in their own tree so that consuming one is a plain
//! `compare_and_swap` against the exact bytes of the nonce that was verified.
//!
//! Content edits are a single-tree transaction that rereads the item, so a
//! soft delete committed by another writer is seen before anything is
//! written back.

use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionResult, TransactionalTree,
    UnabortableTransactionError,
};
use sled::{Db, IVec, Transactional, Tree};
use std::cmp::Ordering;
use std::path::Path;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::crypto::Address;
use crate::model::{
    Challenge, ContentItem, ContentQuery, Identity, PaymentRecord, ProfileUpdate, Role, ShareGrant,
};

// ---------------------------------------------------------------------------
// Codec helpers
// ---------------------------------------------------------------------------

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_id(bytes: &[u8]) -> StoreResult<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn abort(err: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err)
}

fn finish<T>(result: TransactionResult<T, StoreError>) -> StoreResult<T> {
    result.map_err(|e| match e {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Sled(err),
    })
}

fn load_identity(
    identities: &TransactionalTree,
    key: &[u8],
) -> Result<Identity, ConflictableTransactionError<StoreError>> {
    let bytes: Option<IVec> = identities.get(key).map_err(unabortable)?;
    let bytes = bytes.ok_or_else(|| abort(StoreError::NotFound("Identity not found".into())))?;
    decode(&bytes).map_err(abort)
}

fn unabortable(e: UnabortableTransactionError) -> ConflictableTransactionError<StoreError> {
    e.into()
}

fn payment_content_key(record: &PaymentRecord) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(record.content_item_id.as_bytes());
    key.extend_from_slice(record.payer_id.as_bytes());
    key.extend_from_slice(record.id.as_bytes());
    key
}

fn payment_payer_key(record: &PaymentRecord) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(record.payer_id.as_bytes());
    key.extend_from_slice(record.id.as_bytes());
    key
}

/// Pinned items first (earliest pin first), then newest first.
fn listing_order(a: &ContentItem, b: &ContentItem) -> Ordering {
    match (a.pinned_at, b.pinned_at) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| b.created_at.cmp(&a.created_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    }
}

// ---------------------------------------------------------------------------
// SledStore
// ---------------------------------------------------------------------------

/// Persistent record store for Quill.
///
/// sled is thread-safe, so a `SledStore` can be shared across request
/// handlers via `Arc<SledStore>` without external locking.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    identities: Tree,
    identity_wallets: Tree,
    usernames: Tree,
    challenges: Tree,
    content: Tree,
    payments: Tree,
    payment_refs: Tree,
    payments_by_content: Tree,
    payments_by_payer: Tree,
    share_grants: Tree,
}

impl SledStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary directory and disappears on drop.
    /// Ideal for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            identities: db.open_tree("identities")?,
            identity_wallets: db.open_tree("identity_wallets")?,
            usernames: db.open_tree("usernames")?,
            challenges: db.open_tree("challenges")?,
            content: db.open_tree("content")?,
            payments: db.open_tree("payments")?,
            payment_refs: db.open_tree("payment_refs")?,
            payments_by_content: db.open_tree("payments_by_content")?,
            payments_by_payer: db.open_tree("payments_by_payer")?,
            share_grants: db.open_tree("share_grants")?,
            db,
        })
    }

    fn get_decoded<T: serde::de::DeserializeOwned>(
        tree: &Tree,
        key: &[u8],
    ) -> StoreResult<Option<T>> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn payment_by_id(&self, id: &[u8]) -> StoreResult<Option<PaymentRecord>> {
        Self::get_decoded(&self.payments, id)
    }

    /// The payment insert behind both `insert_payment*` methods. The grant,
    /// when present, shares the transaction with the payment indexes.
    fn record_payment(&self, record: &PaymentRecord, grant: Option<&ShareGrant>) -> StoreResult<()> {
        let id = *record.id.as_bytes();
        let bytes = encode(record)?;
        let reference = record.transaction_reference.as_bytes();
        let content_key = payment_content_key(record);
        let payer_key = payment_payer_key(record);
        let grant = match grant {
            Some(grant) => Some((*grant.token.as_bytes(), encode(grant)?)),
            None => None,
        };

        let result = (
            &self.payments,
            &self.payment_refs,
            &self.payments_by_content,
            &self.payments_by_payer,
            &self.share_grants,
        )
            .transaction(|(payments, refs, by_content, by_payer, grants)| {
                if refs.get(reference)?.is_some() {
                    return Err(abort(StoreError::Conflict(
                        "Payment already recorded for this transaction".into(),
                    )));
                }
                if let Some((token, grant_bytes)) = &grant {
                    if grants.get(&token[..])?.is_some() {
                        return Err(abort(StoreError::Conflict(
                            "Share token already exists".into(),
                        )));
                    }
                    grants.insert(&token[..], grant_bytes.clone())?;
                }
                refs.insert(reference, &id[..])?;
                payments.insert(&id[..], bytes.clone())?;
                by_content.insert(content_key.as_slice(), Vec::<u8>::new())?;
                by_payer.insert(payer_key.as_slice(), Vec::<u8>::new())?;
                Ok(())
            });
        finish(result)
    }

    // -- Utility operations -------------------------------------------------

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn content_count(&self) -> usize {
        self.content.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Store for SledStore {
    // -- Identities ---------------------------------------------------------

    fn find_identity(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        Self::get_decoded(&self.identities, id.as_bytes())
    }

    fn find_identity_by_wallet(&self, wallet: &Address) -> StoreResult<Option<Identity>> {
        match self.identity_wallets.get(wallet.as_bytes())? {
            Some(id) => Self::get_decoded(&self.identities, &id),
            None => Ok(None),
        }
    }

    fn find_identity_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        let key = username.trim().to_lowercase();
        match self.usernames.get(key.as_bytes())? {
            Some(id) => Self::get_decoded(&self.identities, &id),
            None => Ok(None),
        }
    }

    fn issue_challenge(&self, wallet: &Address, nonce: &str) -> StoreResult<Identity> {
        let fresh = Identity::new(*wallet);
        let fresh_bytes = encode(&fresh)?;
        let challenge_bytes = encode(&Challenge::Issued(nonce.to_string()))?;

        let result = (&self.identities, &self.identity_wallets, &self.challenges).transaction(
            |(identities, wallets, challenges)| {
                let identity = match wallets.get(wallet.as_bytes())? {
                    Some(id) => load_identity(identities, &id)?,
                    None => {
                        identities.insert(&fresh.id.as_bytes()[..], fresh_bytes.clone())?;
                        wallets.insert(&wallet.as_bytes()[..], &fresh.id.as_bytes()[..])?;
                        fresh.clone()
                    }
                };
                challenges.insert(&identity.id.as_bytes()[..], challenge_bytes.clone())?;
                Ok(identity)
            },
        );
        finish(result)
    }

    fn challenge(&self, identity_id: Uuid) -> StoreResult<Challenge> {
        Ok(Self::get_decoded(&self.challenges, identity_id.as_bytes())?.unwrap_or_default())
    }

    fn consume_challenge(&self, identity_id: Uuid, nonce: &str) -> StoreResult<bool> {
        let expected = encode(&Challenge::Issued(nonce.to_string()))?;
        let consumed = encode(&Challenge::Consumed)?;
        let outcome =
            self.challenges
                .compare_and_swap(identity_id.as_bytes(), Some(expected), Some(consumed))?;
        Ok(outcome.is_ok())
    }

    fn update_profile(&self, identity_id: Uuid, update: &ProfileUpdate) -> StoreResult<Identity> {
        let key = *identity_id.as_bytes();

        let result = (&self.identities, &self.usernames).transaction(|(identities, usernames)| {
            let mut identity = load_identity(identities, &key)?;
            let old_key = identity.username.as_ref().map(|u| u.to_lowercase());

            if !update.apply(&mut identity) {
                return Ok(identity);
            }

            let new_key = identity.username.as_ref().map(|u| u.to_lowercase());
            if old_key != new_key {
                if let Some(new_key) = &new_key {
                    if let Some(holder) = usernames.get(new_key.as_bytes())? {
                        if holder.as_ref() != &key[..] {
                            return Err(abort(StoreError::Conflict(
                                "Username already taken".into(),
                            )));
                        }
                    }
                    usernames.insert(new_key.as_bytes(), &key[..])?;
                }
                if let Some(old_key) = &old_key {
                    usernames.remove(old_key.as_bytes())?;
                }
            }

            identities.insert(&key[..], encode(&identity).map_err(abort)?)?;
            Ok(identity)
        });
        finish(result)
    }

    fn set_role(&self, identity_id: Uuid, role: Role) -> StoreResult<Identity> {
        let key = *identity_id.as_bytes();
        let result = self.identities.transaction(|identities| {
            let mut identity = load_identity(identities, &key)?;
            if identity.role != role {
                identity.role = role;
                identity.updated_at = chrono::Utc::now();
                identities.insert(&key[..], encode(&identity).map_err(abort)?)?;
            }
            Ok(identity)
        });
        finish(result)
    }

    // -- Content ------------------------------------------------------------

    fn put_content(&self, item: &ContentItem) -> StoreResult<()> {
        self.content.insert(item.id.as_bytes(), encode(item)?)?;
        Ok(())
    }

    fn modify_content(
        &self,
        id: Uuid,
        edit: &(dyn Fn(&mut ContentItem) + Send + Sync),
    ) -> StoreResult<ContentItem> {
        let key = *id.as_bytes();
        let result = self.content.transaction(|content| {
            let bytes: Option<IVec> = content.get(&key[..])?;
            let mut item: ContentItem = match bytes {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StoreError::NotFound("Content not found".into()))),
            };
            if item.is_deleted() {
                return Err(abort(StoreError::NotFound("Content not found".into())));
            }
            edit(&mut item);
            content.insert(&key[..], encode(&item).map_err(abort)?)?;
            Ok(item)
        });
        finish(result)
    }

    fn find_content(&self, id: Uuid) -> StoreResult<Option<ContentItem>> {
        Self::get_decoded(&self.content, id.as_bytes())
    }

    fn list_content(&self, query: &ContentQuery) -> StoreResult<Vec<ContentItem>> {
        let mut items = Vec::new();
        for entry in self.content.iter() {
            let (_key, value) = entry?;
            let item: ContentItem = decode(&value)?;
            if query.matches(&item) {
                items.push(item);
            }
        }

        items.sort_by(listing_order);
        Ok(items
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    // -- Payments -----------------------------------------------------------

    fn insert_payment(&self, record: &PaymentRecord) -> StoreResult<()> {
        self.record_payment(record, None)
    }

    fn insert_payment_with_grant(
        &self,
        record: &PaymentRecord,
        grant: &ShareGrant,
    ) -> StoreResult<()> {
        self.record_payment(record, Some(grant))
    }

    fn find_payment_by_reference(&self, reference: &str) -> StoreResult<Option<PaymentRecord>> {
        match self.payment_refs.get(reference.as_bytes())? {
            Some(id) => self.payment_by_id(&id),
            None => Ok(None),
        }
    }

    fn has_payment(&self, content_item_id: Uuid, payer_id: Uuid) -> StoreResult<bool> {
        let mut prefix = Vec::with_capacity(32);
        prefix.extend_from_slice(content_item_id.as_bytes());
        prefix.extend_from_slice(payer_id.as_bytes());
        Ok(self.payments_by_content.scan_prefix(prefix).next().transpose()?.is_some())
    }

    fn payments_by_payer(&self, payer_id: Uuid) -> StoreResult<Vec<PaymentRecord>> {
        let mut records = Vec::new();
        for entry in self.payments_by_payer.scan_prefix(payer_id.as_bytes()) {
            let (key, _) = entry?;
            if let Some(record) = self.payment_by_id(&key[16..])? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn payments_for_content(&self, content_item_id: Uuid) -> StoreResult<Vec<PaymentRecord>> {
        let mut records = Vec::new();
        for entry in self.payments_by_content.scan_prefix(content_item_id.as_bytes()) {
            let (key, _) = entry?;
            let id = decode_id(&key[32..])?;
            if let Some(record) = self.payment_by_id(id.as_bytes())? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    // -- Share grants -------------------------------------------------------

    fn insert_share_grant(&self, grant: &ShareGrant) -> StoreResult<()> {
        let bytes = encode(grant)?;
        let outcome =
            self.share_grants
                .compare_and_swap(grant.token.as_bytes(), None::<&[u8]>, Some(bytes))?;
        outcome.map_err(|_| StoreError::Conflict("Share token already exists".into()))
    }

    fn find_share_grant(&self, token: Uuid) -> StoreResult<Option<ShareGrant>> {
        Self::get_decoded(&self.share_grants, token.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewContentItem;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    // -- Helpers ------------------------------------------------------------

    fn wallet(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn draft(title: &str, price: u64) -> NewContentItem {
        NewContentItem {
            title: title.into(),
            body: format!("{title} body"),
            image_url: None,
            price_amount: price,
        }
    }

    fn reference(byte: u8) -> String {
        bs58::encode([byte; 64]).into_string()
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn open_temporary_store() {
        let store = SledStore::open_temporary().expect("should create temp store");
        assert_eq!(store.identity_count(), 0);
        assert_eq!(store.content_count(), 0);
        assert_eq!(store.payment_count(), 0);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let store = SledStore::open(dir.path()).unwrap();
            let identity = store.issue_challenge(&wallet(1), "42").unwrap();
            store.flush().unwrap();
            identity.id
        };

        let store = SledStore::open(dir.path()).unwrap();
        let identity = store.find_identity(id).unwrap().expect("identity persisted");
        assert_eq!(identity.wallet_address, wallet(1));
        assert_eq!(store.challenge(id).unwrap(), Challenge::Issued("42".into()));
    }

    #[test]
    fn issue_challenge_creates_identity_once() {
        let store = SledStore::open_temporary().unwrap();
        let first = store.issue_challenge(&wallet(1), "111").unwrap();
        let second = store.issue_challenge(&wallet(1), "222").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Reader);
        assert_eq!(store.identity_count(), 1);
        // The newer nonce overwrites the older one.
        assert_eq!(store.challenge(first.id).unwrap(), Challenge::Issued("222".into()));
    }

    #[test]
    fn unknown_identity_has_no_challenge() {
        let store = SledStore::open_temporary().unwrap();
        assert_eq!(store.challenge(Uuid::new_v4()).unwrap(), Challenge::None);
    }

    #[test]
    fn consume_challenge_is_single_use() {
        let store = SledStore::open_temporary().unwrap();
        let identity = store.issue_challenge(&wallet(2), "777").unwrap();

        assert!(!store.consume_challenge(identity.id, "778").unwrap());
        assert!(store.consume_challenge(identity.id, "777").unwrap());
        assert!(!store.consume_challenge(identity.id, "777").unwrap());
        assert_eq!(store.challenge(identity.id).unwrap(), Challenge::Consumed);
    }

    #[test]
    fn wallet_lookup() {
        let store = SledStore::open_temporary().unwrap();
        let identity = store.issue_challenge(&wallet(3), "1").unwrap();
        let found = store.find_identity_by_wallet(&wallet(3)).unwrap().unwrap();
        assert_eq!(found.id, identity.id);
        assert!(store.find_identity_by_wallet(&wallet(4)).unwrap().is_none());
    }

    #[test]
    fn usernames_are_unique_case_insensitively() {
        let store = SledStore::open_temporary().unwrap();
        let ada = store.issue_challenge(&wallet(1), "1").unwrap();
        let bob = store.issue_challenge(&wallet(2), "2").unwrap();

        let named = ProfileUpdate {
            username: Some("Ada".into()),
            ..Default::default()
        };
        store.update_profile(ada.id, &named).unwrap();

        let stolen = ProfileUpdate {
            username: Some("ada".into()),
            ..Default::default()
        };
        let err = store.update_profile(bob.id, &stolen).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m == "Username already taken"));

        let found = store.find_identity_by_username("ADA").unwrap().unwrap();
        assert_eq!(found.id, ada.id);
    }

    #[test]
    fn renaming_releases_the_old_username() {
        let store = SledStore::open_temporary().unwrap();
        let ada = store.issue_challenge(&wallet(1), "1").unwrap();
        let bob = store.issue_challenge(&wallet(2), "2").unwrap();

        for name in ["ada", "Ada", "lovelace"] {
            let update = ProfileUpdate {
                username: Some(name.into()),
                ..Default::default()
            };
            store.update_profile(ada.id, &update).unwrap();
        }

        let update = ProfileUpdate {
            username: Some("ada".into()),
            ..Default::default()
        };
        assert!(store.update_profile(bob.id, &update).is_ok());
        assert_eq!(
            store.find_identity_by_username("lovelace").unwrap().unwrap().id,
            ada.id
        );
    }

    #[test]
    fn profile_update_of_unknown_identity_is_not_found() {
        let store = SledStore::open_temporary().unwrap();
        let err = store
            .update_profile(Uuid::new_v4(), &ProfileUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn set_role_persists() {
        let store = SledStore::open_temporary().unwrap();
        let identity = store.issue_challenge(&wallet(5), "1").unwrap();
        store.set_role(identity.id, Role::Moderator).unwrap();
        assert_eq!(
            store.find_identity(identity.id).unwrap().unwrap().role,
            Role::Moderator
        );
    }

    #[test]
    fn listing_puts_pins_first_then_newest() {
        let store = SledStore::open_temporary().unwrap();
        let owner = Uuid::new_v4();
        let now = Utc::now();

        for (i, title) in ["old", "mid", "new", "pinned-late", "pinned-early"].iter().enumerate() {
            let mut item = ContentItem::new(owner, draft(title, 0));
            item.created_at = now + Duration::seconds(i as i64);
            if title.starts_with("pinned") {
                let offset = if *title == "pinned-early" { 1 } else { 2 };
                item.pinned_at = Some(now + Duration::seconds(offset));
            }
            store.put_content(&item).unwrap();
        }

        let listed: Vec<String> = store
            .list_content(&ContentQuery::default())
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(listed, ["pinned-early", "pinned-late", "new", "mid", "old"]);
    }

    #[test]
    fn listing_pages_and_skips_deleted() {
        let store = SledStore::open_temporary().unwrap();
        let owner = Uuid::new_v4();
        let now = Utc::now();
        for i in 0..5 {
            let mut item = ContentItem::new(owner, draft(&format!("item-{i}"), 0));
            item.created_at = now + Duration::seconds(i);
            if i == 4 {
                item.deleted_at = Some(now);
            }
            store.put_content(&item).unwrap();
        }

        let page = store.list_content(&ContentQuery::new(Some(2), Some(1))).unwrap();
        let titles: Vec<&str> = page.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["item-2", "item-1"]);
    }

    #[test]
    fn edits_never_touch_deleted_items() {
        let store = SledStore::open_temporary().unwrap();
        let item = ContentItem::new(Uuid::new_v4(), draft("Doomed", 10));
        store.put_content(&item).unwrap();

        store
            .modify_content(item.id, &|item| item.deleted_at = Some(Utc::now()))
            .unwrap();
        let err = store
            .modify_content(item.id, &|item| item.title = "Back again".into())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let stored = store.find_content(item.id).unwrap().unwrap();
        assert!(stored.is_deleted());
        assert_eq!(stored.title, "Doomed");
        assert!(matches!(
            store.modify_content(Uuid::new_v4(), &|_| {}),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_edits_are_not_lost() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let item = ContentItem::new(Uuid::new_v4(), draft("Counter", 0));
        store.put_content(&item).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .modify_content(item.id, &|item| item.price_amount += 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.find_content(item.id).unwrap().unwrap().price_amount, 200);
    }

    #[test]
    fn edit_racing_a_delete_never_resurrects() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let item = ContentItem::new(Uuid::new_v4(), draft("Contested", 10));
        store.put_content(&item).unwrap();

        let editors: Vec<_> = (0..4u64)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for price in 0..50 {
                        let _ = store.modify_content(item.id, &|item| {
                            item.price_amount = n * 100 + price
                        });
                    }
                })
            })
            .collect();
        let deleter = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .modify_content(item.id, &|item| item.deleted_at = Some(Utc::now()))
                    .unwrap();
            })
        };
        deleter.join().unwrap();
        for editor in editors {
            editor.join().unwrap();
        }

        assert!(store.find_content(item.id).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn paid_grant_commits_with_its_payment() {
        let store = SledStore::open_temporary().unwrap();
        let content = Uuid::new_v4();
        let payer = Uuid::new_v4();
        let taken = ShareGrant::new(content, None);
        store.insert_share_grant(&taken).unwrap();

        let record = PaymentRecord::new(content, payer, 10, &reference(7));
        let err = store.insert_payment_with_grant(&record, &taken).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m == "Share token already exists"));
        // Nothing of the payment survived the failed grant.
        assert_eq!(store.payment_count(), 0);
        assert!(!store.has_payment(content, payer).unwrap());
        assert!(store.find_payment_by_reference(&reference(7)).unwrap().is_none());

        let fresh = ShareGrant::new(content, None);
        store.insert_payment_with_grant(&record, &fresh).unwrap();
        assert!(store.has_payment(content, payer).unwrap());
        assert_eq!(store.find_share_grant(fresh.token).unwrap(), Some(fresh));

        let again = ShareGrant::new(content, None);
        let err = store.insert_payment_with_grant(&record, &again).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.find_share_grant(again.token).unwrap().is_none());
    }

    #[test]
    fn duplicate_reference_is_a_conflict() {
        let store = SledStore::open_temporary().unwrap();
        let content = Uuid::new_v4();
        let first = PaymentRecord::new(content, Uuid::new_v4(), 10, &reference(1));
        let replay = PaymentRecord::new(content, Uuid::new_v4(), 10, &reference(1));

        store.insert_payment(&first).unwrap();
        let err = store.insert_payment(&replay).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.payment_count(), 1);
        let found = store.find_payment_by_reference(&reference(1)).unwrap().unwrap();
        assert_eq!(found.id, first.id);
        // The rejected record left no index entries behind.
        assert!(!store.has_payment(content, replay.payer_id).unwrap());
        assert!(store.payments_by_payer(replay.payer_id).unwrap().is_empty());
    }

    #[test]
    fn racing_inserts_commit_exactly_once() {
        let store = Arc::new(SledStore::open_temporary().unwrap());
        let content = Uuid::new_v4();
        let payer = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let record = PaymentRecord::new(content, payer, 10, &reference(9));
                    store.insert_payment(&record).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(store.payment_count(), 1);
        assert_eq!(store.payments_for_content(content).unwrap().len(), 1);
    }

    #[test]
    fn payment_indexes() {
        let store = SledStore::open_temporary().unwrap();
        let (item_a, item_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        store.insert_payment(&PaymentRecord::new(item_a, alice, 10, &reference(1))).unwrap();
        store.insert_payment(&PaymentRecord::new(item_b, alice, 20, &reference(2))).unwrap();
        store.insert_payment(&PaymentRecord::new(item_a, bob, 10, &reference(3))).unwrap();

        assert!(store.has_payment(item_a, alice).unwrap());
        assert!(!store.has_payment(item_b, bob).unwrap());
        assert_eq!(store.payments_by_payer(alice).unwrap().len(), 2);
        assert_eq!(store.payments_for_content(item_a).unwrap().len(), 2);
    }

    #[test]
    fn share_grants_by_token() {
        let store = SledStore::open_temporary().unwrap();
        let grant = ShareGrant::new(Uuid::new_v4(), None);
        store.insert_share_grant(&grant).unwrap();

        assert_eq!(store.find_share_grant(grant.token).unwrap(), Some(grant.clone()));
        assert!(store.find_share_grant(Uuid::new_v4()).unwrap().is_none());
        assert!(matches!(
            store.insert_share_grant(&grant),
            Err(StoreError::Conflict(_))
        ));
    }
}
