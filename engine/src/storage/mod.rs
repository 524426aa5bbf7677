//! # Storage Module
//!
//! The record store behind Quill, specified as a trait so the engine never
//! cares where bytes live. One implementation ships in-tree:
//!
//! ```text
//! mod.rs: Store trait, StoreError
//! db.rs : SledStore: embedded sled database, bincode values
//! ```
//!
//! ## Contract
//!
//! Implementations must enforce, atomically:
//!
//! 1. One identity per wallet address.
//! 2. One identity per username.
//! 3. One payment record per transaction reference, **globally**. A second
//!    insert with the same reference fails with [`StoreError::Conflict`] and
//!    leaves no partial record behind, even when the two inserts race.
//! 4. One share grant per token.
//! 5. Challenge consumption is compare-and-swap: it succeeds only if the
//!    stored challenge is still exactly the nonce the caller verified.
//! 6. Editing an existing item reads, checks and writes it in one step. A
//!    soft-deleted item is never written back, so an edit racing a delete
//!    cannot bring the item back or drop another edit.
//! 7. A share grant bought with a payment commits together with that
//!    payment record, or neither commits.
//!
//! The payment verifier leans on rule 3 entirely. It does not check for an
//! existing record first; it inserts and lets the store say no.

pub mod db;

pub use db::SledStore;

use uuid::Uuid;

use crate::crypto::Address;
use crate::model::{
    Challenge, ContentItem, ContentQuery, Identity, PaymentRecord, ProfileUpdate, Role, ShareGrant,
};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A uniqueness rule said no. The message is user-facing.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for identities, content, payments and share grants.
pub trait Store: Send + Sync {
    // -- Identities ---------------------------------------------------------

    fn find_identity(&self, id: Uuid) -> StoreResult<Option<Identity>>;

    fn find_identity_by_wallet(&self, wallet: &Address) -> StoreResult<Option<Identity>>;

    fn find_identity_by_username(&self, username: &str) -> StoreResult<Option<Identity>>;

    /// Store `nonce` as the pending challenge for `wallet`, creating a reader
    /// identity first if the wallet has never been seen. Any earlier
    /// unconsumed nonce is overwritten.
    fn issue_challenge(&self, wallet: &Address, nonce: &str) -> StoreResult<Identity>;

    /// Current challenge state of an identity.
    fn challenge(&self, identity_id: Uuid) -> StoreResult<Challenge>;

    /// Move `Issued(nonce)` to `Consumed`. Returns `false` if the stored
    /// challenge is anything other than exactly `Issued(nonce)`.
    fn consume_challenge(&self, identity_id: Uuid, nonce: &str) -> StoreResult<bool>;

    fn update_profile(&self, identity_id: Uuid, update: &ProfileUpdate) -> StoreResult<Identity>;

    fn set_role(&self, identity_id: Uuid, role: Role) -> StoreResult<Identity>;

    // -- Content ------------------------------------------------------------

    /// Insert or replace a content item.
    fn put_content(&self, item: &ContentItem) -> StoreResult<()>;

    /// Apply `edit` to the live item `id` atomically and return the result.
    /// `edit` may run more than once. Fails with `NotFound` if the item is
    /// missing or already soft-deleted when the write commits.
    fn modify_content(
        &self,
        id: Uuid,
        edit: &(dyn Fn(&mut ContentItem) + Send + Sync),
    ) -> StoreResult<ContentItem>;

    /// Look up an item by id, deleted or not.
    fn find_content(&self, id: Uuid) -> StoreResult<Option<ContentItem>>;

    /// Live items matching `query`, pinned first (oldest pin first), then
    /// newest first, paged by `query.limit` / `query.offset`.
    fn list_content(&self, query: &ContentQuery) -> StoreResult<Vec<ContentItem>>;

    // -- Payments -----------------------------------------------------------

    /// Insert a payment record. Fails with `Conflict` if any record already
    /// carries the same transaction reference.
    fn insert_payment(&self, record: &PaymentRecord) -> StoreResult<()>;

    /// Insert a payment record and the share grant it paid for in one
    /// transaction. Either uniqueness rule failing leaves neither behind.
    fn insert_payment_with_grant(
        &self,
        record: &PaymentRecord,
        grant: &ShareGrant,
    ) -> StoreResult<()>;

    fn find_payment_by_reference(&self, reference: &str) -> StoreResult<Option<PaymentRecord>>;

    /// Whether `payer_id` holds at least one payment for `content_item_id`.
    fn has_payment(&self, content_item_id: Uuid, payer_id: Uuid) -> StoreResult<bool>;

    fn payments_by_payer(&self, payer_id: Uuid) -> StoreResult<Vec<PaymentRecord>>;

    fn payments_for_content(&self, content_item_id: Uuid) -> StoreResult<Vec<PaymentRecord>>;

    // -- Share grants -------------------------------------------------------

    fn insert_share_grant(&self, grant: &ShareGrant) -> StoreResult<()>;

    fn find_share_grant(&self, token: Uuid) -> StoreResult<Option<ShareGrant>>;
}
