//! Payment records: proof that someone paid for something, exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A verified on-chain payment. Append-only: never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub payer_id: Uuid,
    /// Observed transferred amount in base units.
    pub amount: u64,
    /// Transaction signature. Globally unique across all records.
    pub transaction_reference: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(content_item_id: Uuid, payer_id: Uuid, amount: u64, reference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_item_id,
            payer_id,
            amount,
            transaction_reference: reference.to_string(),
            created_at: Utc::now(),
        }
    }
}
