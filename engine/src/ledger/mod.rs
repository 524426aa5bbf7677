//! # Ledger: Observing the Payment Rail
//!
//! Quill never sends transactions. It only looks at finalized ones and asks
//! "who gained what?". This module is everything needed to answer that:
//!
//! ```text
//! raw.rs     : the getTransaction JSON shape, exactly as the RPC returns it
//! facts.rs   : TransactionFacts, the encoding-independent view we reason on
//! rpc.rs     : RpcLedger, a JSON-RPC client over reqwest
//! memory.rs  : InMemoryLedger + TransferBuilder, for tests and local demos
//! observer.rs: LedgerObserver: validation, bounded timeout, parsing
//! ```
//!
//! The [`Ledger`] trait is the seam: the observer neither knows nor cares
//! whether transactions come from a public cluster or a `HashMap`.

pub mod facts;
pub mod memory;
pub mod observer;
pub mod raw;
pub mod rpc;

pub use facts::{InstructionFacts, NativeBalanceChange, TokenBalanceChange, TransactionFacts};
pub use memory::{InMemoryLedger, TransferBuilder};
pub use observer::LedgerObserver;
pub use raw::RawTransaction;
pub use rpc::RpcLedger;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors talking to, or making sense of, the payment rail.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The rail answered, but with something we can't parse.
    #[error("malformed transaction payload: {0}")]
    Malformed(String),
}

/// Read access to finalized transactions on the payment rail.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fetch a finalized transaction by its signature.
    ///
    /// `Ok(None)` means the rail doesn't know the transaction, or it isn't
    /// finalized yet.
    async fn get_finalized_transaction(
        &self,
        reference: &str,
    ) -> Result<Option<RawTransaction>, LedgerError>;
}
