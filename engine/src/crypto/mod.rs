//! # Cryptographic Primitives for Quill
//!
//! Everything the engine needs to reason about wallets and accounts on the
//! payment rail, and nothing more:
//!
//! - **address**: 32-byte base58 account addresses.
//! - **signatures**: detached Ed25519 verification for wallet sign-in.
//! - **derivation**: program-derived addresses, used to locate an author's
//!   associated token account.
//!
//! We never sign anything server-side. Wallets sign, we verify. Every function
//! here is a thin, typed wrapper around `ed25519-dalek`, `curve25519-dalek`
//! and `sha2`.

pub mod address;
pub mod derivation;
pub mod signatures;

pub use address::{Address, AddressError};
pub use derivation::{associated_token_address, find_program_address, DerivationError};
pub use signatures::{verify_detached, DetachedSignature, SignatureError};
