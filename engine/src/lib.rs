// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quill: Paywall Engine
//!
//! Quill sells written content for on-chain payments without ever holding
//! anyone's money. Readers sign in with their wallet, pay the author
//! directly on the payment rail, and hand us the transaction signature.
//! We look the transaction up, check it paid the right account enough, and
//! remember that it did. Exactly once.
//!
//! ## Architecture
//!
//! - **crypto**: Addresses, detached Ed25519 signatures, derived accounts.
//! - **model**: Identities, content items, payment records, share grants.
//! - **storage**: The `Store` trait and its sled implementation.
//! - **ledger**: Read-only view of finalized transactions on the rail.
//! - **payment**: Payment assets, revenue split, the verification pipeline.
//! - **auth**: Wallet challenge sign-in and session credentials.
//! - **content**: Body gating and the content lifecycle.
//! - **share**: Bearer links that unlock one item.
//! - **policy**: Who may edit, delete or pin what.
//! - **profile**: Public profiles.
//! - **gatekeeper**: Everything above, wired together.
//! - **config**: Constants, program ids and `EngineConfig`.
//!
//! ## Design Philosophy
//!
//! 1. Fail closed. If we can't prove a payment, there was no payment.
//! 2. The store's uniqueness constraint, not a pre-check, stops replays.
//! 3. Everything derivable from on-chain data is derived, never configured.
//! 4. If it touches money, it has tests. Plural.

pub mod auth;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod gatekeeper;
pub mod ledger;
pub mod model;
pub mod payment;
pub mod policy;
pub mod profile;
pub mod share;
pub mod storage;

pub use error::{Error, ErrorKind, Result};
pub use gatekeeper::Gatekeeper;
