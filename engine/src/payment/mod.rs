//! # Payments
//!
//! Turning "here is a transaction signature" into "this reader has paid for
//! this item", at most once per signature.
//!
//! - **asset**: what counts as money: native units or one token mint.
//! - **split**: the author/platform revenue split and its tolerance rule.
//! - **verifier**: the fail-closed verification pipeline.

pub mod asset;
pub mod split;
pub mod verifier;

pub use asset::PaymentAsset;
pub use split::RevenueSplit;
pub use verifier::PaymentVerifier;
