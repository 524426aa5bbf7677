//! # Wallet sign-in
//!
//! Challenge/response over a random nonce:
//!
//! 1. The client asks for a challenge for its wallet address. We store a
//!    fresh nonce against the wallet's identity (creating a reader identity
//!    on first contact) and hand the nonce back.
//! 2. The wallet signs the nonce's UTF-8 bytes with its Ed25519 key.
//! 3. We verify the detached signature against the wallet address and, if it
//!    holds, consume the challenge and mint a session credential.
//!
//! Consumption is a compare-and-swap against the exact nonce whose signature
//! we checked. If two verifies race on one challenge, at most one of them
//! gets to swap it, and the loser sees `Unauthorized`.

use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::session::{SessionGrant, SessionIssuer};
use crate::config::NONCE_UPPER_BOUND;
use crate::crypto::{verify_detached, Address, DetachedSignature};
use crate::error::{Error, Result};
use crate::model::Challenge;
use crate::storage::Store;

#[derive(Clone)]
pub struct NonceAuthenticator {
    store: Arc<dyn Store>,
    sessions: SessionIssuer,
}

impl NonceAuthenticator {
    pub fn new(store: Arc<dyn Store>, sessions: SessionIssuer) -> Self {
        Self { store, sessions }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Issue a fresh nonce for `wallet`. Any unconsumed earlier nonce is
    /// replaced.
    #[instrument(skip(self))]
    pub fn issue_challenge(&self, wallet: &str) -> Result<String> {
        let address = parse_wallet(wallet)?;
        let nonce = generate_nonce();
        let identity = self.store.issue_challenge(&address, &nonce)?;
        debug!(identity = %identity.id, "challenge issued");
        Ok(nonce)
    }

    /// Check `signature` over the pending nonce of `wallet` and sign the
    /// identity in.
    #[instrument(skip(self, signature))]
    pub fn verify(&self, wallet: &str, signature: &str) -> Result<SessionGrant> {
        let address = parse_wallet(wallet)?;
        let identity = self
            .store
            .find_identity_by_wallet(&address)?
            .ok_or_else(|| Error::not_found("Identity not found"))?;

        let nonce = match self.store.challenge(identity.id)? {
            Challenge::Issued(nonce) => nonce,
            Challenge::Consumed => {
                return Err(Error::unauthorized("Challenge already used, request a new nonce"))
            }
            Challenge::None => {
                return Err(Error::InvalidState(
                    "No challenge issued for this wallet".into(),
                ))
            }
        };

        let signature = DetachedSignature::from_base58(signature)
            .map_err(|_| Error::validation("Invalid signature encoding"))?;
        if verify_detached(&address, nonce.as_bytes(), &signature).is_err() {
            warn!(identity = %identity.id, "signature mismatch");
            return Err(Error::unauthorized("Signature verification failed"));
        }

        if !self.store.consume_challenge(identity.id, &nonce)? {
            return Err(Error::unauthorized("Challenge already used, request a new nonce"));
        }

        let (session_credential, expires_at) = self.sessions.issue(&identity)?;
        info!(identity = %identity.id, role = %identity.role, "signed in");
        Ok(SessionGrant {
            session_credential,
            expires_at,
            identity,
        })
    }
}

fn parse_wallet(wallet: &str) -> Result<Address> {
    wallet
        .parse::<Address>()
        .map_err(|_| Error::validation("Invalid wallet address"))
}

/// Random decimal nonce below 10^16.
fn generate_nonce() -> String {
    OsRng.gen_range(0..NONCE_UPPER_BOUND).to_string()
}
