//! # Detached Signatures
//!
//! Wallet sign-in boils down to one question: did the holder of this address
//! sign these exact bytes? Browser wallets answer with a detached Ed25519
//! signature, base58-encoded, and this module checks it.
//!
//! ## Strictness
//!
//! We use `ed25519-dalek`'s strict verification. It rejects small-order
//! public keys and non-canonical signatures that lenient verifiers wave
//! through, and no legitimate wallet produces either.

use ed25519_dalek::Signature as DalekSignature;
use thiserror::Error;

use super::address::Address;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Errors during signature operations.
///
/// Carries no detail about which check failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature encoding: expected base58 of 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// A detached Ed25519 signature as produced by a wallet's `signMessage`.
#[derive(Clone, PartialEq, Eq)]
pub struct DetachedSignature([u8; SIGNATURE_LENGTH]);

impl DetachedSignature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Decode a base58 signature string.
    pub fn from_base58(s: &str) -> Result<Self, SignatureError> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| SignatureError::InvalidSignatureBytes)?;
        let arr: [u8; SIGNATURE_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidSignatureBytes)?;
        Ok(Self(arr))
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Base58 representation.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl std::fmt::Debug for DetachedSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b58 = self.to_base58();
        write!(f, "DetachedSignature({}…)", &b58[..b58.len().min(8)])
    }
}

/// Verify that `signer` produced `signature` over `message`.
///
/// Fails with [`SignatureError::InvalidPublicKey`] when the address is not a
/// point on the curve (such an address has no private key, so it cannot have
/// signed), and with [`SignatureError::VerificationFailed`] otherwise.
pub fn verify_detached(
    signer: &Address,
    message: &[u8],
    signature: &DetachedSignature,
) -> Result<(), SignatureError> {
    let verifying_key = signer
        .verifying_key()
        .map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature = DalekSignature::from_bytes(signature.as_bytes());

    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
