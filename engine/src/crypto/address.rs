//! # Rail Addresses
//!
//! A 32-byte account address on the payment rail, displayed the way every
//! wallet displays it: base58. Wallet addresses are Ed25519 public keys, but
//! plenty of valid addresses are not: derived token accounts lie off the
//! curve (see [`super::derivation`]). So `Address`
//! accepts any 32 bytes and leaves curve checks to the code that needs a
//! verifying key.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// Errors that can occur while parsing an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is not valid base58")]
    InvalidEncoding,

    #[error("address must decode to {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),

    #[error("address is not a valid Ed25519 public key")]
    NotAPublicKey,
}

/// An account address on the payment rail.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Wrap raw address bytes. Any 32 bytes are a valid address.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Try to build an address from a byte slice of unknown length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; ADDRESS_LENGTH] = slice
            .try_into()
            .map_err(|_| AddressError::InvalidLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Base58 representation, e.g. `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Interpret this address as an Ed25519 verifying key.
    ///
    /// Fails for off-curve addresses (program-derived accounts), which by
    /// construction have no private key and can never sign anything.
    pub fn verifying_key(&self) -> Result<VerifyingKey, AddressError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| AddressError::NotAPublicKey)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

// Addresses travel as base58 strings everywhere: JSON bodies, TOML config and
// stored records alike. One representation, no surprises.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
