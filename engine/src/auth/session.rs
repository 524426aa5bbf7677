//! # Session credentials
//!
//! Stateless HS256 JWTs minted after a successful wallet sign-in. A token
//! binds the identity id, the wallet address and the role the identity had
//! when it signed in. Nothing is stored server-side, so a role change only
//! takes effect on the next challenge/verify cycle.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{seconds, ConfigError, MIN_JWT_SECRET_LENGTH};
use crate::crypto::Address;
use crate::error::{Error, Result};
use crate::model::{Identity, Role};

/// Payload carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Wallet address, base58.
    pub sub: String,
    /// Identity id.
    pub uid: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, as recovered from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity_id: Uuid,
    pub wallet: Address,
    pub role: Role,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub session_credential: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

/// Mints and checks session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> std::result::Result<Self, ConfigError> {
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort(secret.len()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: seconds(ttl_secs),
        })
    }

    /// Mint a token for `identity`, returning it with its expiry.
    pub fn issue(&self, identity: &Identity) -> Result<(String, DateTime<Utc>)> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;
        let claims = SessionClaims {
            sub: identity.wallet_address.to_base58(),
            uid: identity.id,
            role: identity.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to sign session: {e}")))?;
        Ok((token, expires_at))
    }

    /// Check a token and recover the session it carries.
    pub fn validate(&self, token: &str) -> Result<Session> {
        let data = decode::<SessionClaims>(token.trim(), &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => Error::unauthorized("Session expired"),
                _ => Error::unauthorized("Invalid session credential"),
            })?;
        let claims = data.claims;
        let wallet = claims
            .sub
            .parse::<Address>()
            .map_err(|_| Error::unauthorized("Invalid session credential"))?;
        Ok(Session {
            identity_id: claims.uid,
            wallet,
            role: claims.role,
        })
    }
}
