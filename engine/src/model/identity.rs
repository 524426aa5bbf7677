//! Identities, one per wallet, and their login challenge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::crypto::Address;

/// What an identity may do beyond reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Reader,
    Journalist,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins act on other people's content.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Journalist => "journalist",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reader" => Ok(Role::Reader),
            "journalist" => Ok(Role::Journalist),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The login challenge of an identity.
///
/// ```text
/// None ──issue──▶ Issued(nonce) ──verify──▶ Consumed
///                      ▲  │                    │
///                      └──┘ (re-issue)         │
///                      └──────────issue────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Challenge {
    /// No challenge was ever issued.
    #[default]
    None,
    /// Waiting for a signature over this nonce.
    Issued(String),
    /// The last nonce was used to sign in. It can't be used again.
    Consumed,
}

/// A wallet-backed identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub wallet_address: Address,
    pub role: Role,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub x_link: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// A brand-new reader for `wallet`.
    pub fn new(wallet_address: Address) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_address,
            role: Role::Reader,
            username: None,
            avatar: None,
            x_link: None,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public profile changes. `None` leaves a field as it is; an empty string
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub x_link: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Apply this update to `identity`, returning whether anything changed.
    pub fn apply(&self, identity: &mut Identity) -> bool {
        let mut changed = false;
        for (update, field) in [
            (&self.username, &mut identity.username),
            (&self.avatar, &mut identity.avatar),
            (&self.x_link, &mut identity.x_link),
            (&self.bio, &mut identity.bio),
        ] {
            if let Some(value) = update {
                let value = value.trim();
                let next = (!value.is_empty()).then(|| value.to_string());
                if *field != next {
                    *field = next;
                    changed = true;
                }
            }
        }
        if changed {
            identity.updated_at = Utc::now();
        }
        changed
    }
}
