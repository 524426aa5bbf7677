//! # Engine Configuration & Constants
//!
//! Every magic number in Quill lives here, next to the one struct operators
//! actually edit: [`EngineConfig`]. If you're hardcoding a program id or a
//! basis-point value somewhere else, move it here.
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! jwt_secret = "a-long-random-string-of-at-least-32-bytes"
//! session_ttl_secs = 86400
//! share_grant_ttl_secs = 604800
//!
//! [payment_asset]
//! kind = "token"
//! mint = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"
//!
//! [revenue_split]
//! program_id = "7A7YeRHr88T6u3yT5AxogRQFj3duCqXAt2ijx8CWbm1L"
//! platform_wallet = "…"
//! author_share_bps = 9000
//! tolerance_bps = 100
//!
//! [ledger]
//! rpc_url = "https://api.mainnet-beta.solana.com"
//! timeout_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::Address;
use crate::payment::{PaymentAsset, RevenueSplit};

// ---------------------------------------------------------------------------
// Rail Program Ids
// ---------------------------------------------------------------------------

/// The system program. Owns every plain wallet; all zeros.
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// SPL token program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`.
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133, 237,
    95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// Associated token account program: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// USDT mint on mainnet: `Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB`.
/// The default payment asset.
pub const USDT_MINT: Address = Address::new([
    206, 1, 14, 96, 175, 237, 178, 39, 23, 189, 99, 25, 47, 84, 20, 90, 63, 150, 90, 51, 187, 130,
    210, 199, 2, 158, 178, 206, 30, 32, 130, 100,
]);

/// The fund-split program: `7A7YeRHr88T6u3yT5AxogRQFj3duCqXAt2ijx8CWbm1L`.
/// We only observe it; we never call it.
pub const FUND_SPLIT_PROGRAM_ID: Address = Address::new([
    91, 123, 191, 254, 179, 44, 136, 56, 66, 47, 27, 95, 252, 154, 203, 184, 126, 51, 99, 80, 119,
    167, 183, 238, 54, 193, 157, 193, 58, 112, 113, 131,
]);

// ---------------------------------------------------------------------------
// Revenue Split
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10 000 bps = 100 %.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Author share the fund-split program hard-codes (90 %).
pub const DEFAULT_AUTHOR_SHARE_BPS: u16 = 9_000;

/// How far an observed share may drift from the expected one, measured
/// against the transferred total (1 %).
pub const DEFAULT_TOLERANCE_BPS: u16 = 100;

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// How many characters of a locked body a reader gets to see.
pub const PREVIEW_LENGTH: usize = 300;

/// Default page size for content listings.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Hard cap on a listing page.
pub const MAX_LIST_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Sessions & Challenges
// ---------------------------------------------------------------------------

/// HS256 secrets shorter than this are rejected at startup.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Default session lifetime: one day.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Login nonces are drawn uniformly from `0..NONCE_UPPER_BOUND`.
pub const NONCE_UPPER_BOUND: u64 = 10_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Upper bound on a single ledger lookup.
pub const DEFAULT_LEDGER_TIMEOUT_MS: u64 = 10_000;

/// Length of a decoded transaction signature (the transaction reference).
pub const TRANSACTION_REFERENCE_LENGTH: usize = 64;

pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const TESTNET_RPC_URL: &str = "https://api.testnet.solana.com";
pub const LOCALNET_RPC_URL: &str = "http://127.0.0.1:8899";

/// Well-known rail clusters, so operators can say `--cluster devnet`
/// instead of pasting URLs around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cluster {
    Mainnet,
    Devnet,
    Testnet,
    Localnet,
}

impl Cluster {
    /// Public RPC endpoint for this cluster.
    pub fn rpc_url(self) -> &'static str {
        match self {
            Cluster::Mainnet => MAINNET_RPC_URL,
            Cluster::Devnet => DEVNET_RPC_URL,
            Cluster::Testnet => TESTNET_RPC_URL,
            Cluster::Localnet => LOCALNET_RPC_URL,
        }
    }
}

impl FromStr for Cluster {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(ConfigError::UnknownCluster(other.to_string())),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cluster::Mainnet => "mainnet",
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::Localnet => "localnet",
        };
        f.write_str(name)
    }
}

/// Friendly name for an RPC URL, mainly for logging.
pub fn cluster_name(rpc_url: &str) -> String {
    match rpc_url {
        MAINNET_RPC_URL => "mainnet".to_string(),
        DEVNET_RPC_URL => "devnet".to_string(),
        TESTNET_RPC_URL => "testnet".to_string(),
        LOCALNET_RPC_URL => "localnet".to_string(),
        other => format!("custom({other})"),
    }
}

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("jwt_secret must be at least {MIN_JWT_SECRET_LENGTH} bytes, got {0}")]
    SecretTooShort(usize),

    #[error("{field} must be at most {BPS_DENOMINATOR} bps, got {value}")]
    InvalidBps { field: &'static str, value: u16 },

    #[error("ledger.timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("unknown cluster: {0} (expected mainnet, devnet, testnet or localnet)")]
    UnknownCluster(String),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Where and how long to ask the rail about transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            timeout_ms: DEFAULT_LEDGER_TIMEOUT_MS,
        }
    }
}

/// Everything the engine needs to know that isn't a compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HS256 signing secret for session credentials.
    pub jwt_secret: String,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Lifetime of sharable links. `None` means links never expire.
    #[serde(default)]
    pub share_grant_ttl_secs: Option<u64>,

    #[serde(default)]
    pub payment_asset: PaymentAsset,

    /// When set, payments routed through the split program are checked
    /// share by share.
    #[serde(default)]
    pub revenue_split: Option<RevenueSplit>,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl EngineConfig {
    /// A config with defaults everywhere except the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            share_grant_ttl_secs: None,
            payment_asset: PaymentAsset::default(),
            revenue_split: None,
            ledger: LedgerConfig::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the engine cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort(self.jwt_secret.len()));
        }
        if self.ledger.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(split) = &self.revenue_split {
            check_bps("revenue_split.author_share_bps", split.author_share_bps)?;
            check_bps("revenue_split.tolerance_bps", split.tolerance_bps)?;
        }
        Ok(())
    }
}

fn check_bps(field: &'static str, value: u16) -> Result<(), ConfigError> {
    if u64::from(value) > BPS_DENOMINATOR {
        return Err(ConfigError::InvalidBps { field, value });
    }
    Ok(())
}

/// A configured number of seconds as a `chrono` span, saturating at the
/// largest span `chrono` can represent.
pub(crate) fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000))
}

fn default_rpc_url() -> String {
    MAINNET_RPC_URL.to_string()
}

fn default_ledger_timeout_ms() -> u64 {
    DEFAULT_LEDGER_TIMEOUT_MS
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}
