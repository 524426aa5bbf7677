//! # CLI Interface
//!
//! Defines the command-line argument structure for `quill-server` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `grant-role`
//! and `version`. Every `run` flag can also come from a `QUILL_*`
//! environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quill_engine::config::Cluster;
use quill_engine::model::Role;

use crate::logging::LogFormat;

/// Quill paywall server.
///
/// Wallet sign-in, on-chain payment verification and gated content over a
/// JSON HTTP API, with Prometheus metrics on a separate port.
#[derive(Parser, Debug)]
#[command(
    name = "quill-server",
    about = "Quill paywall server",
    version,
    propagate_version = true
)]
pub struct QuillCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API and metrics servers.
    Run(RunArgs),
    /// Write a starter configuration with a freshly generated session secret.
    Init(InitArgs),
    /// Change an identity's role in the local database.
    ///
    /// The server must be stopped: the database only admits one process.
    GrantRole(GrantRoleArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the engine configuration file (TOML).
    ///
    /// When omitted, the server looks for `config.toml` in the data directory.
    #[arg(long, short = 'c', env = "QUILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database and the default config file.
    #[arg(long, short = 'd', env = "QUILL_DATA_DIR", default_value = ".quill")]
    pub data_dir: PathBuf,

    /// Port for the JSON API.
    #[arg(long, short = 'p', env = "QUILL_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "QUILL_METRICS_PORT", default_value_t = 9102)]
    pub metrics_port: u16,

    /// JSON-RPC endpoint of the payment rail. Overrides the config file.
    #[arg(long, env = "QUILL_RPC_URL", conflicts_with = "cluster")]
    pub rpc_url: Option<String>,

    /// Well-known cluster to use instead of an explicit RPC URL:
    /// mainnet, devnet, testnet or localnet.
    #[arg(long, env = "QUILL_CLUSTER")]
    pub cluster: Option<Cluster>,

    /// Session signing secret (at least 32 bytes). Overrides the config file.
    #[arg(long, env = "QUILL_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Browser origin allowed by CORS. Repeat for several origins; omit to
    /// allow any origin.
    #[arg(long = "client-origin", env = "QUILL_CLIENT_ORIGIN", value_delimiter = ',')]
    pub client_origins: Vec<String>,

    /// Include internal error details in API responses. Never in production.
    #[arg(long, env = "QUILL_DEV_MODE")]
    pub dev_mode: bool,

    /// Log output format.
    #[arg(long, env = "QUILL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize.
    #[arg(long, short = 'd', env = "QUILL_DATA_DIR", default_value = ".quill")]
    pub data_dir: PathBuf,

    /// Cluster the starter config points at.
    #[arg(long, default_value = "devnet")]
    pub cluster: Cluster,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `grant-role` subcommand.
#[derive(Parser, Debug)]
pub struct GrantRoleArgs {
    /// Wallet address (base58) of the identity to change.
    pub wallet: String,

    /// New role: reader, journalist, moderator or admin.
    pub role: Role,

    /// Directory holding the database.
    #[arg(long, short = 'd', env = "QUILL_DATA_DIR", default_value = ".quill")]
    pub data_dir: PathBuf,
}
