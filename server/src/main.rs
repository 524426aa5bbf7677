// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quill Server
//!
//! Entry point for the `quill-server` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the database, and serves the
//! JSON API.
//!
//! The binary supports four subcommands:
//!
//! - `run`       : serve the API and the metrics endpoint
//! - `init`      : write a starter config with a fresh session secret
//! - `grant-role`: change an identity's role offline
//! - `version`   : print build version information

mod api;
mod cli;
mod error;
mod extract;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

use quill_engine::config::{cluster_name, EngineConfig};
use quill_engine::ledger::RpcLedger;
use quill_engine::profile::ProfileService;
use quill_engine::storage::SledStore;
use quill_engine::Gatekeeper;

use cli::{Commands, QuillCli};
use logging::{LogFormat, DEFAULT_DIRECTIVES};
use metrics::QuillMetrics;

/// File name of the config inside the data directory.
const CONFIG_FILE: &str = "config.toml";

/// Bytes of randomness in a generated session secret.
const GENERATED_SECRET_BYTES: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QuillCli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Init(args) => init_data_dir(args),
        Commands::GrantRole(args) => grant_role(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint.
async fn run_server(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(DEFAULT_DIRECTIVES, args.log_format)?;

    let config = resolve_config(&args)?;
    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        cluster = %cluster_name(&config.ledger.rpc_url),
        split = config.revenue_split.is_some(),
        dev_mode = args.dev_mode,
        "starting quill-server"
    );
    if args.dev_mode {
        tracing::warn!("dev mode is on: internal error details are exposed to clients");
    }

    // --- Persistent storage ---
    let store = Arc::new(open_store(&args.data_dir)?);

    // --- Payment rail ---
    let ledger = Arc::new(
        RpcLedger::new(config.ledger.rpc_url.clone(), config.ledger.timeout())
            .context("failed to build the RPC client")?,
    );

    let gatekeeper =
        Gatekeeper::new(config, store, ledger).context("invalid engine configuration")?;

    // --- Metrics ---
    let metrics = Arc::new(QuillMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        gatekeeper,
        metrics: Arc::clone(&metrics),
        version: Arc::from(env!("CARGO_PKG_VERSION")),
        client_origins: Arc::from(args.client_origins.clone()),
        dev_mode: args.dev_mode,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(metrics);
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    let (stop, _) = watch::channel(false);
    let stop = Arc::new(stop);
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, draining connections");
            stop.send_replace(true);
        });
    }
    tokio::join!(
        serve_until_stopped("API", api_listener, api_router, Arc::clone(&stop)),
        serve_until_stopped("Metrics", metrics_listener, metrics_router, stop),
    );

    tracing::info!("quill-server stopped");
    Ok(())
}

/// Config precedence: `--config`, then `config.toml` in the data directory,
/// then built-in defaults. CLI flags override whatever was loaded.
fn resolve_config(args: &cli::RunArgs) -> Result<EngineConfig> {
    let default_path = args.data_dir.join(CONFIG_FILE);
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None if default_path.exists() => Some(default_path),
        None => None,
    };

    let mut config = match &path {
        Some(path) => {
            // Validation runs after the overrides, so load without it.
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<EngineConfig>(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => EngineConfig::new(String::new()),
    };

    if let Some(secret) = &args.jwt_secret {
        config.jwt_secret = secret.clone();
    }
    if let Some(url) = &args.rpc_url {
        config.ledger.rpc_url = url.clone();
    } else if let Some(cluster) = args.cluster {
        config.ledger.rpc_url = cluster.rpc_url().to_string();
    }

    if config.jwt_secret.is_empty() {
        bail!("no session secret: run `quill-server init` or pass --jwt-secret");
    }
    config.validate().context("invalid engine configuration")?;

    if let Some(path) = &path {
        tracing::info!(path = %path.display(), "configuration loaded");
    }
    Ok(config)
}

fn open_store(data_dir: &Path) -> Result<SledStore> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");
    Ok(store)
}

/// Writes `config.toml` with a random session secret into the data directory.
fn init_data_dir(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("quill_server=info", LogFormat::Pretty)?;

    let path = write_starter_config(&args.data_dir, args.cluster.rpc_url(), args.force)?;

    println!("Data directory initialized.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Cluster        : {}", cluster_name(args.cluster.rpc_url()));
    println!("  Config         : {}", path.display());

    Ok(())
}

fn write_starter_config(data_dir: &Path, rpc_url: &str, force: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let path = data_dir.join(CONFIG_FILE);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut secret = [0u8; GENERATED_SECRET_BYTES];
    OsRng.fill_bytes(&mut secret);

    let mut config = EngineConfig::new(hex::encode(secret));
    config.ledger.rpc_url = rpc_url.to_string();
    let rendered = config
        .to_toml_string()
        .context("failed to render configuration")?;

    std::fs::write(&path, rendered)
        .with_context(|| format!("failed to write config to {}", path.display()))?;

    // The file holds the session secret.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "starter configuration written");
    Ok(path)
}

fn grant_role(args: cli::GrantRoleArgs) -> Result<()> {
    logging::init_logging("quill_server=info,quill_engine=info", LogFormat::Pretty)?;

    let store = Arc::new(open_store(&args.data_dir)?);
    let profiles = ProfileService::new(store.clone());
    let identity = profiles
        .set_role(&args.wallet, args.role)
        .with_context(|| format!("failed to change role of {}", args.wallet))?;
    store.flush().context("failed to flush database")?;

    println!("{} is now {}", identity.wallet_address, identity.role);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("quill-server {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Serve `router` until `stop` flips, then finish in-flight requests before
/// returning. A server that exits on its own flips `stop` for the others.
async fn serve_until_stopped(
    label: &'static str,
    listener: tokio::net::TcpListener,
    router: axum::Router,
    stop: Arc<watch::Sender<bool>>,
) {
    let mut stopped = stop.subscribe();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = stopped.wait_for(|stop| *stop).await;
    });
    if let Err(e) = server.await {
        tracing::error!("{} server error: {}", label, e);
    }
    stop.send_replace(true);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
