//! omsd: the OMS daemon.
//!
//! Single binary that wires the OMS components together:
//! - State store (redb)
//! - Process controller (service manager or dry run)
//! - Upgrade engine
//! - Status prober
//! - REST API
//!
//! # Usage
//!
//! ```text
//! omsd --config /etc/oms/oms.toml serve --port 8089
//! omsd config set WCS_INSTALL_PATH /data/wcs
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use oms_api::{ApiState, build_router};
use oms_core::OmsConfig;
use oms_deploy::{PackageStore, UpgradeEngine};
use oms_health::StatusProber;
use oms_process::{DryRunLauncher, ProcessController, ProcessLauncher, ShellLauncher};
use oms_state::{ChainedLookup, ConfigLookup, StateStore, StaticConfig};
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "info,omsd=debug,oms_deploy=debug,oms_process=debug";

#[derive(Parser)]
#[command(name = "omsd", about = "OMS upgrade and lifecycle daemon")]
struct Cli {
    /// Path to oms.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `storage.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Log service-manager commands instead of executing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage config entries in the state store.
    Config {
        /// Data directory for persistent state (overrides `storage.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a key, e.g. `WCS_INSTALL_PATH /data/wcs`.
    Set { key: String, value: String },
    /// Print a key's value.
    Get { key: String },
    /// Remove a key.
    Unset { key: String },
    /// Print every stored key.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = OmsConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            dry_run,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            config.process.dry_run |= dry_run;
            serve(config).await
        }
        Command::Config { data_dir, action } => {
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            let store = open_store(&config)?;
            run_config_action(&store, action)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_store(config: &OmsConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

/// Assemble the API state from configuration.
///
/// Config keys resolve from `[settings]` first, then from the store.
fn build_state(config: &OmsConfig, store: StateStore) -> ApiState {
    let settings = StaticConfig::new(config.settings.clone());
    info!(entries = settings.len(), "static settings loaded");
    let lookup: Arc<dyn ConfigLookup> = Arc::new(
        ChainedLookup::new()
            .then(Arc::new(settings))
            .then(Arc::new(store.clone())),
    );

    let shell = ShellLauncher::new(config.process.elevate, &config.process.service_manager);
    let launcher: Arc<dyn ProcessLauncher> = if config.process.dry_run {
        warn!("dry run: service-manager commands will be logged, not executed");
        Arc::new(DryRunLauncher::new(shell))
    } else {
        Arc::new(shell)
    };
    let controller = Arc::new(ProcessController::new(launcher));

    let engine = UpgradeEngine::new(store.clone(), Arc::clone(&lookup), Arc::clone(&controller))
        .with_tag_scope(config.upgrade.tag_scope);
    info!(tag_scope = ?engine.tag_scope(), "upgrade engine initialized");

    let prober = StatusProber::new(lookup, config.server.port, config.probe.timeout());

    ApiState {
        packages: PackageStore::new(store),
        engine: Arc::new(engine),
        controller,
        prober,
    }
}

async fn serve(config: OmsConfig) -> anyhow::Result<()> {
    info!("OMS daemon starting");

    let store = open_store(&config)?;
    let state = build_state(&config, store);
    let router = build_router(state, config.server.max_upload_bytes);

    let listener =
        tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OMS daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

fn run_config_action(store: &StateStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            store.put_config(&key, &value)?;
            info!(%key, "config entry set");
        }
        ConfigAction::Get { key } => match store.get_config(&key)? {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("config key {key} is not set"),
        },
        ConfigAction::Unset { key } => {
            if !store.delete_config(&key)? {
                warn!(%key, "config key was not set");
            }
        }
        ConfigAction::List => {
            for entry in store.list_config()? {
                println!("{}={}", entry.key, entry.value);
            }
        }
    }
    Ok(())
}
