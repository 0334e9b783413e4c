//! Liaison Server - Main entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liaison_api::AppState;
use liaison_auth::{AuthenticationBridge, BridgeSettings, PreAuthSettings, DEFAULT_PREAUTH_HEADER};
use liaison_storage::{DirectoryStore, LocalGroup, MemoryStore, StorageError};
use liaison_storage_sqlite::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "liaison-server")]
#[command(about = "Liaison - external identity and group membership bridge")]
#[command(version)]
struct Cli {
    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:8300", env = "LIAISON_BIND_ADDRESS")]
    bind: String,

    /// Directory holding realm databases
    #[arg(long, default_value = "data", env = "LIAISON_DATA_DIR")]
    data_dir: PathBuf,

    /// Realm name (database file name)
    #[arg(long, default_value = "default", env = "LIAISON_REALM")]
    realm: String,

    /// Enable development mode (in-memory storage, security context endpoint)
    #[arg(long, env = "LIAISON_DEV_MODE")]
    dev: bool,

    /// Trust the principal asserted in the pre-auth header
    #[arg(long, env = "LIAISON_PREAUTH")]
    preauth: bool,

    /// Header carrying the pre-authenticated principal
    #[arg(long, default_value = DEFAULT_PREAUTH_HEADER, env = "LIAISON_PREAUTH_HEADER")]
    preauth_header: String,

    /// Lower-case principals before lookup
    #[arg(long, env = "LIAISON_LOGIN_DOWNCASE")]
    login_downcase: bool,

    /// Do not create unknown users on first login
    #[arg(long, env = "LIAISON_NO_AUTO_CREATE")]
    no_auto_create: bool,

    /// Identity used for requests asserting no principal
    #[arg(long, env = "LIAISON_DEFAULT_PRINCIPAL")]
    default_principal: Option<String>,

    /// Local group to create at startup (repeatable)
    #[arg(long = "group", value_name = "NAME")]
    groups: Vec<String>,
}

impl Cli {
    fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            auto_create_users: !self.no_auto_create,
            login_downcase: self.login_downcase,
            default_principal: self.default_principal.clone(),
            pre_auth: PreAuthSettings {
                enabled: self.preauth,
                header_name: self.preauth_header.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Starting Liaison server...");
    info!(bind = %cli.bind, "Bind address");

    if cli.dev {
        warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
    }

    let settings = cli.bridge_settings();
    if settings.pre_auth.enabled {
        info!(header = %settings.pre_auth.header_name, "Pre-authentication enabled");
    }

    let store = open_store(&cli).await?;
    info!(store = store.name(), "Directory store ready");

    let bridge = AuthenticationBridge::from_settings(store, &settings);
    let state = AppState::new(bridge, settings.pre_auth).with_dev_mode(cli.dev);
    let app = liaison_api::router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;

    info!("Liaison server started successfully");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down...");

    Ok(())
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn DirectoryStore>> {
    if cli.dev {
        let store = MemoryStore::new();
        for name in &cli.groups {
            seeded(store.create_group(name).await, name)?;
        }
        return Ok(Arc::new(store));
    }

    let store = SqliteStore::open(&cli.data_dir, &cli.realm)
        .await
        .with_context(|| format!("Failed to open realm {}", cli.realm))?;
    info!(path = %store.path().display(), "Using SQLite database");

    for name in &cli.groups {
        seeded(store.create_group(name).await, name)?;
    }
    Ok(Arc::new(store))
}

fn seeded(result: Result<LocalGroup, StorageError>, name: &str) -> anyhow::Result<()> {
    match result {
        Ok(group) => info!(group = %group.name, "Local group created"),
        Err(StorageError::AlreadyExists(_)) => debug!(group = %name, "Local group already exists"),
        Err(e) => return Err(e).with_context(|| format!("Failed to create group {name}")),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
