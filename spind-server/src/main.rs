//! Spind Vault Server binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use spind_server::{build_router, cleanup, AppState, ServerConfig, SqliteStorage, VaultStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spind-server", about = "Spind vault server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "spind.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty vault record that a client can then set up
    Provision {
        /// Vault name (the Basic-auth username clients use)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }

    let storage = SqliteStorage::open(&cfg.storage_path)
        .with_context(|| format!("Failed to open {}", cfg.storage_path.display()))?;

    if let Some(Command::Provision { name }) = cli.command {
        if storage.create(&name)? {
            tracing::info!("Provisioned vault {}", name);
        } else {
            tracing::info!("Vault {} already exists", name);
        }
        return Ok(());
    }

    tracing::info!("Starting spind server on {}", cfg.listen_addr);

    let listen_addr = cfg.listen_addr.clone();
    let state = AppState::new(Arc::new(storage), cfg);
    cleanup::spawn_cleanup_task(state.recovery_limiter.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
