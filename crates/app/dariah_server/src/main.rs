//! DARIAH reporting portal API server.
//!
//! Serves the session/auth endpoints over PostgreSQL (or an in-memory store
//! with `--memory-store`) and runs the periodic expired-session and idle
//! rate-limit-bucket sweeps until shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dariah_api::config::ApiConfig;
use dariah_core::auth::{AuthStore, MemoryStore, PgStore, session};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "dariah_server", about = "DARIAH reporting portal API server")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL; overrides the value read by `ApiConfig`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep sessions and users in memory instead of PostgreSQL (development only).
    #[arg(long, default_value_t = false)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dariah_api=debug,dariah_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    let store: Arc<dyn AuthStore> = if args.memory_store {
        warn!("using in-memory store; sessions will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        dariah_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let state = dariah_api::AppState::new(store.clone(), config.clone());

    let cancel = CancellationToken::new();
    let sweeps = [
        session::spawn_sweep_task(store, config.sweep_interval(), cancel.clone()),
        state
            .rate_limiter
            .spawn_cleanup_task(config.sweep_interval(), cancel.clone()),
    ];

    let app = dariah_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    join_background(sweeps).await;
    info!("server stopped");

    result?;
    Ok(())
}

/// Wait for background tasks, logging any that panicked or were aborted.
///
/// Returns the number of tasks that did not finish cleanly.
async fn join_background(handles: impl IntoIterator<Item = JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("background sweep task ended abnormally: {e}");
            failed += 1;
        }
    }
    failed
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
