use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use gymbot_booking::{spawn_dispatcher, ExecutionEngine, LifecycleManager, RetryPolicy};
use gymbot_core::config::GymbotConfig;
use gymbot_notify::{smtp::SmtpNotifier, Notifier, NullNotifier};
use gymbot_provider::{http::HttpBookingProvider, BookingProvider};
use gymbot_scheduler::{JobFire, SchedulerEngine, SchedulerHandle};
use gymbot_store::Store;
use gymbot_vault::CredentialVault;

mod app;
mod auth;
mod http;

#[derive(Parser)]
#[command(name = "gymbot-gateway", about = "Recurring gym-class booking service")]
struct Cli {
    /// Path to gymbot.toml (default: $GYMBOT_CONFIG or ~/.gymbot/gymbot.toml)
    #[arg(long)]
    config: Option<String>,

    /// Print a fresh base64 vault key and exit.
    #[arg(long)]
    generate_vault_key: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.generate_vault_key {
        println!("{}", CredentialVault::generate_key());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gymbot_gateway=info,gymbot_scheduler=info,gymbot_booking=info".into()
            }),
        )
        .init();

    let config = GymbotConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        GymbotConfig::default()
    });

    if config.vault.key.is_empty() {
        anyhow::bail!("vault.key is not set; generate one with --generate-vault-key");
    }
    let vault = Arc::new(CredentialVault::from_base64_key(&config.vault.key)?);

    // initialize SQLite database — single file for all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = open_connection(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;

    // run all schema migrations (idempotent)
    gymbot_store::db::init_db(&db)?;
    gymbot_scheduler::db::init_db(&db)?;
    info!("database migrations complete");
    drop(db);

    // build subsystems — each gets its own connection for thread safety
    let store = Store::new(open_connection(&db_path)?);

    let provider: Arc<dyn BookingProvider> = Arc::new(HttpBookingProvider::new(&config.provider));
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => {
            warn!("smtp not configured; booking confirmations will not be sent");
            Arc::new(NullNotifier)
        }
    };

    // Fired-trigger channel: SchedulerEngine → booking dispatcher task
    let (fired_tx, fired_rx) = tokio::sync::mpsc::channel::<JobFire>(256);

    // scheduler: management handle for AppState + engine for the poll loop
    let scheduler = Arc::new(SchedulerHandle::new(open_connection(&db_path)?)?);
    let scheduler_engine = SchedulerEngine::new(
        open_connection(&db_path)?,
        fired_tx,
        config.scheduler.misfire_grace_secs,
    )?;

    let engine = Arc::new(ExecutionEngine::new(
        store.clone(),
        Arc::clone(&vault),
        Arc::clone(&provider),
        Arc::clone(&notifier),
        RetryPolicy::from_config(&config.booking),
    ));
    let lifecycle = LifecycleManager::new(
        store.clone(),
        Arc::clone(&scheduler),
        Arc::clone(&engine),
        Arc::clone(&vault),
        Arc::clone(&provider),
        config.booking.window_hours,
    );

    spawn_dispatcher(fired_rx, engine);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(scheduler_engine.run(shutdown_rx));

    let auth = auth::TokenAuth::new(&config.auth.secret, config.auth.token_ttl_hours);
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState {
        config,
        store,
        lifecycle,
        provider,
        vault,
        auth,
        scheduler,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!(%addr, "gymbot gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("ctrl-c received; shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Open a connection with the pragmas every subsystem relies on.
/// `foreign_keys` is per-connection in SQLite, so it must be set here, not
/// once at startup.
fn open_connection(path: &str) -> anyhow::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}
