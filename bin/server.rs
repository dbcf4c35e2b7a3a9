// Degree Planner - Web Server
// REST API with Axum over the SQLite progress store

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use degree_planner::api::{router, spawn_sync_worker, AppState};
use degree_planner::logging::init_tracing;
use degree_planner::{AcademicCalendar, Config, ServerConfig, SqliteProgressStore};

#[derive(Parser)]
#[command(name = "degree-server")]
#[command(about = "HTTP API for the degree planner")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(flatten)]
    server: ServerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    cli.config.validate()?;
    cli.server.validate()?;
    init_tracing(&cli.config.log_level);

    info!("🌐 Degree Planner - Web Server");

    let store = SqliteProgressStore::open(&cli.config.db)?;
    info!(db = ?cli.config.db, "database opened");

    let catalog = cli.config.load_catalog()?;
    let calendar = AcademicCalendar::builtin()?;
    let today = chrono::Local::now().date_naive();
    let term = cli.config.current_term(Some(&calendar), today);
    info!(catalog = %catalog.name, term = %term, "planner configured");

    if cli.server.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be rejected");
    }
    // No payment processor or transcript analyzer client ships with the server;
    // embedders attach them through `AppState::with_checkout_provider` and
    // `AppState::with_transcript_analyzer`.
    warn!("no checkout provider configured, checkout sessions will return 503");
    warn!("no transcript analyzer configured, transcript uploads will return 503 after validation");

    let state = AppState::new(
        catalog,
        calendar,
        Arc::new(store),
        &term,
        cli.config.retry_policy(),
    )
    .with_webhook_secret(
        cli.server.stripe_webhook_secret.clone(),
        Some(cli.server.webhook_tolerance_secs),
    );

    let worker = spawn_sync_worker(state.clone());
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(cli.server.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.server.listen))?;

    info!("🚀 Server running on http://{}", cli.server.listen);
    info!("   API: http://{}/api/health", cli.server.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("Server error")?;

    // Save whatever the worker has not written yet
    worker.abort();
    let report = tokio::task::spawn_blocking(move || state.flush_sync()).await?;
    info!(
        applied = report.applied,
        abandoned = report.abandoned,
        "shutdown complete"
    );

    Ok(())
}
