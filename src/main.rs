use dataprev_sync::config::Config;
use dataprev_sync::db::Database;
use dataprev_sync::db_storage::PgSolicitationStore;
use dataprev_sync::solicitation_client::SolicitationClient;
use dataprev_sync::sync::SyncOrchestrator;
use dataprev_sync::worker::{run_forever, shutdown_on};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the worker.
///
/// Initializes logging, loads configuration, connects to Postgres and then
/// runs sync cycles until Ctrl+C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataprev_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let client = SolicitationClient::new(
        config.api_url.clone(),
        config.api_token.clone(),
        config.fetch_settings(),
    )?;

    let orchestrator = SyncOrchestrator::new(
        client,
        PgSolicitationStore::new(db.pool.clone()),
        config.rule_config(),
        config.initial_lookback,
    );

    // Armed before the first cycle so Ctrl+C never interrupts a write.
    let shutdown = shutdown_on(tokio::signal::ctrl_c());

    run_forever(&orchestrator, config.sync_interval, shutdown).await;

    db.pool.close().await;
    Ok(())
}
