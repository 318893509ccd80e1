//! Runs a single sync cycle and exits.
//!
//! Usage: `sync_once [DDMMYYYYHHMMSS]`. With an argument the window starts
//! there instead of at the stored high-water-mark, which is how a missed
//! range is backfilled.

use dataprev_sync::api_time::{now_sao_paulo, parse_api_timestamp};
use dataprev_sync::config::Config;
use dataprev_sync::db::Database;
use dataprev_sync::db_storage::PgSolicitationStore;
use dataprev_sync::solicitation_client::SolicitationClient;
use dataprev_sync::sync::SyncOrchestrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataprev_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let since = match std::env::args().nth(1) {
        Some(raw) => Some(
            parse_api_timestamp(&raw)
                .ok_or_else(|| anyhow::anyhow!("Window start must be DDMMYYYYHHMMSS, got {}", raw))?,
        ),
        None => None,
    };

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

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

    let now = now_sao_paulo();
    let report = match since {
        Some(start) => orchestrator.run_window(start, now).await?,
        None => orchestrator.run_at(now).await?,
    };

    println!("Window:     {} -> {}", report.window_start, report.window_end);
    println!("Pages:      {} (complete: {})", report.pages, report.window_complete);
    println!("Fetched:    {}", report.fetched);
    println!("Approved:   {}/{}", report.approved, report.evaluated);
    println!("Skipped:    {}", report.skipped);
    println!("Inserted:   {}", report.inserted);

    db.pool.close().await;
    Ok(())
}
