//! Supervisory loop: run a cycle, sleep, repeat.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::db_storage::SolicitationStore;
use crate::sync::SyncOrchestrator;

/// Starts waiting on `signal` immediately, in its own task, and returns a
/// future that resolves once the signal fires.
///
/// If the listener itself fails the returned future never resolves.
pub fn shutdown_on<F>(signal: F) -> impl Future<Output = ()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                let _held = tx;
                std::future::pending::<()>().await;
            }
        }
    });

    async move {
        let _ = rx.await;
    }
}

/// Runs sync cycles every `interval` until `shutdown` resolves.
///
/// A failed cycle is logged and the next one runs on schedule. Shutdown is
/// only observed between cycles, never in the middle of a write.
pub async fn run_forever<S, F>(orchestrator: &SyncOrchestrator<S>, interval: Duration, shutdown: F)
where
    S: SolicitationStore,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!("Worker started, interval {:?}", interval);

    loop {
        match orchestrator.run_once().await {
            Ok(report) => tracing::debug!("Cycle finished: {:?}", report),
            Err(e) => tracing::error!("Sync cycle failed: {}", e),
        }

        tracing::info!("Waiting {:?} before next cycle", interval);
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping worker");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
