use std::sync::Arc;
use std::time::Duration;

use economy::{Ledger, LedgerSnapshot, SnapshotStore, TracingAudit};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "coinpurse={level},economy={level}",
            level = settings.app.level
        ))
        .init();

    let store = SnapshotStore::new(&settings.economy.snapshot_path);
    let snapshot = match store.load() {
        Ok(snapshot) => {
            tracing::info!(
                path = %store.path().display(),
                accounts = snapshot.accounts.len(),
                total_minor_units = snapshot.total_minor_units(),
                "ledger snapshot restored"
            );
            snapshot
        }
        Err(err) if err.is_missing() => {
            tracing::info!(
                path = %store.path().display(),
                "no snapshot found, starting with an empty ledger"
            );
            LedgerSnapshot::default()
        }
        Err(err) => {
            // Degraded but running: a corrupt snapshot never refuses startup.
            tracing::warn!(
                path = %store.path().display(),
                error = %err,
                "snapshot unreadable, starting with an empty ledger"
            );
            LedgerSnapshot::default()
        }
    };

    let ledger = Arc::new(
        Ledger::builder()
            .snapshot(snapshot)
            .audit(Box::new(TracingAudit))
            .build(),
    );

    let mut tasks = tokio::task::JoinSet::new();

    if settings.economy.autosave_seconds > 0 {
        let ledger = Arc::clone(&ledger);
        let store = store.clone();
        let period = Duration::from_secs(settings.economy.autosave_seconds);
        tasks.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it so a fresh start does
            // not checkpoint an empty ledger right away.
            interval.tick().await;
            loop {
                interval.tick().await;
                checkpoint(&ledger, &store, "autosave");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    tasks.shutdown().await;

    if settings.economy.save_on_shutdown {
        checkpoint(&ledger, &store, "shutdown");
    } else {
        tracing::warn!("shutdown checkpoint skipped (save_on_shutdown = false)");
    }

    Ok(())
}

fn checkpoint(ledger: &Ledger, store: &SnapshotStore, reason: &str) {
    match store.save(&ledger.snapshot()) {
        Ok(()) => tracing::debug!(
            reason,
            accounts = ledger.account_count(),
            path = %store.path().display(),
            "ledger checkpoint written"
        ),
        Err(err) => tracing::error!(
            reason,
            path = %store.path().display(),
            error = %err,
            "ledger checkpoint failed"
        ),
    }
}
