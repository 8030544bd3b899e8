use actix_web::web;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::AppState;

/// Periodically rebuilds every owner's cached storage usage from live assets.
pub async fn start_reconcile_task(state: web::Data<AppState>) {
    let period = Duration::from_secs(state.config.maintenance_interval_secs.max(1));
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match state.ledger.reconcile().await {
            Ok(0) => tracing::debug!("Storage usage caches are consistent"),
            Ok(count) => tracing::info!("Reconciled storage usage for {} owner(s)", count),
            Err(e) => tracing::error!("Storage reconciliation failed: {}", e)
        }
    }
}
