use std::time::Duration;

use chrono::Utc;
use snapshot_publisher_core::storage::AnyStore;
use snapshot_publisher_core::Publisher;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background task promoting scheduled releases once their go-live time has passed.
pub fn spawn(publisher: Publisher<AnyStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match publisher.settle_all(Utc::now()).await {
                Ok(promoted) if !promoted.is_empty() => {
                    tracing::info!(promoted = promoted.len(), "scheduled releases settled");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "settling scheduled releases failed"),
            }
        }
    })
}
