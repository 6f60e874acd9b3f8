//! IdempotencyJanitor - Background purge of old idempotency records.
//!
//! Records only need to outlive the provider's redelivery window. The janitor
//! deletes anything first seen more than `retention` ago, once per `interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::DomainError;
use crate::ports::IdempotencyStore;

pub struct IdempotencyJanitor {
    store: Arc<dyn IdempotencyStore>,
    retention: chrono::Duration,
    interval: Duration,
}

impl IdempotencyJanitor {
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Run the purge loop until shutdown signal is received.
    ///
    /// Purge failures are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender can never signal again
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Idempotency janitor stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.purge_once().await {
                        tracing::warn!(error = %e, "Failed to purge idempotency records");
                    }
                }
            }
        }
    }

    /// Run exactly one purge.
    pub async fn purge_once(&self) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - self.retention;
        let purged = self.store.purge_before(cutoff).await?;

        if purged > 0 {
            tracing::info!(
                purged = purged,
                cutoff = %cutoff,
                "Purged expired idempotency records"
            );
        }

        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIdempotencyStore;

    #[tokio::test]
    async fn purge_once_keeps_records_inside_retention() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        store.begin("evt_1", "payment.succeeded").await.unwrap();

        let janitor =
            IdempotencyJanitor::new(store.clone(), chrono::Duration::days(30), Duration::from_secs(60));
        let purged = janitor.purge_once().await.unwrap();

        assert_eq!(purged, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn purge_once_removes_records_past_retention() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        store.begin("evt_1", "payment.succeeded").await.unwrap();
        store.begin("evt_2", "payment.failed").await.unwrap();

        // Negative retention puts the cutoff in the future
        let janitor =
            IdempotencyJanitor::new(store.clone(), chrono::Duration::seconds(-5), Duration::from_secs(60));
        let purged = janitor.purge_once().await.unwrap();

        assert_eq!(purged, 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let janitor =
            IdempotencyJanitor::new(store, chrono::Duration::days(30), Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { janitor.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_sender_dropped() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let janitor =
            IdempotencyJanitor::new(store, chrono::Duration::days(30), Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { janitor.run(shutdown_rx).await });
        drop(shutdown_tx);

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
