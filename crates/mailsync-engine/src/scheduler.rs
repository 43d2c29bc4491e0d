//! Fixed-interval cycle scheduler.
//!
//! Runs one cycle at a time with a fixed sleep between cycles, so cycles
//! never overlap. Shutdown is observed between cycles: an in-flight cycle
//! always finishes.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::reconciler::Reconciler;

/// Scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Seconds to sleep between the end of one cycle and the start of the
    /// next.
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Drives reconciliation cycles until cancelled.
pub struct CycleScheduler {
    reconciler: Reconciler,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl CycleScheduler {
    /// Create a scheduler over a reconciler and a shutdown token.
    pub fn new(
        reconciler: Reconciler,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            config,
            shutdown,
        }
    }

    /// Loop: run a cycle, log the outcome, sleep, repeat. Returns once the
    /// shutdown token is cancelled. A failed cycle is logged and the loop
    /// continues; the next cycle is the retry.
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.interval_secs,
            "Starting synchronization loop"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.reconciler.run_cycle().await {
                error!(error = %e, "Cycle failed");
            }

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(self.config.interval_secs)) => {}
            }
        }

        info!("Synchronization loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::ReconcilerConfig;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use mailsync_core::{
        DirectorySource, Entity, LocalRecord, LocalStore, RemoteMailStore, RemoteRecord,
        Snapshot, SyncResult,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl DirectorySource for CountingSource {
        fn display_name(&self) -> &str {
            "counting"
        }

        async fn test_connection(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Snapshot::new(vec![], 0))
        }
    }

    struct NullLocal;

    #[async_trait]
    impl LocalStore for NullLocal {
        async fn lookup(&self, _address: &str) -> SyncResult<Option<LocalRecord>> {
            Ok(None)
        }

        async fn create(
            &self,
            _address: &str,
            _active: bool,
            _seen_at: DateTime<Utc>,
        ) -> SyncResult<()> {
            Ok(())
        }

        async fn set_active(&self, _address: &str, _active: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn mark_seen(&self, _address: &str, _seen_at: DateTime<Utc>) -> SyncResult<()> {
            Ok(())
        }

        async fn active_not_seen_since(
            &self,
            _cycle_started_at: DateTime<Utc>,
        ) -> SyncResult<Vec<String>> {
            Ok(vec![])
        }
    }

    struct NullRemote;

    #[async_trait]
    impl RemoteMailStore for NullRemote {
        async fn lookup(&self, _address: &str) -> SyncResult<Option<RemoteRecord>> {
            Ok(None)
        }

        async fn create(&self, _entity: &Entity) -> SyncResult<()> {
            Ok(())
        }

        async fn set_active(&self, _address: &str, _active: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn set_display_name(&self, _address: &str, _name: &str) -> SyncResult<()> {
            Ok(())
        }
    }

    fn scheduler(
        source: Arc<CountingSource>,
        interval_secs: u64,
        shutdown: CancellationToken,
    ) -> CycleScheduler {
        let reconciler = Reconciler::new(
            source,
            Arc::new(NullLocal),
            Arc::new(NullRemote),
            ReconcilerConfig::default(),
        );
        CycleScheduler::new(reconciler, SchedulerConfig { interval_secs }, shutdown)
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_loop_without_a_cycle() {
        let source = Arc::new(CountingSource {
            fetches: AtomicU32::new(0),
        });
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        scheduler(source.clone(), 1, shutdown).run().await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn in_flight_cycle_finishes_before_shutdown() {
        let source = Arc::new(CountingSource {
            fetches: AtomicU32::new(0),
        });
        let shutdown = CancellationToken::new();
        let scheduler = scheduler(source.clone(), 3600, shutdown.clone());

        let handle = tokio::spawn(async move { scheduler.run().await });

        // Give the first cycle time to run, then cancel during the sleep.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }
}
