//! Three-way reconciliation over one snapshot.
//!
//! Each cycle reads the authoritative directory once, converges the local
//! state store and the remote mail platform toward it entity by entity, then
//! sweeps addresses that stopped appearing. Store failures never abort the
//! cycle; the next cycle re-derives everything from the source and is the
//! retry.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use mailsync_core::{
    DirectorySource, Entity, LocalStore, RemoteMailStore, Snapshot, SyncError, SyncResult,
};

use crate::report::{CycleReport, CycleTracker, EntityOutcome};

/// Tuning knobs for the reconciler.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Maximum entities reconciled concurrently.
    pub concurrency: usize,

    /// Timeout applied to every individual store or source call.
    pub call_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout_secs: 30,
        }
    }
}

/// Drives one synchronization cycle at a time.
#[derive(Clone)]
pub struct Reconciler {
    source: Arc<dyn DirectorySource>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteMailStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a reconciler over the three collaborators.
    pub fn new(
        source: Arc<dyn DirectorySource>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteMailStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            source,
            local,
            remote,
            config,
        }
    }

    /// Run one full cycle: fetch, converge every entity, then sweep.
    ///
    /// Fails only when the source itself is unavailable; in that case no
    /// mutation has been attempted.
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let cycle_started_at = Utc::now();

        let snapshot = self
            .with_timeout("snapshot fetch", self.source.fetch_snapshot())
            .await?;

        info!(
            source = %self.source.display_name(),
            entities = snapshot.len(),
            skipped = snapshot.skipped,
            "Starting reconciliation cycle"
        );

        let rows_skipped = snapshot.skipped;
        let entities = Self::deduplicate(snapshot);
        let tracker = Arc::new(CycleTracker::new(entities.len() as u32, rows_skipped));

        // Bounded fan-out. Addresses are unique after deduplication, so no
        // two tasks ever write the same address.
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(entities.len());

        for entity in entities {
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                SyncError::source_unavailable_with_source("worker pool closed", e)
            })?;
            let engine = self.clone();
            let tracker = tracker.clone();

            handles.push(tokio::spawn(async move {
                let outcome = engine.reconcile_entity(&entity, cycle_started_at).await;
                tracker.record(outcome);
                drop(permit);
            }));
        }

        // Join barrier: the sweep must observe every mark_seen from this
        // cycle.
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconciliation worker panicked");
                tracker.record(EntityOutcome::Failed);
            }
        }

        self.sweep(cycle_started_at, &tracker).await;

        let report = tracker.finish();

        info!(
            created = report.created,
            activated = report.activated,
            renamed = report.renamed,
            unchanged = report.unchanged,
            errored = report.errored,
            swept = report.swept,
            sweep_errors = report.sweep_errors,
            duration_ms = report.duration_ms,
            "Cycle complete"
        );

        Ok(report)
    }

    /// Drop repeated addresses, keeping the first occurrence. The address is
    /// the identity key, so later duplicates carry no extra information.
    fn deduplicate(snapshot: Snapshot) -> Vec<Entity> {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut unique = Vec::with_capacity(snapshot.len());
        for entity in snapshot.entries {
            if seen.insert(entity.address.clone()) {
                unique.push(entity);
            } else {
                warn!(address = %entity.address, "Duplicate address in snapshot; ignoring");
            }
        }
        unique
    }

    /// Converge both stores toward the source for one entity.
    ///
    /// The local and remote sides are independent: a failure on one side
    /// never blocks work on the other. Outcome priority when several things
    /// happened: failed, created, activated, renamed, unchanged.
    async fn reconcile_entity(
        &self,
        entity: &Entity,
        cycle_started_at: DateTime<Utc>,
    ) -> EntityOutcome {
        let mut failed = false;
        let mut created = false;
        let mut activated = false;
        let mut renamed = false;

        // Local side.
        match self
            .with_timeout("local lookup", self.local.lookup(&entity.address))
            .await
        {
            Err(e) => {
                warn!(address = %entity.address, error = %e, "Local lookup failed");
                failed = true;
            }
            Ok(None) => {
                match self
                    .with_timeout(
                        "local create",
                        self.local.create(&entity.address, true, cycle_started_at),
                    )
                    .await
                {
                    Ok(()) => {
                        debug!(address = %entity.address, "Created local record");
                        created = true;
                    }
                    Err(e) => {
                        warn!(address = %entity.address, error = %e, "Local create failed");
                        failed = true;
                    }
                }
            }
            Ok(Some(record)) => {
                if record.active != entity.active {
                    match self
                        .with_timeout(
                            "local set_active",
                            self.local.set_active(&entity.address, entity.active),
                        )
                        .await
                    {
                        Ok(()) => {
                            debug!(address = %entity.address, active = entity.active, "Updated local active flag");
                            activated = entity.active;
                        }
                        Err(e) => {
                            warn!(address = %entity.address, error = %e, "Local set_active failed");
                            failed = true;
                        }
                    }
                }
                if let Err(e) = self
                    .with_timeout(
                        "local mark_seen",
                        self.local.mark_seen(&entity.address, cycle_started_at),
                    )
                    .await
                {
                    warn!(address = %entity.address, error = %e, "Local mark_seen failed");
                    failed = true;
                }
            }
        }

        // Remote side.
        match self
            .with_timeout("remote lookup", self.remote.lookup(&entity.address))
            .await
        {
            Err(e) => {
                warn!(address = %entity.address, error = %e, "Remote lookup failed");
                failed = true;
            }
            Ok(None) => match self
                .with_timeout("remote create", self.remote.create(entity))
                .await
            {
                Ok(()) => {
                    debug!(address = %entity.address, "Created mailbox");
                    created = true;
                }
                Err(e) => {
                    warn!(address = %entity.address, error = %e, "Remote create failed");
                    failed = true;
                }
            },
            Ok(Some(record)) => {
                if record.active != entity.active {
                    match self
                        .with_timeout(
                            "remote set_active",
                            self.remote.set_active(&entity.address, entity.active),
                        )
                        .await
                    {
                        Ok(()) => {
                            debug!(address = %entity.address, active = entity.active, "Updated mailbox active flag");
                            activated = entity.active;
                        }
                        Err(e) => {
                            warn!(address = %entity.address, error = %e, "Remote set_active failed");
                            failed = true;
                        }
                    }
                }
                if record.display_name != entity.display_name {
                    match self
                        .with_timeout(
                            "remote set_display_name",
                            self.remote
                                .set_display_name(&entity.address, &entity.display_name),
                        )
                        .await
                    {
                        Ok(()) => {
                            debug!(address = %entity.address, "Updated mailbox display name");
                            renamed = true;
                        }
                        Err(e) => {
                            warn!(address = %entity.address, error = %e, "Remote rename failed");
                            failed = true;
                        }
                    }
                }
            }
        }

        if failed {
            EntityOutcome::Failed
        } else if created {
            EntityOutcome::Created
        } else if activated {
            EntityOutcome::Activated
        } else if renamed {
            EntityOutcome::Renamed
        } else {
            EntityOutcome::Unchanged
        }
    }

    /// Deactivate every address still active locally that did not appear in
    /// this cycle's snapshot.
    ///
    /// The local record is deactivated regardless of the remote outcome:
    /// the address stays absent from future snapshots, so a failed remote
    /// deactivation is retried by the next cycle's sweep as long as the
    /// platform still reports the mailbox active.
    async fn sweep(&self, cycle_started_at: DateTime<Utc>, tracker: &CycleTracker) {
        let stale = match self
            .with_timeout(
                "sweep query",
                self.local.active_not_seen_since(cycle_started_at),
            )
            .await
        {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "Sweep query failed; skipping sweep this cycle");
                tracker.record_sweep_error();
                return;
            }
        };

        for address in stale {
            info!(address = %address, "Address absent from source; deactivating");

            let remote_ok = self.sweep_remote(&address).await;
            if !remote_ok {
                tracker.record_sweep_error();
            }

            match self
                .with_timeout("local set_active", self.local.set_active(&address, false))
                .await
            {
                Ok(()) => tracker.record_swept(),
                Err(e) => {
                    warn!(address = %address, error = %e, "Local deactivation failed");
                    tracker.record_sweep_error();
                }
            }
        }
    }

    /// Deactivate the mailbox if the platform still shows it active. Returns
    /// false when a remote call failed.
    async fn sweep_remote(&self, address: &str) -> bool {
        match self
            .with_timeout("remote lookup", self.remote.lookup(address))
            .await
        {
            Err(e) => {
                warn!(address = %address, error = %e, "Remote lookup failed during sweep");
                false
            }
            Ok(None) => true,
            Ok(Some(record)) if !record.active => true,
            Ok(Some(_)) => match self
                .with_timeout("remote set_active", self.remote.set_active(address, false))
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(address = %address, error = %e, "Remote deactivation failed");
                    false
                }
            },
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        match tokio::time::timeout(
            Duration::from_secs(self.config.call_timeout_secs),
            future,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(operation, self.config.call_timeout_secs)),
        }
    }
}
