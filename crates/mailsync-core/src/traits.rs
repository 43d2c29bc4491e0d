//! Collaborator trait contracts
//!
//! The reconciler drives three collaborators: one authoritative directory
//! source and two dependent stores. The stores are reconciled against the
//! source independently — never against each other — so either one can be
//! rebuilt from the source alone and one can fail while the other succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::{Entity, LocalRecord, RemoteRecord, Snapshot};
use crate::error::SyncResult;

/// The authoritative directory (LDAP/Active Directory).
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Display name for this source instance, for logging.
    fn display_name(&self) -> &str;

    /// Verify that the source can be reached and the bind succeeds.
    async fn test_connection(&self) -> SyncResult<()>;

    /// Fetch the current set of entities.
    ///
    /// Individual malformed rows are skipped and counted in the snapshot,
    /// never raised. The call fails only on connection or authentication
    /// failure, which aborts the whole cycle.
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot>;
}

/// The local persisted cache of last-known state per address.
///
/// This is the basis for sweep detection, so it must survive process
/// restarts. Every address ever seen has exactly one record; records are
/// deactivated, never deleted.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Look up the record for an address.
    async fn lookup(&self, address: &str) -> SyncResult<Option<LocalRecord>>;

    /// Create a record for an address first seen at `seen_at`.
    async fn create(&self, address: &str, active: bool, seen_at: DateTime<Utc>) -> SyncResult<()>;

    /// Update the active flag for a known address.
    async fn set_active(&self, address: &str, active: bool) -> SyncResult<()>;

    /// Advance the last-seen marker for a known address.
    async fn mark_seen(&self, address: &str, seen_at: DateTime<Utc>) -> SyncResult<()>;

    /// Addresses still marked active whose last-seen marker predates the
    /// given cycle start. These are the sweep candidates.
    async fn active_not_seen_since(
        &self,
        cycle_started_at: DateTime<Utc>,
    ) -> SyncResult<Vec<String>>;
}

/// The remote mail platform's own record of each entity, mutated via its
/// admin API.
#[async_trait]
pub trait RemoteMailStore: Send + Sync {
    /// Look up the mailbox for an address. `None` if the platform has no
    /// record of it.
    async fn lookup(&self, address: &str) -> SyncResult<Option<RemoteRecord>>;

    /// Create a mailbox with the entity's name and active flag and the
    /// platform's configured default quota.
    async fn create(&self, entity: &Entity) -> SyncResult<()>;

    /// Update only the active flag (partial update).
    async fn set_active(&self, address: &str, active: bool) -> SyncResult<()>;

    /// Update only the display name (partial update).
    async fn set_display_name(&self, address: &str, name: &str) -> SyncResult<()>;
}
