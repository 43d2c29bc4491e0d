//! Directory entity model.
//!
//! Canonical representation of a directory principal and the comparison
//! contract used by the reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory principal as reported by the authoritative source.
///
/// The address is the identity key: two entities with the same address are
/// the same logical principal across the source and both dependent stores.
/// Comparison against a store's record is strict — byte-for-byte for display
/// names, boolean equality for the active flag. No case folding or trimming
/// is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Primary mail address (case-sensitive, immutable identity key).
    pub address: String,

    /// Human-readable display name.
    pub display_name: String,

    /// Whether the principal is active in the source.
    pub active: bool,
}

impl Entity {
    /// Create an active entity.
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
            active: true,
        }
    }

    /// Whether a remote record already matches this entity exactly.
    #[must_use]
    pub fn matches_remote(&self, record: &RemoteRecord) -> bool {
        self.active == record.active && self.display_name == record.display_name
    }
}

/// The set of entities returned by one source query in one cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Entities in source order.
    pub entries: Vec<Entity>,

    /// Rows dropped because a required attribute was missing or empty.
    pub skipped: u32,

    /// When the snapshot was taken.
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a snapshot taken now.
    #[must_use]
    pub fn new(entries: Vec<Entity>, skipped: u32) -> Self {
        Self {
            entries,
            skipped,
            fetched_at: Utc::now(),
        }
    }

    /// Number of well-formed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the source returned no well-formed entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the local state store knows about an address.
///
/// Invariant: `active == true` implies the address appeared in some snapshot
/// at or before `last_seen_at` and no later sweep has deactivated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Whether the address is considered active locally.
    pub active: bool,

    /// Timestamp of the most recent cycle in which the address appeared.
    pub last_seen_at: DateTime<Utc>,
}

/// What the remote mail platform reports for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Whether the mailbox is active on the platform.
    pub active: bool,

    /// Display name stored on the platform.
    pub display_name: String,
}
