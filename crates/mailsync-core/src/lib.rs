//! mailsync core types
//!
//! Entity model, snapshot type, error taxonomy and the trait contracts for
//! the three collaborators of the reconciler: the authoritative directory
//! source, the local persisted state store and the remote mail platform.

pub mod entity;
pub mod error;
pub mod traits;

pub use entity::{Entity, LocalRecord, RemoteRecord, Snapshot};
pub use error::{StoreKind, SyncError, SyncResult};
pub use traits::{DirectorySource, LocalStore, RemoteMailStore};
