//! SQLite-backed local state store
//!
//! Persists the last-known state of every address ever seen, which is what
//! sweep detection is derived from. Records are deactivated, never deleted.

pub mod store;

pub use store::SqliteStateDb;
