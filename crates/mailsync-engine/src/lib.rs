//! Reconciliation engine
//!
//! The per-cycle convergence algorithm (entity fan-out plus sweep), the
//! cycle report, and the fixed-interval scheduler that drives cycles until
//! shutdown.

pub mod reconciler;
pub mod report;
pub mod scheduler;

pub use reconciler::{Reconciler, ReconcilerConfig};
pub use report::{CycleReport, EntityOutcome};
pub use scheduler::{CycleScheduler, SchedulerConfig};
