//! Synchronization error types
//!
//! Error definitions with cycle-fatal/retryable classification. Only source
//! connection or authentication failures abort a cycle; store failures are
//! logged per entity and retried structurally on the next cycle.

use thiserror::Error;

/// Which dependent store an operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The local persisted state database.
    Local,
    /// The remote mail platform API.
    Remote,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Local => write!(f, "local"),
            StoreKind::Remote => write!(f, "remote"),
        }
    }
}

/// Error that can occur during a synchronization cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The directory source could not be reached or refused the bind.
    /// Fatal for the cycle: no mutations are attempted.
    #[error("directory source unavailable: {message}")]
    SourceUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A store operation failed. Non-fatal: the affected entity is counted
    /// as errored and the cycle continues.
    #[error("{store} store {operation} failed: {message}")]
    Store {
        store: StoreKind,
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A store or source call exceeded its per-call timeout.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// Configuration is invalid. Startup-time only; fatal to the process.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl SyncError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        SyncError::SourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a source-unavailable error with an underlying cause.
    pub fn source_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::SourceUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store-operation error.
    pub fn store(store: StoreKind, operation: &'static str, message: impl Into<String>) -> Self {
        SyncError::Store {
            store,
            operation,
            message: message.into(),
            source: None,
        }
    }

    /// Create a store-operation error with an underlying cause.
    pub fn store_with_source(
        store: StoreKind,
        operation: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::Store {
            store,
            operation,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: &'static str, timeout_secs: u64) -> Self {
        SyncError::Timeout {
            operation,
            timeout_secs,
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        SyncError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole cycle.
    ///
    /// Store failures never abort a cycle; reconciliation is idempotent and
    /// re-derived from the source, so the next cycle is the retry.
    #[must_use]
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable { .. } | SyncError::InvalidConfiguration { .. }
        )
    }

    /// Whether the condition may resolve itself by the next cycle.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::InvalidConfiguration { .. })
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_fatal_classification() {
        assert!(SyncError::source_unavailable("refused").is_cycle_fatal());
        assert!(SyncError::invalid_configuration("bad port").is_cycle_fatal());
        assert!(!SyncError::store(StoreKind::Remote, "create", "500").is_cycle_fatal());
        assert!(!SyncError::timeout("remote lookup", 30).is_cycle_fatal());
    }

    #[test]
    fn retryable_classification() {
        assert!(SyncError::source_unavailable("refused").is_retryable());
        assert!(SyncError::store(StoreKind::Local, "set_active", "locked").is_retryable());
        assert!(SyncError::timeout("local lookup", 30).is_retryable());
        assert!(!SyncError::invalid_configuration("bad port").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::store(StoreKind::Remote, "set_display_name", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "remote store set_display_name failed: HTTP 500"
        );

        let err = SyncError::timeout("remote lookup", 30);
        assert_eq!(err.to_string(), "remote lookup timed out after 30 seconds");
    }

    #[test]
    fn error_with_source() {
        let io = std::io::Error::other("underlying");
        let err = SyncError::store_with_source(StoreKind::Local, "lookup", "db closed", io);
        if let SyncError::Store { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Store variant");
        }
    }
}
