//! Mail platform API configuration.

use serde::{Deserialize, Serialize};

use mailsync_core::{SyncError, SyncResult};

/// Configuration for the mail platform admin API client.
#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteMailConfig {
    /// Base URL of the admin API (e.g., "https://mail.example.com").
    pub base_url: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Storage quota in megabytes assigned to newly created mailboxes.
    #[serde(default = "default_quota_mb")]
    pub default_quota_mb: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether to verify the platform's TLS certificate.
    #[serde(default = "default_verify_certificate")]
    pub verify_certificate: bool,
}

impl std::fmt::Debug for RemoteMailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMailConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***REDACTED***")
            .field("default_quota_mb", &self.default_quota_mb)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("verify_certificate", &self.verify_certificate)
            .finish()
    }
}

fn default_quota_mb() -> u32 {
    256
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_verify_certificate() -> bool {
    true
}

impl RemoteMailConfig {
    /// Create a config with required fields and defaults elsewhere.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_quota_mb: default_quota_mb(),
            request_timeout_secs: default_request_timeout_secs(),
            verify_certificate: default_verify_certificate(),
        }
    }

    /// Set the quota assigned to new mailboxes.
    #[must_use]
    pub fn with_default_quota_mb(mut self, quota_mb: u32) -> Self {
        self.default_quota_mb = quota_mb;
        self
    }

    /// Disable TLS certificate verification. For platforms with self-signed
    /// certificates only.
    #[must_use]
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_certificate = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.base_url.is_empty() {
            return Err(SyncError::invalid_configuration(
                "mail platform base URL is required",
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(SyncError::invalid_configuration(format!(
                "mail platform base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.api_key.is_empty() {
            return Err(SyncError::invalid_configuration(
                "mail platform API key is required",
            ));
        }
        if self.default_quota_mb == 0 {
            return Err(SyncError::invalid_configuration(
                "default quota must be greater than zero",
            ));
        }
        Ok(())
    }
}
