//! Environment-based daemon configuration.
//!
//! All settings come from `MAILSYNC_*` environment variables, loaded once at
//! startup with fail-fast validation. Secrets never appear in `Debug` output
//! (the nested configs redact them).

use std::path::PathBuf;

use mailsync_core::{SyncError, SyncResult};
use mailsync_ldap::LdapConfig;
use mailsync_remote::RemoteMailConfig;

const DEFAULT_STATE_DB_PATH: &str = "mailsync.db";
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory source settings.
    pub ldap: LdapConfig,

    /// Mail platform API settings.
    pub remote: RemoteMailConfig,

    /// Path of the SQLite state database.
    pub state_db_path: PathBuf,

    /// Seconds between cycles.
    pub interval_secs: u64,

    /// Entities reconciled concurrently within a cycle.
    pub concurrency: usize,

    /// Per-call timeout for store and source operations.
    pub call_timeout_secs: u64,

    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut ldap = LdapConfig::new(
            required(&lookup, "MAILSYNC_LDAP_HOST")?,
            required(&lookup, "MAILSYNC_LDAP_BASE_DN")?,
            required(&lookup, "MAILSYNC_LDAP_BIND_DN")?,
        )
        .with_password(required(&lookup, "MAILSYNC_LDAP_BIND_PASSWORD")?);

        if let Some(port) = parsed(&lookup, "MAILSYNC_LDAP_PORT")? {
            ldap.port = port;
        }
        if let Some(filter) = lookup("MAILSYNC_LDAP_FILTER") {
            ldap.filter = filter;
        }
        if let Some(attr) = lookup("MAILSYNC_LDAP_ADDRESS_ATTRIBUTE") {
            ldap.address_attribute = attr;
        }
        if let Some(attr) = lookup("MAILSYNC_LDAP_NAME_ATTRIBUTE") {
            ldap.name_attribute = attr;
        }
        if let Some(use_ssl) = parsed_bool(&lookup, "MAILSYNC_LDAP_USE_SSL")? {
            ldap.use_ssl = use_ssl;
        }
        if let Some(use_starttls) = parsed_bool(&lookup, "MAILSYNC_LDAP_USE_STARTTLS")? {
            ldap.use_starttls = use_starttls;
        }
        ldap.validate()?;

        let mut remote = RemoteMailConfig::new(
            required(&lookup, "MAILSYNC_API_URL")?,
            required(&lookup, "MAILSYNC_API_KEY")?,
        );
        if let Some(quota) = parsed(&lookup, "MAILSYNC_DEFAULT_QUOTA_MB")? {
            remote.default_quota_mb = quota;
        }
        if let Some(verify) = parsed_bool(&lookup, "MAILSYNC_VERIFY_TLS")? {
            remote.verify_certificate = verify;
        }
        remote.validate()?;

        let interval_secs =
            parsed(&lookup, "MAILSYNC_INTERVAL_SECS")?.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(SyncError::invalid_configuration(
                "MAILSYNC_INTERVAL_SECS must be greater than zero",
            ));
        }

        let concurrency = parsed(&lookup, "MAILSYNC_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(SyncError::invalid_configuration(
                "MAILSYNC_CONCURRENCY must be greater than zero",
            ));
        }

        let call_timeout_secs =
            parsed(&lookup, "MAILSYNC_CALL_TIMEOUT_SECS")?.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS);

        let state_db_path = lookup("MAILSYNC_STATE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DB_PATH));

        let log_filter = lookup("MAILSYNC_LOG_FILTER").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            ldap,
            remote,
            state_db_path,
            interval_secs,
            concurrency,
            call_timeout_secs,
            log_filter,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> SyncResult<String> {
    match lookup(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SyncError::invalid_configuration(format!("{key} is required"))),
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> SyncResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            SyncError::invalid_configuration(format!("{key} has an invalid value: {raw}"))
        }),
    }
}

fn parsed_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> SyncResult<Option<bool>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(SyncError::invalid_configuration(format!(
                "{key} must be a boolean, got: {raw}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MAILSYNC_LDAP_HOST", "ldap.example.com"),
            ("MAILSYNC_LDAP_BASE_DN", "dc=example,dc=com"),
            ("MAILSYNC_LDAP_BIND_DN", "cn=sync,dc=example,dc=com"),
            ("MAILSYNC_LDAP_BIND_PASSWORD", "hunter2"),
            ("MAILSYNC_API_URL", "https://mail.example.com"),
            ("MAILSYNC_API_KEY", "secret"),
        ])
    }

    fn load(env: &HashMap<&str, &str>) -> SyncResult<AppConfig> {
        AppConfig::from_lookup(|key| env.get(key).map(ToString::to_string))
    }

    #[test]
    fn minimal_environment_gets_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.call_timeout_secs, 30);
        assert_eq!(config.state_db_path, PathBuf::from("mailsync.db"));
        assert_eq!(config.ldap.port, 389);
        assert_eq!(config.remote.default_quota_mb, 256);
    }

    #[test]
    fn missing_required_variable_fails() {
        let mut env = base_env();
        env.remove("MAILSYNC_API_KEY");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("MAILSYNC_API_KEY"));
    }

    #[test]
    fn overrides_are_applied() {
        let mut env = base_env();
        env.insert("MAILSYNC_LDAP_PORT", "636");
        env.insert("MAILSYNC_LDAP_USE_SSL", "true");
        env.insert("MAILSYNC_INTERVAL_SECS", "60");
        env.insert("MAILSYNC_DEFAULT_QUOTA_MB", "1024");
        env.insert("MAILSYNC_STATE_DB", "/var/lib/mailsync/state.db");

        let config = load(&env).unwrap();
        assert_eq!(config.ldap.port, 636);
        assert!(config.ldap.use_ssl);
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.remote.default_quota_mb, 1024);
        assert_eq!(
            config.state_db_path,
            PathBuf::from("/var/lib/mailsync/state.db")
        );
    }

    #[test]
    fn invalid_numeric_value_fails() {
        let mut env = base_env();
        env.insert("MAILSYNC_INTERVAL_SECS", "soon");
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert("MAILSYNC_INTERVAL_SECS", "0");
        assert!(load(&env).is_err());
    }

    #[test]
    fn invalid_boolean_value_fails() {
        let mut env = base_env();
        env.insert("MAILSYNC_VERIFY_TLS", "maybe");
        assert!(load(&env).is_err());
    }

    #[test]
    fn conflicting_tls_modes_fail_validation() {
        let mut env = base_env();
        env.insert("MAILSYNC_LDAP_USE_SSL", "true");
        env.insert("MAILSYNC_LDAP_USE_STARTTLS", "true");
        assert!(load(&env).is_err());
    }
}
