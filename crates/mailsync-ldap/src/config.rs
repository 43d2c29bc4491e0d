//! LDAP source configuration
//!
//! Configuration types for the LDAP/Active Directory connection and the
//! search that produces each cycle's snapshot.

use serde::{Deserialize, Serialize};

use mailsync_core::{SyncError, SyncResult};

/// Configuration for the LDAP directory source.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on a plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN for the search (e.g., "dc=example,dc=com").
    pub base_dn: String,

    /// Bind DN for authentication.
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Search filter selecting the principals to synchronize. Disabled
    /// accounts are expected to be excluded here; everything the filter
    /// matches is treated as active.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Attribute holding the primary mail address (the identity key).
    #[serde(default = "default_address_attribute")]
    pub address_attribute: String,

    /// Attribute holding the display name.
    #[serde(default = "default_name_attribute")]
    pub name_attribute: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("filter", &self.filter)
            .field("address_attribute", &self.address_attribute)
            .field("name_attribute", &self.name_attribute)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_filter() -> String {
    "(&(objectClass=user)(objectCategory=person))".to_string()
}

fn default_address_attribute() -> String {
    "mailPrimaryAddress".to_string()
}

fn default_name_attribute() -> String {
    "displayName".to_string()
}

fn default_connection_timeout_secs() -> u64 {
    30
}

impl LdapConfig {
    /// Create a new config with required fields and defaults elsewhere.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: None,
            filter: default_filter(),
            address_attribute: default_address_attribute(),
            name_attribute: default_name_attribute(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }

    /// Set the bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS) and switch to the LDAPS port.
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Set the search filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// The connection URL for this configuration.
    #[must_use]
    pub fn url(&self) -> String {
        if self.use_ssl {
            format!("ldaps://{}:{}", self.host, self.port)
        } else {
            format!("ldap://{}:{}", self.host, self.port)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.host.is_empty() {
            return Err(SyncError::invalid_configuration("LDAP host is required"));
        }
        if self.base_dn.is_empty() {
            return Err(SyncError::invalid_configuration("LDAP base DN is required"));
        }
        if self.bind_dn.is_empty() {
            return Err(SyncError::invalid_configuration("LDAP bind DN is required"));
        }
        if self.use_ssl && self.use_starttls {
            return Err(SyncError::invalid_configuration(
                "use_ssl and use_starttls are mutually exclusive",
            ));
        }
        if self.address_attribute.is_empty() || self.name_attribute.is_empty() {
            return Err(SyncError::invalid_configuration(
                "address and name attributes must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LdapConfig::new("ldap.example.com", "dc=example,dc=com", "cn=sync");
        assert_eq!(config.port, 389);
        assert_eq!(config.address_attribute, "mailPrimaryAddress");
        assert_eq!(config.name_attribute, "displayName");
        assert_eq!(config.filter, "(&(objectClass=user)(objectCategory=person))");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn url_scheme_follows_ssl() {
        let config = LdapConfig::new("ldap.example.com", "dc=example,dc=com", "cn=sync");
        assert_eq!(config.url(), "ldap://ldap.example.com:389");

        let config = config.with_ssl();
        assert_eq!(config.url(), "ldaps://ldap.example.com:636");
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let config = LdapConfig::new("", "dc=example,dc=com", "cn=sync");
        assert!(config.validate().is_err());

        let config = LdapConfig::new("ldap.example.com", "", "cn=sync");
        assert!(config.validate().is_err());

        let mut config = LdapConfig::new("ldap.example.com", "dc=example,dc=com", "cn=sync");
        config.use_ssl = true;
        config.use_starttls = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let config = LdapConfig::new("ldap.example.com", "dc=example,dc=com", "cn=sync")
            .with_password("hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("***REDACTED***"));
        assert!(!rendered.contains("hunter2"));
    }
}
