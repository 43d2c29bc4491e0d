//! LDAP directory source implementation
//!
//! Connects and binds once per cycle, runs the configured search and turns
//! the result entries into a snapshot. Rows missing the address or name
//! attribute are counted and skipped, never fatal.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use mailsync_core::{DirectorySource, Entity, Snapshot, SyncError, SyncResult};

use crate::config::LdapConfig;

// LDAP resultCode for invalidCredentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Directory source backed by an LDAP/Active Directory server.
pub struct LdapDirectory {
    config: LdapConfig,
    display_name: String,
}

impl LdapDirectory {
    /// Create a new LDAP source with the given configuration.
    pub fn new(config: LdapConfig) -> SyncResult<Self> {
        config.validate()?;

        let display_name = format!("LDAP: {}", config.host);

        Ok(Self {
            config,
            display_name,
        })
    }

    /// Open a connection and bind. A fresh connection is made per cycle so
    /// a restarted directory server is picked up without process restart.
    async fn connect(&self) -> SyncResult<Ldap> {
        let url = self.config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(std::time::Duration::from_secs(
                self.config.connection_timeout_secs,
            ))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                SyncError::source_unavailable_with_source(
                    format!("failed to connect to {url}"),
                    e,
                )
            })?;

        // Drive the connection in the background for the lifetime of this
        // cycle's searches.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap.simple_bind(bind_dn, bind_password).await.map_err(|e| {
            SyncError::source_unavailable_with_source(format!("bind failed for {bind_dn}"), e)
        })?;

        if result.rc != 0 {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(SyncError::source_unavailable(format!(
                    "authentication failed for {bind_dn}"
                )));
            }
            return Err(SyncError::source_unavailable(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(ldap)
    }

    /// Turn a search entry into an entity, or `None` when a required
    /// attribute is missing or empty.
    fn entry_to_entity(&self, entry: &SearchEntry) -> Option<Entity> {
        // Directory servers can return pseudo-entries without a DN; they
        // carry no principal.
        if entry.dn.is_empty() {
            return None;
        }

        let address = entry
            .attrs
            .get(&self.config.address_attribute)
            .and_then(|values| values.first())
            .filter(|value| !value.is_empty())?;

        let display_name = entry
            .attrs
            .get(&self.config.name_attribute)
            .and_then(|values| values.first())?;

        // Anything the search filter matches is active; disabled accounts
        // are excluded by the filter itself.
        Some(Entity::new(address.clone(), display_name.clone()))
    }
}

#[async_trait]
impl DirectorySource for LdapDirectory {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn test_connection(&self) -> SyncResult<()> {
        let mut ldap = self.connect().await?;
        let _ = ldap.unbind().await;
        Ok(())
    }

    async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
        let mut ldap = self.connect().await?;

        let attrs = vec![
            self.config.address_attribute.as_str(),
            self.config.name_attribute.as_str(),
        ];

        let (entries, _result) = ldap
            .search(
                &self.config.base_dn,
                Scope::Subtree,
                &self.config.filter,
                attrs,
            )
            .await
            .map_err(|e| {
                SyncError::source_unavailable_with_source("search request failed", e)
            })?
            .success()
            .map_err(|e| {
                SyncError::source_unavailable_with_source("search returned an error result", e)
            })?;

        let _ = ldap.unbind().await;

        let mut snapshot_entries = Vec::with_capacity(entries.len());
        let mut skipped: u32 = 0;

        for entry in entries {
            let entry = SearchEntry::construct(entry);
            match self.entry_to_entity(&entry) {
                Some(entity) => snapshot_entries.push(entity),
                None => {
                    skipped += 1;
                    debug!(dn = %entry.dn, "Skipping malformed directory row");
                }
            }
        }

        info!(
            host = %self.config.host,
            entries = snapshot_entries.len(),
            skipped = skipped,
            "Fetched directory snapshot"
        );

        Ok(Snapshot::new(snapshot_entries, skipped))
    }
}
