//! HTTP client for the mail platform admin API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use mailsync_core::{Entity, RemoteMailStore, RemoteRecord, StoreKind, SyncError, SyncResult};

use crate::config::RemoteMailConfig;

const API_KEY_HEADER: &str = "X-API-Key";

/// Wire representation of a mailbox as the platform returns it.
#[derive(Debug, Deserialize)]
struct MailboxResponse {
    active: bool,
    name: String,
}

/// Body for mailbox creation.
#[derive(Debug, Serialize)]
struct CreateMailboxRequest<'a> {
    address: &'a str,
    name: &'a str,
    active: bool,
    quota_mb: u32,
}

/// Body for partial mailbox updates. Absent fields are left untouched by
/// the platform.
#[derive(Debug, Default, Serialize)]
struct UpdateMailboxRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Client for the mail platform admin API.
pub struct RemoteMailClient {
    config: RemoteMailConfig,
    client: Client,
}

impl RemoteMailClient {
    /// Create a client from the given configuration.
    pub fn new(config: RemoteMailConfig) -> SyncResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certificate)
            .build()
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Remote,
                    "init",
                    "failed to build HTTP client",
                    e,
                )
            })?;

        Ok(Self { config, client })
    }

    fn mailbox_url(&self, address: &str) -> String {
        format!(
            "{}/api/v1/mailbox/{}",
            self.config.base_url.trim_end_matches('/'),
            address
        )
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/api/v1/mailbox",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn check_status(
        response: reqwest::Response,
        operation: &'static str,
    ) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::store(
            StoreKind::Remote,
            operation,
            format!("HTTP {status}: {body}"),
        ))
    }

    async fn patch(&self, address: &str, body: UpdateMailboxRequest<'_>) -> SyncResult<()> {
        let response = self
            .client
            .patch(self.mailbox_url(address))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Remote,
                    "update",
                    format!("request failed for {address}"),
                    e,
                )
            })?;

        Self::check_status(response, "update").await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteMailStore for RemoteMailClient {
    async fn lookup(&self, address: &str) -> SyncResult<Option<RemoteRecord>> {
        let response = self
            .client
            .get(self.mailbox_url(address))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Remote,
                    "lookup",
                    format!("request failed for {address}"),
                    e,
                )
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check_status(response, "lookup").await?;
        let mailbox: MailboxResponse = response.json().await.map_err(|e| {
            SyncError::store_with_source(
                StoreKind::Remote,
                "lookup",
                format!("malformed response for {address}"),
                e,
            )
        })?;

        Ok(Some(RemoteRecord {
            active: mailbox.active,
            display_name: mailbox.name,
        }))
    }

    async fn create(&self, entity: &Entity) -> SyncResult<()> {
        debug!(address = %entity.address, "Creating mailbox");

        let body = CreateMailboxRequest {
            address: &entity.address,
            name: &entity.display_name,
            active: entity.active,
            quota_mb: self.config.default_quota_mb,
        };

        let response = self
            .client
            .post(self.collection_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Remote,
                    "create",
                    format!("request failed for {}", entity.address),
                    e,
                )
            })?;

        Self::check_status(response, "create").await?;
        Ok(())
    }

    async fn set_active(&self, address: &str, active: bool) -> SyncResult<()> {
        debug!(address = %address, active = active, "Updating mailbox active flag");
        self.patch(
            address,
            UpdateMailboxRequest {
                active: Some(active),
                ..Default::default()
            },
        )
        .await
    }

    async fn set_display_name(&self, address: &str, name: &str) -> SyncResult<()> {
        debug!(address = %address, "Updating mailbox display name");
        self.patch(
            address,
            UpdateMailboxRequest {
                name: Some(name),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> RemoteMailClient {
        RemoteMailClient::new(RemoteMailConfig::new(server.uri(), "test-key")).unwrap()
    }

    #[tokio::test]
    async fn lookup_parses_mailbox() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mailbox/a@x.com"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "active": true,
                    "name": "Alice",
                    "quota_mb": 256
                })),
            )
            .mount(&server)
            .await;

        let record = client(&server).await.lookup("a@x.com").await.unwrap();
        assert_eq!(
            record,
            Some(RemoteRecord {
                active: true,
                display_name: "Alice".to_string()
            })
        );
    }

    #[tokio::test]
    async fn lookup_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mailbox/ghost@x.com"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let record = client(&server).await.lookup("ghost@x.com").await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn lookup_surfaces_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/mailbox/a@x.com"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).await.lookup("a@x.com").await.unwrap_err();
        assert!(!err.is_cycle_fatal());
    }

    #[tokio::test]
    async fn create_sends_default_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/mailbox"))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(body_json(json!({
                "address": "a@x.com",
                "name": "Alice",
                "active": true,
                "quota_mb": 256
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let entity = Entity::new("a@x.com", "Alice");
        client(&server).await.create(&entity).await.unwrap();
    }

    #[tokio::test]
    async fn set_active_is_a_partial_update() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/mailbox/a@x.com"))
            .and(body_json(json!({ "active": false })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .set_active("a@x.com", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_display_name_is_a_partial_update() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/mailbox/a@x.com"))
            .and(body_json(json!({ "name": "Alice Smith" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .set_display_name("a@x.com", "Alice Smith")
            .await
            .unwrap();
    }
}
