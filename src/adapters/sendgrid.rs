use crate::config::ProviderSettings;
use crate::domain::model::BounceNotification;
use crate::domain::ports::{BounceSource, SourceConnector};
use crate::utils::error::{BounceError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Entry of `GET /suppression/bounces`.
#[derive(Debug, Clone, Deserialize)]
struct BounceEntry {
    email: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created: Option<i64>,
}

impl BounceEntry {
    fn into_notification(self) -> Option<BounceNotification> {
        let address = self.email.filter(|email| !email.trim().is_empty())?;
        let status_code = self
            .status
            .map(|status| status.trim().to_string())
            .filter(|status| !status.is_empty());
        let observed_at = self
            .created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Some(BounceNotification {
            address,
            reason: self.reason.unwrap_or_default(),
            status_code,
            observed_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    settings: ProviderSettings,
}

impl HttpConnector {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl SourceConnector for HttpConnector {
    type Source = SendGridSource;

    fn connect(&self, credential: &str) -> Result<SendGridSource> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.settings.timeout_seconds))
            .build()
            .map_err(|e| BounceError::ClientUnavailable {
                message: e.to_string(),
            })?;

        let bounces_url = Url::parse(&format!(
            "{}{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.bounces_path
        ))?;

        Ok(SendGridSource {
            client,
            bounces_url,
            api_key: credential.to_string(),
        })
    }
}

pub struct SendGridSource {
    client: Client,
    bounces_url: Url,
    api_key: String,
}

impl SendGridSource {
    fn entry_url(&self, address: &str) -> Result<Url> {
        let mut url = self.bounces_url.clone();
        url.path_segments_mut()
            .map_err(|_| BounceError::ConfigError {
                message: format!("Cannot append path segment to {}", self.bounces_url),
            })?
            .pop_if_empty()
            .push(address);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl BounceSource for SendGridSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<BounceNotification>> {
        tracing::debug!("Fetching up to {} bounces from {}", limit, self.bounces_url);

        let response = self
            .client
            .get(self.bounces_url.clone())
            .bearer_auth(&self.api_key)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| BounceError::SourceUnavailable {
                message: e.to_string(),
            })?;

        tracing::debug!("Bounce API response status: {}", response.status());

        if !response.status().is_success() {
            return Err(BounceError::SourceUnavailable {
                message: format!("Bounce API request failed with status: {}", response.status()),
            });
        }

        let entries: Vec<BounceEntry> =
            response.json().await.map_err(|e| BounceError::SourceUnavailable {
                message: format!("Malformed bounce list: {}", e),
            })?;

        let total = entries.len();
        let notifications: Vec<BounceNotification> = entries
            .into_iter()
            .filter_map(BounceEntry::into_notification)
            .collect();
        if notifications.len() < total {
            tracing::debug!(
                "Dropped {} bounce entries without an email address",
                total - notifications.len()
            );
        }

        Ok(notifications)
    }

    async fn acknowledge(&self, address: &str) -> Result<()> {
        let url = self.entry_url(address)?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BounceError::AcknowledgeFailed {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BounceError::AcknowledgeFailed {
                address: address.to_string(),
                message: format!("status {}", response.status()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn connector_for(server: &MockServer) -> HttpConnector {
        HttpConnector::new(ProviderSettings {
            base_url: server.base_url(),
            ..ProviderSettings::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_parses_bounce_list() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/suppression/bounces")
                .query_param("limit", "50")
                .header("authorization", "Bearer SG.test-key");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"email": "a@x.com", "reason": "550 5.1.1 user unknown", "status": "5.1.1", "created": 1700000000},
                    {"email": "b@x.com", "reason": "mailbox full", "status": " ", "created": 1700000100}
                ]));
        });

        let source = connector_for(&server).connect("SG.test-key").unwrap();
        let bounces = source.fetch(50).await.unwrap();

        api_mock.assert();
        assert_eq!(bounces.len(), 2);
        assert_eq!(bounces[0].address, "a@x.com");
        assert_eq!(bounces[0].status_code.as_deref(), Some("5.1.1"));
        assert_eq!(bounces[0].observed_at.timestamp(), 1_700_000_000);
        assert_eq!(bounces[1].status_code, None);
        assert_eq!(bounces[1].reason, "mailbox full");
    }

    #[tokio::test]
    async fn test_fetch_drops_entries_without_email() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/suppression/bounces");
            then.status(200).json_body(serde_json::json!([
                {"email": "", "reason": "user unknown"},
                {"reason": "user unknown", "status": "5.1.1"},
                {"email": "c@x.com"}
            ]));
        });

        let source = connector_for(&server).connect("key").unwrap();
        let bounces = source.fetch(500).await.unwrap();

        assert_eq!(bounces.len(), 1);
        assert_eq!(bounces[0].address, "c@x.com");
        assert_eq!(bounces[0].reason, "");
        assert_eq!(bounces[0].observed_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_source_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/suppression/bounces");
            then.status(401).body("unauthorized");
        });

        let source = connector_for(&server).connect("bad-key").unwrap();
        let err = source.fetch(500).await.unwrap_err();

        assert!(matches!(err, BounceError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_source_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/suppression/bounces");
            then.status(200).body("<html>maintenance</html>");
        });

        let source = connector_for(&server).connect("key").unwrap();
        let err = source.fetch(500).await.unwrap_err();

        assert!(matches!(err, BounceError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_acknowledge_deletes_single_entry() {
        let server = MockServer::start();
        let delete_mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/suppression/bounces/a@x.com")
                .header("authorization", "Bearer key");
            then.status(204);
        });

        let source = connector_for(&server).connect("key").unwrap();
        source.acknowledge("a@x.com").await.unwrap();

        delete_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_acknowledge_failure_carries_address() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/suppression/bounces/a@x.com");
            then.status(500);
        });

        let source = connector_for(&server).connect("key").unwrap();
        match source.acknowledge("a@x.com").await {
            Err(BounceError::AcknowledgeFailed { address, .. }) => assert_eq!(address, "a@x.com"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_connect_rejects_unparseable_base_url() {
        let connector = HttpConnector::new(ProviderSettings {
            base_url: "not a url".to_string(),
            ..ProviderSettings::default()
        });
        assert!(matches!(
            connector.connect("key"),
            Err(BounceError::UrlError(_))
        ));
    }
}
