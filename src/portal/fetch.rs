//! Per-event report retrieval

use super::PortalClient;
use crate::error::FetchError;
use crate::record::EventRecord;
use crate::types::{Credential, EventId};
use async_trait::async_trait;
use reqwest::StatusCode;

/// Retrieves one Event Detail Report
///
/// An unauthorized answer is final for that event; implementations never
/// re-authenticate on their own.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch and decode the record for `event_id`
    async fn fetch(
        &self,
        event_id: &EventId,
        credential: &Credential,
    ) -> Result<EventRecord, FetchError>;
}

/// Fetches reports from the Event Management API
#[derive(Clone, Debug)]
pub struct HttpReportFetcher {
    client: PortalClient,
}

impl HttpReportFetcher {
    /// Create a fetcher sharing `client`'s connection pool and cookies
    pub fn new(client: PortalClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch(
        &self,
        event_id: &EventId,
        credential: &Credential,
    ) -> Result<EventRecord, FetchError> {
        if credential.is_expired() {
            return Err(FetchError::CredentialExpired {
                event_id: event_id.clone(),
            });
        }

        tracing::debug!(event_id = %event_id, "requesting event detail report");
        let response = self
            .client
            .http()
            .get(self.client.endpoints().edr_report.clone())
            .query(&[("id", event_id.as_str())])
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(|source| FetchError::Network {
                event_id: event_id.clone(),
                source,
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Unauthorized {
                    event_id: event_id.clone(),
                    status: status.as_u16(),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound {
                    event_id: event_id.clone(),
                });
            }
            s if !s.is_success() => {
                return Err(FetchError::UnexpectedStatus {
                    event_id: event_id.clone(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Network {
                event_id: event_id.clone(),
                source,
            })?;

        if body.trim().is_empty() {
            return Err(FetchError::NotFound {
                event_id: event_id.clone(),
            });
        }

        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| FetchError::InvalidPayload {
                event_id: event_id.clone(),
                reason: format!("response is not JSON: {e}"),
            })?;

        let record = EventRecord::from_payload(event_id, payload)?;
        tracing::info!(event_id = %event_id, name = %record.name, "event detail report retrieved");
        Ok(record)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::error::ErrorCode;
    use crate::types::CredentialSource;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> HttpReportFetcher {
        fetcher_at(server.uri())
    }

    fn fetcher_at(base_url: String) -> HttpReportFetcher {
        let config = PortalConfig {
            login_base_url: base_url.clone(),
            portal_base_url: base_url,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        HttpReportFetcher::new(PortalClient::new(&config).unwrap())
    }

    fn credential() -> Credential {
        Credential::new(
            "tok-1",
            CredentialSource::Injected,
            Duration::from_secs(3600),
        )
    }

    async fn respond(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/EventManagement/api/edrReport"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_sends_bearer_token_and_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/EventManagement/api/edrReport"))
            .and(query_param("id", "606034"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "demoId": "606034",
                "demoName": "Kellogg's Demo",
                "demoClassCode": 45,
                "demoStatusCode": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = fetcher(&server)
            .fetch(&EventId::from("606034"), &credential())
            .await
            .unwrap();
        assert_eq!(record.name, "Kellogg's Demo");
        assert_eq!(record.type_code, Some(45));
    }

    #[tokio::test]
    async fn status_codes_map_to_fetch_errors() {
        let cases: [(u16, &str); 4] = [
            (401, "unauthorized"),
            (403, "unauthorized"),
            (404, "not_found"),
            (500, "unexpected_status"),
        ];
        for (status, expected) in cases {
            let server = MockServer::start().await;
            respond(&server, ResponseTemplate::new(status)).await;

            let err = fetcher(&server)
                .fetch(&EventId::from("1"), &credential())
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), expected, "HTTP {status}");
        }
    }

    #[tokio::test]
    async fn empty_or_null_body_is_not_found() {
        for body in ["", "null", "{}"] {
            let server = MockServer::start().await;
            respond(&server, ResponseTemplate::new(200).set_body_string(body)).await;

            let err = fetcher(&server)
                .fetch(&EventId::from("1"), &credential())
                .await
                .unwrap_err();
            assert!(matches!(err, FetchError::NotFound { .. }), "body {body:?}");
        }
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_payload() {
        let server = MockServer::start().await;
        respond(
            &server,
            ResponseTemplate::new(200).set_body_string("<html>login</html>"),
        )
        .await;

        let err = fetcher(&server)
            .fetch(&EventId::from("1"), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn expired_credential_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let stale = Credential::issued_at(
            "old",
            CredentialSource::Injected,
            Utc::now() - ChronoDuration::hours(2),
            Duration::from_secs(60),
        );
        let err = fetcher(&server)
            .fetch(&EventId::from("1"), &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CredentialExpired { .. }));
    }

    #[tokio::test]
    async fn unreachable_portal_is_network_error() {
        // Reserve a port, then release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let fetcher = fetcher_at(format!("http://127.0.0.1:{port}"));

        let err = fetcher
            .fetch(&EventId::from("1"), &credential())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "network");
    }
}
