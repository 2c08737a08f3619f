//! Event listing for a store and date range

use super::PortalClient;
use crate::error::{FetchError, Result};
use crate::labels;
use crate::types::{Credential, EventId};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use serde_json::{Value, json};

/// Highest event type requested when the caller does not narrow the listing
const MAX_DEFAULT_EVENT_TYPE: u32 = 45;

/// Type 2 is never part of the portal's default listing filter
const EXCLUDED_DEFAULT_EVENT_TYPE: u32 = 2;

fn default_event_types() -> Vec<u32> {
    (1..=MAX_DEFAULT_EVENT_TYPE)
        .filter(|t| *t != EXCLUDED_DEFAULT_EVENT_TYPE)
        .collect()
}

/// Filter for an event listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseQuery {
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Store to list events for
    pub store_number: String,
    /// Event type codes to include
    pub event_types: Vec<u32>,
}

impl BrowseQuery {
    /// From the first of the month containing `today` through `today`, the default event types
    pub fn month_to_date(today: NaiveDate, store_number: impl Into<String>) -> Self {
        let start_date = today.with_day(1).unwrap_or(today);
        Self {
            start_date,
            end_date: today,
            store_number: store_number.into(),
            event_types: default_event_types(),
        }
    }

    /// [`BrowseQuery::month_to_date`] for the local current date
    pub fn current_month(store_number: impl Into<String>) -> Self {
        Self::month_to_date(Local::now().date_naive(), store_number)
    }

    fn payload(&self) -> Value {
        json!({
            "itemNbr": null,
            "vendorNbr": null,
            "startDate": self.start_date.format("%Y-%m-%d").to_string(),
            "endDate": self.end_date.format("%Y-%m-%d").to_string(),
            "billType": null,
            "eventType": self.event_types,
            "userId": null,
            "primItem": null,
            "storeNbr": self.store_number,
            "deptNbr": null
        })
    }
}

/// One row of an event listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Event identifier
    pub event_id: EventId,
    /// Event name, if listed
    pub name: Option<String>,
    /// Scheduled date as sent by the portal
    pub date: Option<String>,
    /// Translated event type
    pub type_label: String,
    /// Translated status
    pub status_label: String,
}

impl EventSummary {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let text = |key: &str| match map.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        let code = |key: &str| text(key).and_then(|t| t.parse::<u32>().ok());

        Some(Self {
            event_id: EventId::from(text("demoId").or_else(|| text("eventId"))?),
            name: text("demoName").or_else(|| text("eventName")),
            date: text("demoDate").or_else(|| text("eventDate")),
            type_label: labels::event_type_label(
                code("demoClassCode"),
                text("demoClassCode").as_deref(),
            ),
            status_label: labels::event_status_label(
                code("demoStatusCode"),
                text("demoStatusCode").as_deref(),
            ),
        })
    }
}

/// Rows from a listing response: a bare array, or the first array inside an object
fn summaries(body: &Value) -> Vec<EventSummary> {
    let rows = match body {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => map
            .values()
            .find_map(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    rows.iter().filter_map(EventSummary::from_value).collect()
}

impl PortalClient {
    /// List events matching `query`
    pub async fn browse_events(
        &self,
        credential: &Credential,
        query: &BrowseQuery,
    ) -> Result<Vec<EventSummary>> {
        tracing::info!(
            start = %query.start_date,
            end = %query.end_date,
            store = %query.store_number,
            "browsing events"
        );

        let response = self
            .http()
            .post(self.endpoints().browse_data.clone())
            .bearer_auth(credential.token())
            .json(&query.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BrowseRejected {
                status: status.as_u16(),
            }
            .into());
        }

        let body: Value = response.json().await?;
        let events = summaries(&body);
        tracing::info!(count = events.len(), "event listing retrieved");
        Ok(events)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::error::{Error, ErrorCode};
    use crate::types::CredentialSource;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PortalClient {
        PortalClient::new(&PortalConfig {
            login_base_url: server.uri(),
            portal_base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn credential() -> Credential {
        Credential::new("tok", CredentialSource::Injected, Duration::from_secs(60))
    }

    #[test]
    fn month_to_date_spans_first_of_month_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 7, 22).unwrap();
        let query = BrowseQuery::month_to_date(today, "8135");
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(query.end_date, today);
        assert_eq!(query.event_types.len(), 44);
        assert_eq!(query.event_types.first(), Some(&1));
        assert!(!query.event_types.contains(&2));
        assert_eq!(query.event_types.last(), Some(&45));
    }

    #[test]
    fn payload_has_null_filters() {
        let today = NaiveDate::from_ymd_opt(2025, 7, 22).unwrap();
        let payload = BrowseQuery::month_to_date(today, "8135").payload();
        assert_eq!(payload["startDate"], "2025-07-01");
        assert_eq!(payload["endDate"], "2025-07-22");
        assert_eq!(payload["storeNbr"], "8135");
        assert!(payload["itemNbr"].is_null());
        assert!(payload["deptNbr"].is_null());
    }

    #[test]
    fn summaries_accept_array_or_wrapped_array() {
        let row = json!({"demoId": 606034, "demoName": "Kellogg's Demo", "demoClassCode": 45, "demoStatusCode": "ACTV"});
        let bare = summaries(&json!([row.clone(), {"noId": true}]));
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].event_id, "606034");
        assert_eq!(bare[0].type_label, "Food Demo/Sampling");
        assert_eq!(bare[0].status_label, "Active");

        let wrapped = summaries(&json!({"count": 1, "events": [row]}));
        assert_eq!(wrapped.len(), 1);

        assert!(summaries(&json!("nothing")).is_empty());
    }

    #[tokio::test]
    async fn browse_posts_query_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/EventManagement/api/browse-event/browse-data"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({"storeNbr": "8135"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"demoId": "1", "demoName": "One"},
                {"demoId": "2", "demoName": "Two"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query =
            BrowseQuery::month_to_date(NaiveDate::from_ymd_opt(2025, 7, 22).unwrap(), "8135");
        let events = client(&server)
            .browse_events(&credential(), &query)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].name.as_deref(), Some("Two"));
    }

    #[tokio::test]
    async fn browse_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let query = BrowseQuery::current_month("8135");
        let err = client(&server)
            .browse_events(&credential(), &query)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::BrowseRejected { status: 403 })));
        assert_eq!(err.error_code(), "browse_rejected");
    }
}
