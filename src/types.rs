//! Core types for edr-printer

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for credential lifetimes that do not fit a signed duration
const MAX_LIFETIME_DAYS: i64 = 365 * 100;

/// Identifier of one scheduled event on the portal
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Create a new EventId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<&str> for EventId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EventId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

/// Where a credential came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Obtained through the login and one-time code handshake
    Negotiated,
    /// Supplied by the caller, negotiation skipped
    Injected,
}

/// Bearer credential presented on every authenticated portal request
///
/// The token is never printed: `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    /// When the credential was obtained or injected
    pub obtained_at: DateTime<Utc>,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
    /// How the credential was obtained
    pub source: CredentialSource,
}

impl Credential {
    /// Create a credential valid for `lifetime` starting now
    pub fn new(token: impl Into<String>, source: CredentialSource, lifetime: Duration) -> Self {
        let obtained_at = Utc::now();
        Self::issued_at(token, source, obtained_at, lifetime)
    }

    /// Create a credential with an explicit issue time
    pub fn issued_at(
        token: impl Into<String>,
        source: CredentialSource,
        obtained_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let lifetime = ChronoDuration::from_std(lifetime)
            .unwrap_or_else(|_| ChronoDuration::days(MAX_LIFETIME_DAYS));
        let expires_at = obtained_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token: token.into(),
            obtained_at,
            expires_at,
            source,
        }
    }

    /// The raw bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the credential is past its validity window at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the credential is past its validity window right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .field("source", &self.source)
            .finish()
    }
}

/// Layout of a rendered document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// One event, no cover section
    Single,
    /// Cover section followed by one section per event
    Consolidated,
}

/// A rendered document ready for delivery
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    /// Encoded document content
    pub content: Vec<u8>,
    /// Layout the content was rendered with
    pub format: DocumentFormat,
    /// Events that contributed to this document, in input order
    pub source_event_ids: Vec<EventId>,
    /// File extension of the content ("html", "txt")
    pub extension: &'static str,
    /// Name of the backend that produced the content
    pub backend: &'static str,
    /// When the document was rendered
    pub generated_at: DateTime<chrono::Local>,
}

impl RenderedDocument {
    /// File name used when the document is written to disk
    pub fn file_name(&self) -> String {
        let stamp = self.generated_at.format("%Y%m%d_%H%M%S");
        match (self.format, self.source_event_ids.as_slice()) {
            (DocumentFormat::Single, [id]) => format!(
                "edr_report_{}_{}.{}",
                crate::utils::sanitize_file_component(id.as_str()),
                stamp,
                self.extension
            ),
            _ => format!("consolidated_edr_reports_{}.{}", stamp, self.extension),
        }
    }
}

/// Final state of one delivery attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryResult {
    /// A print mechanism accepted the document
    Printed {
        /// Name of the mechanism that succeeded
        mechanism: String,
        /// Permanent copy written alongside printing, if requested
        copy: Option<PathBuf>,
    },
    /// The document was written to the output directory
    Saved {
        /// Where the document was written
        path: PathBuf,
    },
    /// Every print mechanism failed; the document was kept on disk
    Failed {
        /// Where the document was kept
        retained_path: PathBuf,
        /// Each mechanism that was tried with its failure
        attempts: Vec<String>,
    },
}

impl DeliveryResult {
    /// Whether the delivery reached its goal (printed or saved as requested)
    pub fn is_success(&self) -> bool {
        !matches!(self, DeliveryResult::Failed { .. })
    }
}

/// Outcome of one event in a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Record fetched, rendered and delivered
    FetchedAndDelivered {
        /// How the document was delivered
        delivery: DeliveryResult,
    },
    /// Record could not be fetched
    FetchFailed {
        /// Machine-readable error code
        code: String,
        /// Human-readable reason
        reason: String,
    },
    /// Document could not be rendered
    RenderFailed {
        /// Machine-readable error code
        code: String,
        /// Human-readable reason
        reason: String,
    },
    /// Document could not be delivered
    DeliveryFailed {
        /// Where the document was kept, when it could be written at all
        retained_path: Option<PathBuf>,
        /// Human-readable reason
        reason: String,
    },
}

impl Outcome {
    /// Whether this is the fully successful outcome
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::FetchedAndDelivered { .. })
    }

    /// Short label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::FetchedAndDelivered { .. } => "fetched_and_delivered",
            Outcome::FetchFailed { .. } => "fetch_failed",
            Outcome::RenderFailed { .. } => "render_failed",
            Outcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

/// Outcome of one event, keyed by its identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// The event
    pub event_id: EventId,
    /// What happened to it
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of a whole batch run, in input order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// One entry per distinct input event id
    pub per_event: Vec<EventOutcome>,
    /// True iff every event was fetched and delivered
    pub overall_success: bool,
}

impl BatchResult {
    /// Build the result from per-event outcomes
    pub fn from_outcomes(per_event: Vec<EventOutcome>) -> Self {
        let overall_success = per_event.iter().all(|e| e.outcome.is_success());
        Self {
            per_event,
            overall_success,
        }
    }

    /// Look up the outcome for an event
    pub fn outcome(&self, event_id: &str) -> Option<&Outcome> {
        self.per_event
            .iter()
            .find(|e| e.event_id == event_id)
            .map(|e| &e.outcome)
    }

    /// Number of events that were fully successful
    pub fn succeeded(&self) -> usize {
        self.per_event
            .iter()
            .filter(|e| e.outcome.is_success())
            .count()
    }

    /// Number of events that failed at any stage
    pub fn failed(&self) -> usize {
        self.per_event.len() - self.succeeded()
    }

    /// Human-readable summary listing failures with reasons and successes with delivery detail
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Total events: {}\nSucceeded: {}\nFailed: {}\n",
            self.per_event.len(),
            self.succeeded(),
            self.failed()
        ));

        if self.failed() > 0 {
            out.push_str("\nFailed events:\n");
            for entry in self.per_event.iter().filter(|e| !e.outcome.is_success()) {
                let reason = match &entry.outcome {
                    Outcome::FetchFailed { reason, .. } | Outcome::RenderFailed { reason, .. } => {
                        reason.clone()
                    }
                    Outcome::DeliveryFailed {
                        retained_path: Some(path),
                        reason,
                    } => format!("{reason} (kept at {})", path.display()),
                    Outcome::DeliveryFailed {
                        retained_path: None,
                        reason,
                    } => reason.clone(),
                    Outcome::FetchedAndDelivered { .. } => continue,
                };
                out.push_str(&format!(
                    "  - {}: {} ({})\n",
                    entry.event_id,
                    entry.outcome.label(),
                    reason
                ));
            }
        }

        if self.succeeded() > 0 {
            out.push_str("\nSucceeded events:\n");
            for entry in &self.per_event {
                if let Outcome::FetchedAndDelivered { delivery } = &entry.outcome {
                    let detail = match delivery {
                        DeliveryResult::Printed {
                            mechanism,
                            copy: Some(copy),
                        } => format!("printed via {mechanism}, saved {}", copy.display()),
                        DeliveryResult::Printed {
                            mechanism,
                            copy: None,
                        } => format!("printed via {mechanism}"),
                        DeliveryResult::Saved { path } => format!("saved {}", path.display()),
                        DeliveryResult::Failed { retained_path, .. } => {
                            format!("kept at {}", retained_path.display())
                        }
                    };
                    out.push_str(&format!("  - {}: {}\n", entry.event_id, detail));
                }
            }
        }

        out.push_str(&format!(
            "\nOverall status: {}\n",
            if self.overall_success {
                "SUCCESS"
            } else {
                "PARTIAL FAILURE"
            }
        ));
        out
    }
}

/// Progress notifications published by the batch orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A batch has started
    Started {
        /// Number of distinct events in the batch
        total: usize,
    },
    /// Interactive authentication is about to begin
    AuthenticationStarted,
    /// A credential is in place
    Authenticated {
        /// How it was obtained
        source: CredentialSource,
    },
    /// A record fetch is starting
    FetchStarted {
        /// The event
        event_id: EventId,
        /// One-based position in the batch
        index: usize,
        /// Number of events in the batch
        total: usize,
    },
    /// A record was fetched
    Fetched {
        /// The event
        event_id: EventId,
    },
    /// A record could not be fetched
    FetchFailed {
        /// The event
        event_id: EventId,
        /// Reason
        error: String,
    },
    /// A document was rendered
    Rendered {
        /// Contributing events
        event_ids: Vec<EventId>,
        /// Backend that produced it
        backend: String,
    },
    /// A document could not be rendered
    RenderFailed {
        /// Contributing events
        event_ids: Vec<EventId>,
        /// Reason
        error: String,
    },
    /// A document reached its delivery outcome
    Delivered {
        /// Contributing events
        event_ids: Vec<EventId>,
        /// Delivery outcome
        result: DeliveryResult,
    },
    /// A single-event copy of a consolidated document was saved
    CopySaved {
        /// The event
        event_id: EventId,
        /// Where the copy was written
        path: PathBuf,
    },
    /// A delivered document was opened in the viewer
    Opened {
        /// The document
        path: PathBuf,
    },
    /// The batch has finished
    Finished {
        /// Whether every event succeeded
        overall_success: bool,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn credential_debug_redacts_token() {
        let cred = Credential::new(
            "super-secret-token",
            CredentialSource::Injected,
            Duration::from_secs(60),
        );
        let debug = format!("{cred:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn credential_expires_at_end_of_window() {
        let issued = Utc.with_ymd_and_hms(2025, 7, 22, 8, 0, 0).unwrap();
        let cred = Credential::issued_at(
            "t",
            CredentialSource::Negotiated,
            issued,
            Duration::from_secs(3600),
        );

        assert!(!cred.is_expired_at(issued));
        assert!(!cred.is_expired_at(issued + ChronoDuration::minutes(59)));
        assert!(cred.is_expired_at(issued + ChronoDuration::minutes(60)));
    }

    #[test]
    fn huge_lifetime_saturates_instead_of_overflowing() {
        let cred = Credential::new("t", CredentialSource::Injected, Duration::MAX);
        assert!(!cred.is_expired());
    }

    #[test]
    fn single_document_file_name_includes_event_id() {
        let doc = RenderedDocument {
            content: vec![],
            format: DocumentFormat::Single,
            source_event_ids: vec![EventId::from("606034")],
            extension: "html",
            backend: "html",
            generated_at: chrono::Local.with_ymd_and_hms(2025, 7, 22, 9, 30, 5).unwrap(),
        };
        assert_eq!(doc.file_name(), "edr_report_606034_20250722_093005.html");
    }

    #[test]
    fn consolidated_document_file_name() {
        let doc = RenderedDocument {
            content: vec![],
            format: DocumentFormat::Consolidated,
            source_event_ids: vec![EventId::from("1"), EventId::from("2")],
            extension: "txt",
            backend: "text",
            generated_at: chrono::Local.with_ymd_and_hms(2025, 7, 22, 9, 30, 5).unwrap(),
        };
        assert_eq!(doc.file_name(), "consolidated_edr_reports_20250722_093005.txt");
    }

    #[test]
    fn overall_success_requires_every_event_delivered() {
        let ok = EventOutcome {
            event_id: EventId::from("1"),
            outcome: Outcome::FetchedAndDelivered {
                delivery: DeliveryResult::Saved {
                    path: PathBuf::from("/tmp/1.html"),
                },
            },
        };
        let failed = EventOutcome {
            event_id: EventId::from("2"),
            outcome: Outcome::FetchFailed {
                code: "not_found".into(),
                reason: "event 2 not found".into(),
            },
        };

        assert!(BatchResult::from_outcomes(vec![ok.clone()]).overall_success);

        let result = BatchResult::from_outcomes(vec![ok, failed]);
        assert!(!result.overall_success);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.outcome("2").unwrap().label(), "fetch_failed");
    }

    #[test]
    fn summary_lists_failures_with_reasons() {
        let result = BatchResult::from_outcomes(vec![
            EventOutcome {
                event_id: EventId::from("606034"),
                outcome: Outcome::FetchedAndDelivered {
                    delivery: DeliveryResult::Printed {
                        mechanism: "lp".into(),
                        copy: None,
                    },
                },
            },
            EventOutcome {
                event_id: EventId::from("999"),
                outcome: Outcome::FetchFailed {
                    code: "not_found".into(),
                    reason: "event 999 not found".into(),
                },
            },
        ]);

        let summary = result.summary();
        assert!(summary.contains("Total events: 2"));
        assert!(summary.contains("999: fetch_failed (event 999 not found)"));
        assert!(summary.contains("606034: printed via lp"));
        assert!(summary.contains("PARTIAL FAILURE"));
    }

    #[test]
    fn outcome_serializes_with_snake_case_tag() {
        let entry = EventOutcome {
            event_id: EventId::from("7"),
            outcome: Outcome::RenderFailed {
                code: "all_backends_failed".into(),
                reason: "boom".into(),
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event_id"], "7");
        assert_eq!(json["outcome"], "render_failed");
        assert_eq!(json["code"], "all_backends_failed");
    }
}
