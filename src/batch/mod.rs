//! Batch orchestration
//!
//! [`BatchOrchestrator::run`] authenticates at most once, then fetches every event,
//! renders (one document per event, or one consolidated document) and delivers.
//! A failure for one event is recorded in the [`BatchResult`] and never stops the
//! others; only an authentication failure aborts the run.

use crate::config::Config;
use crate::credential::CredentialStore;
use crate::delivery::{DeliveryOptions, Dispatcher};
use crate::error::{AuthError, ErrorCode};
use crate::portal::{
    HttpReportFetcher, MfaCodeProvider, Negotiator, PortalClient, ReportFetcher, SessionNegotiator,
};
use crate::record::EventRecord;
use crate::render::DocumentRenderer;
use crate::types::{
    BatchEvent, BatchResult, Credential, DeliveryResult, EventId, EventOutcome, Outcome,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Capacity of the progress event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-run switches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Negotiate a credential if none is held
    pub authenticate: bool,
    /// Merge all fetched records into one document
    pub consolidate: bool,
    /// Print instead of only saving
    pub print_requested: bool,
    /// Keep a permanent copy of printed documents; with `consolidate`, also save
    /// each event's own document
    pub save_copy: bool,
    /// Open the delivered document in the viewer
    pub open_after: bool,
}

/// Drives fetch, render and delivery across a list of events
pub struct BatchOrchestrator {
    store: CredentialStore,
    negotiator: Box<dyn Negotiator>,
    fetcher: Arc<dyn ReportFetcher>,
    renderer: DocumentRenderer,
    dispatcher: Dispatcher,
    token_lifetime: Duration,
    negotiated: bool,
    event_tx: broadcast::Sender<BatchEvent>,
}

impl BatchOrchestrator {
    /// Assemble an orchestrator from its collaborators
    pub fn new(
        negotiator: Box<dyn Negotiator>,
        fetcher: Arc<dyn ReportFetcher>,
        renderer: DocumentRenderer,
        dispatcher: Dispatcher,
        token_lifetime: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: CredentialStore::new(),
            negotiator,
            fetcher,
            renderer,
            dispatcher,
            token_lifetime,
            negotiated: false,
            event_tx,
        }
    }

    /// Wire the real portal, renderer and dispatcher from configuration
    pub fn from_config(
        config: &Config,
        client: PortalClient,
        codes: Box<dyn MfaCodeProvider>,
    ) -> Self {
        let negotiator = SessionNegotiator::new(client.clone(), &config.portal, codes);
        Self::new(
            Box::new(negotiator),
            Arc::new(HttpReportFetcher::new(client)),
            DocumentRenderer::from_config(&config.render),
            Dispatcher::from_config(config),
            config.portal.token_lifetime,
        )
    }

    /// Use a pre-obtained bearer token and skip negotiation
    pub fn inject_token(&mut self, token: impl Into<String>) -> &Credential {
        self.store.inject(token, self.token_lifetime)
    }

    /// Use a pre-built credential and skip negotiation
    pub fn inject_credential(&mut self, credential: Credential) {
        self.store.store(credential);
    }

    /// The credential currently held
    pub fn credential(&self) -> Option<&Credential> {
        self.store.current()
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: BatchEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Process `event_ids`
    ///
    /// Duplicate ids are processed once, at their first position. Returns an error
    /// only when no usable credential could be obtained.
    pub async fn run(
        &mut self,
        event_ids: &[EventId],
        options: RunOptions,
    ) -> std::result::Result<BatchResult, AuthError> {
        let mut seen = HashSet::new();
        let ids: Vec<EventId> = event_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        tracing::info!(
            events = ids.len(),
            consolidate = options.consolidate,
            print = options.print_requested,
            "batch started"
        );
        self.emit(BatchEvent::Started { total: ids.len() });

        let credential = self.ensure_credential(options.authenticate).await?;

        let mut outcomes: HashMap<EventId, Outcome> = HashMap::new();
        let mut fetched: Vec<(EventId, EventRecord)> = Vec::new();

        for (index, id) in ids.iter().enumerate() {
            self.emit(BatchEvent::FetchStarted {
                event_id: id.clone(),
                index: index + 1,
                total: ids.len(),
            });

            match self.fetcher.fetch(id, &credential).await {
                Ok(record) => {
                    self.emit(BatchEvent::Fetched {
                        event_id: id.clone(),
                    });
                    fetched.push((id.clone(), record));
                }
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "fetch failed");
                    self.emit(BatchEvent::FetchFailed {
                        event_id: id.clone(),
                        error: e.to_string(),
                    });
                    outcomes.insert(
                        id.clone(),
                        Outcome::FetchFailed {
                            code: e.error_code().to_string(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        if options.consolidate && fetched.len() > 1 {
            let (group, records): (Vec<EventId>, Vec<EventRecord>) = fetched.into_iter().unzip();
            let outcome = self.render_and_deliver(&group, &records, true, options).await;
            if options.save_copy {
                self.save_single_copies(&group, &records).await;
            }
            for id in group {
                outcomes.insert(id, outcome.clone());
            }
        } else {
            for (id, record) in fetched {
                let outcome = self
                    .render_and_deliver(
                        std::slice::from_ref(&id),
                        std::slice::from_ref(&record),
                        false,
                        options,
                    )
                    .await;
                outcomes.insert(id, outcome);
            }
        }

        let per_event: Vec<EventOutcome> = ids
            .into_iter()
            .filter_map(|id| {
                let outcome = outcomes.remove(&id)?;
                Some(EventOutcome {
                    event_id: id,
                    outcome,
                })
            })
            .collect();

        let result = BatchResult::from_outcomes(per_event);
        tracing::info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            overall_success = result.overall_success,
            "batch finished"
        );
        self.emit(BatchEvent::Finished {
            overall_success: result.overall_success,
        });
        Ok(result)
    }

    /// A valid credential, negotiating at most once per orchestrator
    ///
    /// Without `authenticate` only a held, unexpired credential is accepted.
    pub async fn ensure_credential(
        &mut self,
        authenticate: bool,
    ) -> std::result::Result<Credential, AuthError> {
        if let Some(credential) = self.store.valid() {
            self.emit(BatchEvent::Authenticated {
                source: credential.source,
            });
            return Ok(credential.clone());
        }

        if !authenticate {
            return self.store.require_valid().cloned();
        }

        if self.negotiated {
            tracing::error!("credential expired and negotiation already ran in this process");
            return Err(AuthError::CredentialExpired);
        }

        self.emit(BatchEvent::AuthenticationStarted);
        self.negotiated = true;
        let credential = self.negotiator.negotiate().await?;
        self.store.store(credential.clone());
        self.emit(BatchEvent::Authenticated {
            source: credential.source,
        });
        Ok(credential)
    }

    /// Render `records` into one document and deliver it; the outcome applies to every id in `group`
    async fn render_and_deliver(
        &self,
        group: &[EventId],
        records: &[EventRecord],
        consolidate: bool,
        options: RunOptions,
    ) -> Outcome {
        let document = match self.renderer.render(records, consolidate) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(events = ?group, error = %e, "render failed");
                self.emit(BatchEvent::RenderFailed {
                    event_ids: group.to_vec(),
                    error: e.to_string(),
                });
                return Outcome::RenderFailed {
                    code: e.error_code().to_string(),
                    reason: e.to_string(),
                };
            }
        };
        self.emit(BatchEvent::Rendered {
            event_ids: group.to_vec(),
            backend: document.backend.to_string(),
        });

        let delivery = DeliveryOptions {
            print_requested: options.print_requested,
            save_copy: options.save_copy,
        };
        match self.dispatcher.deliver(&document, delivery).await {
            Ok(result) => {
                self.emit(BatchEvent::Delivered {
                    event_ids: group.to_vec(),
                    result: result.clone(),
                });
                if options.open_after {
                    self.open_delivered(&result).await;
                }
                match result {
                    DeliveryResult::Failed {
                        retained_path,
                        attempts,
                    } => Outcome::DeliveryFailed {
                        retained_path: Some(retained_path),
                        reason: format!("all print mechanisms failed: {}", attempts.join("; ")),
                    },
                    delivered => Outcome::FetchedAndDelivered {
                        delivery: delivered,
                    },
                }
            }
            Err(e) => {
                tracing::error!(events = ?group, error = %e, "delivery failed");
                Outcome::DeliveryFailed {
                    retained_path: None,
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl BatchOrchestrator {
    /// Save each record of a consolidated batch as its own document
    ///
    /// Failures are logged; they never change the batch outcome.
    async fn save_single_copies(&self, group: &[EventId], records: &[EventRecord]) {
        for (id, record) in group.iter().zip(records) {
            let document = match self.renderer.render(std::slice::from_ref(record), false) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "single copy not rendered");
                    continue;
                }
            };
            match self.dispatcher.save(&document).await {
                Ok(path) => self.emit(BatchEvent::CopySaved {
                    event_id: id.clone(),
                    path,
                }),
                Err(e) => tracing::warn!(event_id = %id, error = %e, "single copy not saved"),
            }
        }
    }

    /// Open whatever file a delivery left on disk
    async fn open_delivered(&self, result: &DeliveryResult) {
        let path: &Path = match result {
            DeliveryResult::Saved { path } => path.as_path(),
            DeliveryResult::Printed {
                copy: Some(path), ..
            } => path.as_path(),
            DeliveryResult::Failed { retained_path, .. } => retained_path.as_path(),
            DeliveryResult::Printed { copy: None, .. } => return,
        };
        match self.dispatcher.open(path).await {
            Ok(()) => self.emit(BatchEvent::Opened {
                path: path.to_path_buf(),
            }),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not open document"),
        }
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("credential", &self.store.current())
            .field("renderer", &self.renderer)
            .field("dispatcher", &self.dispatcher)
            .field("negotiated", &self.negotiated)
            .finish_non_exhaustive()
    }
}
