//! Assertions over batch results

use edr_printer::{BatchEvent, BatchResult, DeliveryResult, Outcome};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Path of the saved document for `event_id`, panicking on any other outcome
pub fn saved_path(result: &BatchResult, event_id: &str) -> PathBuf {
    match result.outcome(event_id) {
        Some(Outcome::FetchedAndDelivered {
            delivery: DeliveryResult::Saved { path },
        }) => path.clone(),
        other => panic!("expected {event_id} to be saved, got {other:?}"),
    }
}

/// Outcome label for `event_id`
pub fn outcome_label(result: &BatchResult, event_id: &str) -> &'static str {
    result
        .outcome(event_id)
        .unwrap_or_else(|| panic!("no outcome for {event_id}"))
        .label()
}

/// Every event already published on `rx`
pub fn drain(rx: &mut broadcast::Receiver<BatchEvent>) -> Vec<BatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
