//! Document rendering
//!
//! [`DocumentRenderer`] holds an ordered list of [`RenderBackend`]s and returns the
//! output of the first one that succeeds. Every backend lays a document out the same way:
//!
//! - consolidated documents open with a cover section listing each event (id, name,
//!   type, status) in input order
//! - each event gets a section with its fields, item table and instructions
//! - each section ends with the signature block

mod html;
mod text;

pub use html::HtmlBackend;
pub use text::TextBackend;

use crate::config::{RenderBackendKind, RenderConfig};
use crate::error::RenderError;
use crate::record::EventRecord;
use crate::types::{DocumentFormat, RenderedDocument};
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Title of every event section
pub const REPORT_TITLE: &str = "EVENT DETAIL REPORT";

/// Title of the cover section of a consolidated document
pub const COVER_TITLE: &str = "CONSOLIDATED EVENT DETAILS REPORT";

/// Standing instructions printed under the section title
pub const STANDING_NOTICE: &[&str] = &[
    "IMPORTANT!!! This report should be printed each morning prior to completing each event.",
    "1. The Event Details Report should be kept in the event prep area for each demonstrator to review instructions and item status.",
    "2. The Event Co-ordinator should use this sheet when visiting the event area. Comments should be written to enter into the system at a later time.",
    "3. Remember to scan items for product charge using the Club Use function on the handheld device.",
    "Retention: keep the most recent reports in a monthly folder in the event prep area for 6 months, box older reports, and discard any report over 18 months old.",
];

/// Heading of the signature block
pub const SIGNATURE_HEADING: &str = "MUST BE SIGNED AND DATED";

/// Lines of the signature block
pub const SIGNATURE_FIELDS: &[&str] = &[
    "Event Specialist Printed Name:",
    "Event Specialist Signature:",
    "Date Performed:",
    "Supervisor Signature:",
];

/// Column headings of the item table
pub const ITEM_COLUMNS: &[&str] = &[
    "Item Number",
    "Primary Item Number",
    "Description",
    "Vendor",
    "Category",
];

const COVER_NAME_LIMIT: usize = 30;

/// Produces document bytes from records
pub trait RenderBackend: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// File extension of the produced content
    fn extension(&self) -> &'static str;

    /// Render `records` in `format`
    fn render(
        &self,
        records: &[EventRecord],
        format: DocumentFormat,
        generated_at: DateTime<Local>,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renders documents with backend fallback
#[derive(Clone)]
pub struct DocumentRenderer {
    backends: Vec<Arc<dyn RenderBackend>>,
}

impl DocumentRenderer {
    /// Use `backends` in the given order
    pub fn new(backends: Vec<Arc<dyn RenderBackend>>) -> Self {
        Self { backends }
    }

    /// Build the backend chain named in configuration
    pub fn from_config(config: &RenderConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|kind| -> Arc<dyn RenderBackend> {
                match kind {
                    RenderBackendKind::Html => Arc::new(HtmlBackend),
                    RenderBackendKind::Text => Arc::new(TextBackend),
                }
            })
            .collect();
        Self::new(backends)
    }

    /// Render now
    pub fn render(
        &self,
        records: &[EventRecord],
        consolidate: bool,
    ) -> Result<RenderedDocument, RenderError> {
        self.render_at(records, consolidate, Local::now())
    }

    /// Render with an explicit run timestamp
    ///
    /// The document is consolidated only when `consolidate` is set and there is
    /// more than one record.
    pub fn render_at(
        &self,
        records: &[EventRecord],
        consolidate: bool,
        generated_at: DateTime<Local>,
    ) -> Result<RenderedDocument, RenderError> {
        if records.is_empty() {
            return Err(RenderError::NoRecords);
        }

        let format = if consolidate && records.len() > 1 {
            DocumentFormat::Consolidated
        } else {
            DocumentFormat::Single
        };

        let mut attempts = Vec::new();
        for backend in &self.backends {
            match backend.render(records, format, generated_at) {
                Ok(content) => {
                    tracing::debug!(
                        backend = backend.name(),
                        records = records.len(),
                        bytes = content.len(),
                        "document rendered"
                    );
                    return Ok(RenderedDocument {
                        content,
                        format,
                        source_event_ids: records.iter().map(|r| r.event_id.clone()).collect(),
                        extension: backend.extension(),
                        backend: backend.name(),
                        generated_at,
                    });
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), error = %e, "render backend failed, trying next");
                    attempts.push((backend.name().to_string(), e.to_string()));
                }
            }
        }

        Err(RenderError::AllBackendsFailed { attempts })
    }
}

impl std::fmt::Debug for DocumentRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("DocumentRenderer")
            .field("backends", &names)
            .finish()
    }
}

/// Event name shortened for the cover table
pub(crate) fn cover_name(name: &str) -> String {
    if name.chars().count() > COVER_NAME_LIMIT {
        let short: String = name.chars().take(COVER_NAME_LIMIT).collect();
        format!("{short}...")
    } else {
        name.to_string()
    }
}

pub(crate) fn locked_label(locked: bool) -> &'static str {
    if locked { "Y" } else { "N" }
}

pub(crate) fn or_not_available(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => crate::labels::NOT_AVAILABLE,
    }
}
