//! # edr-printer
//!
//! Batch retrieval, rendering and printing of retail Event Detail Reports.
//!
//! A run authenticates against the retailer portal once (login, one-time code,
//! token exchange), fetches the report for each requested event, renders one
//! document per event or a single consolidated document, and prints or saves it.
//! Failures are isolated per event and collected into a [`BatchResult`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use edr_printer::{BatchOrchestrator, Config, ConsolePrompt, EventId, PortalClient, RunOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let client = PortalClient::new(&config.portal)?;
//!     let mut orchestrator =
//!         BatchOrchestrator::from_config(&config, client, Box::new(ConsolePrompt));
//!
//!     let ids = vec![EventId::from("606034")];
//!     let result = orchestrator
//!         .run(
//!             &ids,
//!             RunOptions {
//!                 authenticate: true,
//!                 save_copy: true,
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch orchestration
pub mod batch;
/// Configuration types
pub mod config;
/// Credential storage
pub mod credential;
/// Printing and saving of rendered documents
pub mod delivery;
/// Error types
pub mod error;
/// Event type and status code tables
pub mod labels;
/// Portal session, report and listing access
pub mod portal;
/// Decoded event records
pub mod record;
/// Document rendering backends
pub mod render;
/// Core types
pub mod types;
/// Filesystem helpers
pub mod utils;

pub use batch::{BatchOrchestrator, RunOptions};
pub use config::Config;
pub use credential::CredentialStore;
pub use delivery::{CommandPrinter, DeliveryOptions, Dispatcher, PrintMechanism};
pub use error::{AuthError, DeliveryError, Error, ErrorCode, FetchError, RenderError, Result};
pub use portal::{
    BrowseQuery, ConsolePrompt, EventSummary, HttpReportFetcher, MfaCodeProvider, Negotiator,
    PortalClient, ReportFetcher, SessionNegotiator, StaticCode,
};
pub use record::EventRecord;
pub use render::{DocumentRenderer, HtmlBackend, RenderBackend, TextBackend};
pub use types::{
    BatchEvent, BatchResult, Credential, CredentialSource, DeliveryResult, DocumentFormat,
    EventId, EventOutcome, Outcome, RenderedDocument,
};
