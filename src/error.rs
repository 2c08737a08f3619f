//! Error types for edr-printer
//!
//! The pipeline distinguishes four failure domains, each with its own blast radius:
//! - [`AuthError`] - fatal to the whole batch (no credential, no fetches)
//! - [`FetchError`] - fatal to one event only
//! - [`RenderError`] - fatal to one document (one event, or every event in a consolidated document)
//! - [`DeliveryError`] - a print or persist step failed; the document itself is kept on disk
//!
//! Every domain error carries a machine-readable code through [`ErrorCode`], used by
//! the batch summary and the JSON output of the CLI.

use crate::types::EventId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for edr-printer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for edr-printer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "portal.username")
        key: Option<String>,
    },

    /// Authentication failed; the batch cannot proceed
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Retrieving an event record failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Rendering a document failed
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Delivering a document failed
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of a specific pipeline step
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Authentication failures
///
/// None of these are retried: the one-time code is single-use and time-boxed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The portal rejected the one-time code
    #[error("the one-time code was rejected")]
    InvalidCode,

    /// The one-time code expired before it was submitted
    #[error("the one-time code has expired")]
    ExpiredCode,

    /// A transport-level failure during a negotiation step
    #[error("network failure during {step}: {source}")]
    Network {
        /// The negotiation step that was in flight
        step: &'static str,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The portal rejected the account identifier or secret
    #[error("credentials rejected by portal (HTTP {status})")]
    CredentialsRejected {
        /// HTTP status returned by the login endpoint
        status: u16,
    },

    /// The portal refused to send a one-time code to the registered device
    #[error("one-time code request rejected by portal (HTTP {status})")]
    MfaRequestRejected {
        /// HTTP status returned by the send-code endpoint
        status: u16,
    },

    /// The code input channel closed before a code was supplied
    #[error("no one-time code could be read: {0}")]
    InputUnavailable(String),

    /// The final token exchange did not yield a bearer token
    #[error("bearer token unavailable: {0}")]
    TokenUnavailable(String),

    /// A required setting for negotiation is missing
    #[error("missing {0} for authentication")]
    MissingSetting(&'static str),

    /// Authentication was not requested and no credential was injected
    #[error("no credential available and authentication was not requested")]
    MissingCredential,

    /// The stored credential is past its validity window
    #[error("stored credential expired")]
    CredentialExpired,
}

/// Per-event retrieval failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// The portal has no record for this event
    #[error("event {event_id} not found")]
    NotFound {
        /// The requested event
        event_id: EventId,
    },

    /// The portal refused the bearer token
    #[error("unauthorized to read event {event_id} (HTTP {status})")]
    Unauthorized {
        /// The requested event
        event_id: EventId,
        /// HTTP status (401 or 403)
        status: u16,
    },

    /// Transport-level failure
    #[error("network failure fetching event {event_id}: {source}")]
    Network {
        /// The requested event
        event_id: EventId,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The portal answered with a status that maps to no other variant
    #[error("unexpected HTTP {status} fetching event {event_id}")]
    UnexpectedStatus {
        /// The requested event
        event_id: EventId,
        /// HTTP status returned
        status: u16,
    },

    /// The payload lacks a mandatory field or is not a JSON object
    #[error("invalid payload for event {event_id}: {reason}")]
    InvalidPayload {
        /// The requested event
        event_id: EventId,
        /// What was wrong with the payload
        reason: String,
    },

    /// The credential ran out during the batch
    #[error("credential expired before event {event_id} could be fetched")]
    CredentialExpired {
        /// The event that was not attempted
        event_id: EventId,
    },

    /// The event listing request was refused
    #[error("event listing rejected (HTTP {status})")]
    BrowseRejected {
        /// HTTP status returned
        status: u16,
    },
}

/// Rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    /// Nothing to render
    #[error("no records to render")]
    NoRecords,

    /// A single backend failed
    #[error("{backend} backend failed: {reason}")]
    Backend {
        /// Backend name
        backend: &'static str,
        /// Failure description
        reason: String,
    },

    /// Every configured backend failed
    #[error("all render backends failed: {}", format_attempts(.attempts))]
    AllBackendsFailed {
        /// Backend name and failure reason, in attempt order
        attempts: Vec<(String, String)>,
    },
}

/// Delivery failures
///
/// A print mechanism failing is not data loss: the dispatcher falls back to keeping
/// the document on disk. Only [`DeliveryError::Persist`] means the document could not
/// be written at all.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The print program is not installed
    #[error("print program {program} not found")]
    ProgramNotFound {
        /// Program name that was looked up
        program: String,
    },

    /// The print program could not be started
    #[error("failed to launch {program}: {reason}")]
    LaunchFailed {
        /// Program that was launched
        program: String,
        /// Failure description
        reason: String,
    },

    /// The print program exited unsuccessfully
    #[error("{program} exited with code {code:?}")]
    CommandFailed {
        /// Program that was launched
        program: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
    },

    /// The print program did not finish in time
    #[error("{program} timed out after {seconds}s")]
    TimedOut {
        /// Program that was launched
        program: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// No print mechanism is configured for this platform
    #[error("no print mechanism available")]
    NoMechanism,

    /// Writing the document to disk failed
    #[error("failed to persist document to {path}: {source}")]
    Persist {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(backend, reason)| format!("{backend}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Machine-readable error codes
pub trait ErrorCode {
    /// Stable snake_case identifier for this error
    fn error_code(&self) -> &'static str;
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCode => "invalid_code",
            AuthError::ExpiredCode => "expired_code",
            AuthError::Network { .. } => "network",
            AuthError::CredentialsRejected { .. } => "credentials_rejected",
            AuthError::MfaRequestRejected { .. } => "mfa_request_rejected",
            AuthError::InputUnavailable(_) => "input_unavailable",
            AuthError::TokenUnavailable(_) => "token_unavailable",
            AuthError::MissingSetting(_) => "missing_setting",
            AuthError::MissingCredential => "missing_credential",
            AuthError::CredentialExpired => "credential_expired",
        }
    }
}

impl ErrorCode for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            FetchError::NotFound { .. } => "not_found",
            FetchError::Unauthorized { .. } => "unauthorized",
            FetchError::Network { .. } => "network",
            FetchError::UnexpectedStatus { .. } => "unexpected_status",
            FetchError::InvalidPayload { .. } => "invalid_payload",
            FetchError::CredentialExpired { .. } => "credential_expired",
            FetchError::BrowseRejected { .. } => "browse_rejected",
        }
    }
}

impl ErrorCode for RenderError {
    fn error_code(&self) -> &'static str {
        match self {
            RenderError::NoRecords => "no_records",
            RenderError::Backend { .. } => "backend_failed",
            RenderError::AllBackendsFailed { .. } => "all_backends_failed",
        }
    }
}

impl ErrorCode for DeliveryError {
    fn error_code(&self) -> &'static str {
        match self {
            DeliveryError::ProgramNotFound { .. } => "program_not_found",
            DeliveryError::LaunchFailed { .. } => "launch_failed",
            DeliveryError::CommandFailed { .. } => "command_failed",
            DeliveryError::TimedOut { .. } => "timed_out",
            DeliveryError::NoMechanism => "no_mechanism",
            DeliveryError::Persist { .. } => "persist_failed",
        }
    }
}

impl ErrorCode for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Auth(e) => e.error_code(),
            Error::Fetch(e) => e.error_code(),
            Error::Render(e) => e.error_code(),
            Error::Delivery(e) => e.error_code(),
            Error::Io(_) => "io_error",
            Error::Network(_) => "network",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
