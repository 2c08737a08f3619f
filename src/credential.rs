//! Process-lifetime holder for the bearer credential
//!
//! Owned by the batch orchestrator and lent to the fetcher per call. Nothing is
//! written to disk.

use crate::error::AuthError;
use crate::types::{Credential, CredentialSource};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Holds at most one credential
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credential>,
}

impl CredentialStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held credential
    pub fn store(&mut self, credential: Credential) {
        tracing::debug!(source = ?credential.source, expires_at = %credential.expires_at, "credential stored");
        self.current = Some(credential);
    }

    /// Store a caller-supplied token valid for `lifetime` from now
    pub fn inject(&mut self, token: impl Into<String>, lifetime: Duration) -> &Credential {
        self.current
            .insert(Credential::new(token, CredentialSource::Injected, lifetime))
    }

    /// The held credential, expired or not
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// The held credential if it is still valid at `now`
    pub fn valid_at(&self, now: DateTime<Utc>) -> Option<&Credential> {
        self.current.as_ref().filter(|c| !c.is_expired_at(now))
    }

    /// The held credential if it is still valid
    pub fn valid(&self) -> Option<&Credential> {
        self.valid_at(Utc::now())
    }

    /// The held credential, or why there is none usable
    pub fn require_valid(&self) -> Result<&Credential, AuthError> {
        match &self.current {
            None => Err(AuthError::MissingCredential),
            Some(c) if c.is_expired() => Err(AuthError::CredentialExpired),
            Some(c) => Ok(c),
        }
    }

    /// Drop the held credential
    pub fn clear(&mut self) {
        self.current = None;
    }
}
