//! Login and one-time code handshake
//!
//! The handshake is an explicit state machine:
//!
//! ```text
//! Start -> CredentialsSubmitted -> MfaRequested -> MfaPending -> Authenticated
//!   \______________________\______________\____________\______-> Failed
//! ```
//!
//! Any failure moves straight to `Failed`. Nothing is retried: the code is single-use.

use super::PortalClient;
use crate::config::PortalConfig;
use crate::error::AuthError;
use crate::types::{Credential, CredentialSource};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const AUTH_COOKIE: &str = "auth-token";
const MFA_TYPE: &str = "SMS_OTP";

/// Supplies the one-time code sent to the registered device
///
/// This is the single suspension point of a run. No timeout is applied here; the
/// portal's own code expiry is surfaced as [`AuthError::ExpiredCode`].
#[async_trait]
pub trait MfaCodeProvider: Send + Sync {
    /// Wait for the code
    async fn code(&self) -> Result<String, AuthError>;
}

/// Reads the code from standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

#[async_trait]
impl MfaCodeProvider for ConsolePrompt {
    async fn code(&self) -> Result<String, AuthError> {
        let line = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            use std::io::{BufRead, Write};

            eprint!("Enter the one-time code sent to your device: ");
            std::io::stderr().flush()?;

            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "standard input closed",
                ));
            }
            Ok(line)
        })
        .await
        .map_err(|e| AuthError::InputUnavailable(e.to_string()))?
        .map_err(|e| AuthError::InputUnavailable(e.to_string()))?;

        Ok(line.trim().to_string())
    }
}

/// A fixed code, for tests and non-interactive use
#[derive(Debug, Clone)]
pub struct StaticCode(pub String);

#[async_trait]
impl MfaCodeProvider for StaticCode {
    async fn code(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Obtains a credential from the portal
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Run the handshake to completion
    async fn negotiate(&mut self) -> Result<Credential, AuthError>;
}

/// Progress of a handshake
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing sent yet
    Start,
    /// The portal accepted the account identifier and secret
    CredentialsSubmitted,
    /// A code was sent to the registered device
    MfaRequested,
    /// A code was read and awaits validation
    MfaPending,
    /// A bearer token was obtained
    Authenticated,
    /// The handshake failed
    Failed,
}

/// Handshake against the real login and portal hosts
pub struct SessionNegotiator {
    client: PortalClient,
    username: Option<String>,
    password: Option<String>,
    mfa_credential_id: Option<String>,
    token_lifetime: Duration,
    codes: Box<dyn MfaCodeProvider>,
    state: NegotiationState,
    pending_code: Option<String>,
}

impl SessionNegotiator {
    /// Create a negotiator using the account settings in `config`
    pub fn new(
        client: PortalClient,
        config: &PortalConfig,
        codes: Box<dyn MfaCodeProvider>,
    ) -> Self {
        Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            mfa_credential_id: config.mfa_credential_id.clone(),
            token_lifetime: config.token_lifetime,
            codes,
            state: NegotiationState::Start,
            pending_code: None,
        }
    }

    /// Current handshake state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Perform one transition; returns the credential once authenticated
    async fn advance(&mut self) -> Result<Option<Credential>, AuthError> {
        match self.state {
            NegotiationState::Start => {
                self.submit_credentials().await?;
                self.state = NegotiationState::CredentialsSubmitted;
                Ok(None)
            }
            NegotiationState::CredentialsSubmitted => {
                self.request_code().await?;
                self.state = NegotiationState::MfaRequested;
                Ok(None)
            }
            NegotiationState::MfaRequested => {
                let code = self.codes.code().await?;
                let code = code.trim();
                if code.is_empty() {
                    return Err(AuthError::InvalidCode);
                }
                self.pending_code = Some(code.to_string());
                self.state = NegotiationState::MfaPending;
                Ok(None)
            }
            NegotiationState::MfaPending => {
                let code = self
                    .pending_code
                    .take()
                    .ok_or_else(|| AuthError::InputUnavailable("no code pending".into()))?;
                self.validate_code(&code).await?;
                self.warm_up().await;
                let token = self.exchange_token().await?;
                self.state = NegotiationState::Authenticated;
                Ok(Some(Credential::new(
                    token,
                    CredentialSource::Negotiated,
                    self.token_lifetime,
                )))
            }
            NegotiationState::Authenticated | NegotiationState::Failed => Err(
                AuthError::TokenUnavailable("handshake already finished".into()),
            ),
        }
    }

    fn mfa_credential_id(&self) -> Result<&str, AuthError> {
        self.mfa_credential_id
            .as_deref()
            .ok_or(AuthError::MissingSetting("MFA device identifier"))
    }

    async fn submit_credentials(&self) -> Result<(), AuthError> {
        let username = self
            .username
            .as_deref()
            .ok_or(AuthError::MissingSetting("account identifier"))?;
        let password = self
            .password
            .as_deref()
            .ok_or(AuthError::MissingSetting("account secret"))?;
        self.mfa_credential_id()?;

        tracing::info!(username = %username, "submitting portal credentials");
        let response = self
            .client
            .http()
            .post(self.client.endpoints().login.clone())
            .json(&json!({ "username": username, "password": password, "language": "en" }))
            .send()
            .await
            .map_err(|source| AuthError::Network {
                step: "login",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::CredentialsRejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn request_code(&self) -> Result<(), AuthError> {
        let credid = self.mfa_credential_id()?;

        tracing::info!("requesting one-time code");
        let response = self
            .client
            .http()
            .post(self.client.endpoints().send_code.clone())
            .json(&json!({ "type": MFA_TYPE, "credid": credid }))
            .send()
            .await
            .map_err(|source| AuthError::Network {
                step: "send_code",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::MfaRequestRejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn validate_code(&self, code: &str) -> Result<(), AuthError> {
        let credid = self.mfa_credential_id()?;

        tracing::debug!("validating one-time code");
        let response = self
            .client
            .http()
            .post(self.client.endpoints().validate_code.clone())
            .json(&json!({
                "type": MFA_TYPE,
                "credid": credid,
                "code": code,
                "failureCount": 0
            }))
            .send()
            .await
            .map_err(|source| AuthError::Network {
                step: "validate_code",
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::GONE {
            return Err(AuthError::ExpiredCode);
        }

        let body = response.text().await.unwrap_or_default();
        if body.to_ascii_lowercase().contains("expired") {
            Err(AuthError::ExpiredCode)
        } else {
            Err(AuthError::InvalidCode)
        }
    }

    /// Page registration and navigation; failures here are logged and ignored
    async fn warm_up(&self) {
        let endpoints = self.client.endpoints();
        for (step, url) in [
            ("register_page", &endpoints.page_details),
            ("portal_home", &endpoints.portal_home),
            ("event_management", &endpoints.event_management),
        ] {
            match self.client.http().get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(step, "portal warm-up step succeeded");
                }
                Ok(response) => {
                    tracing::warn!(step, status = %response.status(), "portal warm-up step failed, continuing");
                }
                Err(e) => {
                    tracing::warn!(step, error = %e, "portal warm-up step failed, continuing");
                }
            }
        }
    }

    async fn exchange_token(&self) -> Result<String, AuthError> {
        let url = self.client.endpoints().authenticate.clone();

        tracing::debug!("exchanging session for bearer token");
        let response = self
            .client
            .http()
            .get(url.clone())
            .send()
            .await
            .map_err(|source| AuthError::Network {
                step: "authenticate",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenUnavailable(format!(
                "token exchange returned HTTP {status}"
            )));
        }

        let from_response = response
            .cookies()
            .find(|c| c.name() == AUTH_COOKIE)
            .map(|c| c.value().to_string());

        from_response
            .or_else(|| self.client.cookie_value(&url, AUTH_COOKIE))
            .as_deref()
            .and_then(token_from_cookie)
            .ok_or_else(|| {
                AuthError::TokenUnavailable(format!("no usable {AUTH_COOKIE} cookie was set"))
            })
    }
}

#[async_trait]
impl Negotiator for SessionNegotiator {
    async fn negotiate(&mut self) -> Result<Credential, AuthError> {
        self.state = NegotiationState::Start;
        self.pending_code = None;

        loop {
            match self.advance().await {
                Ok(Some(credential)) => {
                    tracing::info!(expires_at = %credential.expires_at, "portal authentication complete");
                    return Ok(credential);
                }
                Ok(None) => {
                    tracing::debug!(state = ?self.state, "negotiation advanced");
                }
                Err(e) => {
                    tracing::error!(state = ?self.state, error = %e, "portal authentication failed");
                    self.state = NegotiationState::Failed;
                    return Err(e);
                }
            }
        }
    }
}

/// Extract the bearer token from the URL-encoded JSON `auth-token` cookie value
fn token_from_cookie(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let value: serde_json::Value = serde_json::from_str(&decoded).ok()?;
    value
        .get("token")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUTH_COOKIE_HEADER: &str = "auth-token=%7B%22token%22%3A%22abc123%22%7D; Path=/";

    fn portal_config(server: &MockServer) -> PortalConfig {
        PortalConfig {
            login_base_url: server.uri(),
            portal_base_url: server.uri(),
            username: Some("d2fr4w2".into()),
            password: Some("secret".into()),
            mfa_credential_id: Some("device-1".into()),
            ..Default::default()
        }
    }

    fn negotiator(config: &PortalConfig, code: &str) -> SessionNegotiator {
        let client = PortalClient::new(config).unwrap();
        SessionNegotiator::new(client, config, Box::new(StaticCode(code.into())))
    }

    async fn mount_login_and_send_code(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_partial_json(
                serde_json::json!({"username": "d2fr4w2", "password": "secret", "language": "en"}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/sendCode"))
            .and(body_partial_json(
                serde_json::json!({"type": "SMS_OTP", "credid": "device-1"}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_handshake_yields_negotiated_credential() {
        let server = MockServer::start().await;
        mount_login_and_send_code(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/validateCode"))
            .and(body_partial_json(
                serde_json::json!({"code": "123456", "failureCount": 0}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/EventManagement/api/authenticate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", AUTH_COOKIE_HEADER)
                    .set_body_json(serde_json::json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = portal_config(&server);
        let mut negotiator = negotiator(&config, " 123456 ");
        let credential = negotiator.negotiate().await.unwrap();

        assert_eq!(credential.token(), "abc123");
        assert_eq!(credential.source, CredentialSource::Negotiated);
        assert!(!credential.is_expired());
        assert_eq!(negotiator.state(), NegotiationState::Authenticated);
    }

    #[tokio::test]
    async fn rejected_code_is_invalid_code() {
        let server = MockServer::start().await;
        mount_login_and_send_code(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/validateCode"))
            .respond_with(ResponseTemplate::new(400).set_body_string("code mismatch"))
            .mount(&server)
            .await;

        let config = portal_config(&server);
        let mut negotiator = negotiator(&config, "000000");
        let err = negotiator.negotiate().await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCode));
        assert_eq!(negotiator.state(), NegotiationState::Failed);
    }

    #[tokio::test]
    async fn expired_code_by_status_or_body() {
        for template in [
            ResponseTemplate::new(410),
            ResponseTemplate::new(400).set_body_string(r#"{"message":"Code has EXPIRED"}"#),
        ] {
            let server = MockServer::start().await;
            mount_login_and_send_code(&server).await;
            Mock::given(method("POST"))
                .and(path("/api/mfa/validateCode"))
                .respond_with(template)
                .mount(&server)
                .await;

            let config = portal_config(&server);
            let err = negotiator(&config, "111111").negotiate().await.unwrap_err();
            assert_eq!(err.error_code(), "expired_code");
        }
    }

    #[tokio::test]
    async fn rejected_credentials_stop_before_code_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/sendCode"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = portal_config(&server);
        let err = negotiator(&config, "123456").negotiate().await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialsRejected { status: 401 }));
    }

    #[tokio::test]
    async fn blank_code_is_rejected_without_validation_call() {
        let server = MockServer::start().await;
        mount_login_and_send_code(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/validateCode"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = portal_config(&server);
        let err = negotiator(&config, "   ").negotiate().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode));
    }

    #[tokio::test]
    async fn missing_auth_cookie_is_token_unavailable() {
        let server = MockServer::start().await;
        mount_login_and_send_code(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/mfa/validateCode"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/EventManagement/api/authenticate"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = portal_config(&server);
        let err = negotiator(&config, "123456").negotiate().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_username_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = portal_config(&server);
        config.username = None;
        let err = negotiator(&config, "123456").negotiate().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingSetting(_)));
    }

    #[test]
    fn token_from_cookie_decodes_url_encoded_json() {
        assert_eq!(
            token_from_cookie("%7B%22token%22%3A%22abc%22%7D").as_deref(),
            Some("abc")
        );
        assert_eq!(token_from_cookie(r#"{"token":""}"#), None);
        assert_eq!(token_from_cookie("not-json"), None);
    }
}
