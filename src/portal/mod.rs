//! Remote portal access
//!
//! [`PortalClient`] owns the HTTP client and its cookie jar. The login host and the
//! portal host share the jar, so cookies set during negotiation carry over to the
//! Event Management calls.

mod browse;
mod fetch;
mod session;

pub use browse::{BrowseQuery, EventSummary};
pub use fetch::{HttpReportFetcher, ReportFetcher};
pub use session::{
    ConsolePrompt, MfaCodeProvider, NegotiationState, Negotiator, SessionNegotiator, StaticCode,
};

use crate::config::PortalConfig;
use crate::error::{Error, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::sync::Arc;
use url::Url;

/// Every URL the pipeline talks to, resolved once from configuration
#[derive(Clone, Debug)]
pub struct PortalEndpoints {
    /// `POST {login}/api/login`
    pub login: Url,
    /// `POST {login}/api/mfa/sendCode`
    pub send_code: Url,
    /// `POST {login}/api/mfa/validateCode`
    pub validate_code: Url,
    /// `GET {portal}/rl_portal_services/api/Site/InsertRlPageDetails?...`
    pub page_details: Url,
    /// `GET {portal}/rl_portal/`
    pub portal_home: Url,
    /// `GET {portal}/EventManagement/`
    pub event_management: Url,
    /// `GET {portal}/EventManagement/api/authenticate`
    pub authenticate: Url,
    /// `GET {portal}/EventManagement/api/edrReport`
    pub edr_report: Url,
    /// `POST {portal}/EventManagement/api/browse-event/browse-data`
    pub browse_data: Url,
}

impl PortalEndpoints {
    /// Resolve endpoints against the configured base URLs
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let login = base_url(&config.login_base_url, "portal.login_base_url")?;
        let portal = base_url(&config.portal_base_url, "portal.portal_base_url")?;

        let mut page_details = join(
            &portal,
            "rl_portal_services/api/Site/InsertRlPageDetails",
            "portal.portal_base_url",
        )?;
        page_details
            .query_pairs_mut()
            .append_pair("pageId", "6")
            .append_pair("pageSubId", "w6040")
            .append_pair("pageSubDesc", "Event Management System");

        Ok(Self {
            login: join(&login, "api/login", "portal.login_base_url")?,
            send_code: join(&login, "api/mfa/sendCode", "portal.login_base_url")?,
            validate_code: join(&login, "api/mfa/validateCode", "portal.login_base_url")?,
            page_details,
            portal_home: join(&portal, "rl_portal/", "portal.portal_base_url")?,
            event_management: join(&portal, "EventManagement/", "portal.portal_base_url")?,
            authenticate: join(
                &portal,
                "EventManagement/api/authenticate",
                "portal.portal_base_url",
            )?,
            edr_report: join(
                &portal,
                "EventManagement/api/edrReport",
                "portal.portal_base_url",
            )?,
            browse_data: join(
                &portal,
                "EventManagement/api/browse-event/browse-data",
                "portal.portal_base_url",
            )?,
        })
    }
}

/// Parse a base URL and make sure joins append to its path instead of replacing the last segment
fn base_url(raw: &str, key: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| Error::config(format!("invalid URL {raw:?}: {e}"), key))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str, key: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::config(format!("cannot build {path} from {base}: {e}"), key))
}

/// Shared HTTP client with a cookie jar spanning the login and portal hosts
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    endpoints: Arc<PortalEndpoints>,
}

impl PortalClient {
    /// Build a client from portal configuration
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let endpoints = PortalEndpoints::from_config(config)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            jar,
            endpoints: Arc::new(endpoints),
        })
    }

    /// Resolved endpoint URLs
    pub fn endpoints(&self) -> &PortalEndpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Raw value of a cookie the jar would send to `url`
    pub(crate) fn cookie_value(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}
