//! # Signal Sciences API Client Library
//!
//! An async Rust client for the Signal Sciences dashboard API (`/api/v0`).
//! It covers the corp- and site-level configuration objects needed to back
//! up, deploy and reconcile site configuration: rule lists, custom signals,
//! request and signal rules, templated rules, custom alerts, integrations,
//! advanced rules, site members and corp users.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sigsci_platform::{Credentials, Scope, SigSciClient, SigSciConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SigSciConfig::new(
//!         "user@example.com".to_string(),
//!         Credentials::api_token("api-token".to_string()),
//!         "mycorp".to_string(),
//!     );
//!
//!     let client = SigSciClient::new(config)?.authenticate().await?;
//!
//!     let sites = client.sites_api().list_sites().await?;
//!     let lists = client.lists_api(Scope::Site("www")).list().await?;
//!     let corp_signals = client.signals_api(Scope::Corp).list().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Authentication
//!
//! Two credential types are supported:
//!
//! - **API token** - sent on every request as `x-api-user` / `x-api-token`
//! - **Password** - exchanged once for a session token via `POST /auth`,
//!   then sent as a bearer token
//!
//! ## Scopes
//!
//! Rule lists and custom signals exist both at corp level and per site. Their
//! APIs take a [`Scope`] so the same code path serves both.

pub mod advanced;
pub mod alerts;
pub mod client;
pub mod integrations;
pub mod lists;
pub mod requests;
pub mod rules;
pub mod signals;
pub mod site;
pub mod templates;
pub mod users;

use reqwest::Error as ReqwestError;
use std::fmt;

// Re-export common types for convenience
pub use advanced::{AdvancedRule, AdvancedRulesApi};
pub use alerts::{AlertsApi, CustomAlert, SITE_METRIC_INFO};
pub use client::SigSciClient;
pub use integrations::{Integration, IntegrationsApi};
pub use lists::{EntriesDelta, ListsApi, RuleList, RuleListUpdate};
pub use requests::{RequestLogEntry, RequestsApi};
pub use rules::{Condition, ConditionKind, RequestRule, RulesApi, SignalRule};
pub use signals::{CustomSignal, SignalsApi};
pub use site::{CreateSiteRequest, Site, SiteError, SiteSettings, SitesApi};
pub use templates::{Detection, TemplateAlert, TemplatedRule, TemplatedRuleUpdate, TemplatesApi};
pub use users::{
    CorpUser, InviteMemberships, InviteUserRequest, MemberUser, Membership, MembershipSite,
    SiteMember, UserError, UsersApi,
};

/// Default dashboard API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://dashboard.signalsciences.net/api/v0";

/// Custom error type for Signal Sciences API operations.
#[derive(Debug)]
pub enum SigSciError {
    /// HTTP request failed
    Http(ReqwestError),
    /// JSON serialization/deserialization failed
    Serialization(serde_json::Error),
    /// Authentication error (bad token, rejected password, expired session)
    Authentication(String),
    /// API returned an error response
    InvalidResponse(String),
    /// Configuration is invalid
    InvalidConfig(String),
    /// When an item is not found
    NotFound(String),
}

impl fmt::Display for SigSciError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SigSciError::Http(e) => write!(f, "HTTP error: {e}"),
            SigSciError::Serialization(e) => write!(f, "Serialization error: {e}"),
            SigSciError::Authentication(e) => write!(f, "Authentication error: {e}"),
            SigSciError::InvalidResponse(e) => write!(f, "Invalid response: {e}"),
            SigSciError::InvalidConfig(e) => write!(f, "Invalid configuration: {e}"),
            SigSciError::NotFound(e) => write!(f, "Item not found: {e}"),
        }
    }
}

impl std::error::Error for SigSciError {}

impl From<ReqwestError> for SigSciError {
    fn from(error: ReqwestError) -> Self {
        SigSciError::Http(error)
    }
}

impl From<serde_json::Error> for SigSciError {
    fn from(error: serde_json::Error) -> Self {
        SigSciError::Serialization(error)
    }
}

/// Secret string wrapper that redacts its value in debug output.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: String) -> Self {
        SecretValue(value)
    }

    /// Access the raw secret, only for building request headers or bodies
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue(value)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// How the client proves its identity to the API.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Long-lived API access token
    ApiToken(SecretValue),
    /// Account password, exchanged for a session token on `authenticate()`
    Password(SecretValue),
}

impl Credentials {
    pub fn api_token(token: String) -> Self {
        Credentials::ApiToken(SecretValue::new(token))
    }

    pub fn password(password: String) -> Self {
        Credentials::Password(SecretValue::new(password))
    }
}

/// Configuration for the Signal Sciences API client.
#[derive(Debug, Clone)]
pub struct SigSciConfig {
    /// Account email, also the `x-api-user` header value
    pub email: String,
    /// Token or password
    pub credentials: Credentials,
    /// Corp (tenant) short name
    pub corp: String,
    /// API root, including the `/api/v0` prefix
    pub base_url: String,
    /// Whether to validate TLS certificates (default: true)
    pub validate_certificates: bool,
    /// Connect timeout in seconds
    pub connect_timeout: u64,
    /// Whole-request timeout in seconds
    pub request_timeout: u64,
    /// Optional HTTP(S) proxy URL
    pub proxy_url: Option<String>,
}

/// Where a corp-or-site resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Shared by every site in the corp
    Corp,
    /// Owned by the named site
    Site(&'a str),
}

impl SigSciConfig {
    /// Create a configuration against the public dashboard endpoint.
    ///
    /// # Arguments
    ///
    /// * `email` - Account email address
    /// * `credentials` - API token or password
    /// * `corp` - Corp short name every request is scoped to
    pub fn new(email: String, credentials: Credentials, corp: String) -> Self {
        Self {
            email,
            credentials,
            corp,
            base_url: DEFAULT_BASE_URL.to_string(),
            validate_certificates: true,
            connect_timeout: 30,
            request_timeout: 300,
            proxy_url: None,
        }
    }

    /// Point the client at a different API root (trailing slashes are dropped).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url: String = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Disable certificate validation for development environments.
    ///
    /// WARNING: Never use this against the production dashboard.
    pub fn with_certificate_validation_disabled(mut self) -> Self {
        self.validate_certificates = false;
        self
    }

    /// Route all requests through a proxy.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Override the connect and request timeouts (seconds).
    pub fn with_timeouts(mut self, connect_timeout: u64, request_timeout: u64) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }
}

impl SigSciClient {
    /// Site list, lookup and creation.
    pub fn sites_api(&self) -> SitesApi<'_> {
        SitesApi::new(self)
    }

    /// Rule lists at corp or site scope.
    pub fn lists_api<'a>(&'a self, scope: Scope<'a>) -> ListsApi<'a> {
        ListsApi::new(self, scope)
    }

    /// Custom signals (tags) at corp or site scope.
    pub fn signals_api<'a>(&'a self, scope: Scope<'a>) -> SignalsApi<'a> {
        SignalsApi::new(self, scope)
    }

    /// Request rules and signal rules of a site.
    pub fn rules_api<'a>(&'a self, site: &'a str) -> RulesApi<'a> {
        RulesApi::new(self, site)
    }

    /// Templated rules of a site.
    pub fn templates_api<'a>(&'a self, site: &'a str) -> TemplatesApi<'a> {
        TemplatesApi::new(self, site)
    }

    /// Custom alerts of a site.
    pub fn alerts_api<'a>(&'a self, site: &'a str) -> AlertsApi<'a> {
        AlertsApi::new(self, site)
    }

    /// Notification integrations of a site.
    pub fn integrations_api<'a>(&'a self, site: &'a str) -> IntegrationsApi<'a> {
        IntegrationsApi::new(self, site)
    }

    /// Advanced rules of a site (read only).
    pub fn advanced_rules_api<'a>(&'a self, site: &'a str) -> AdvancedRulesApi<'a> {
        AdvancedRulesApi::new(self, site)
    }

    /// Corp users, memberships and site members.
    pub fn users_api(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    /// Request log search of a site.
    pub fn requests_api<'a>(&'a self, site: &'a str) -> RequestsApi<'a> {
        RequestsApi::new(self, site)
    }
}

/// Envelope used by every list endpoint: `{"data": [...]}`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub(crate) struct DataEnvelope<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let value: Option<Vec<T>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
