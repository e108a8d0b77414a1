//! Core Signal Sciences API client implementation.
//!
//! This module contains the foundational client for making authenticated requests
//! to the dashboard API, including token/session authentication and HTTP request handling.

use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::{Credentials, SecretValue, SigSciConfig, SigSciError};

const USER_AGENT: &str = concat!("sigsci-platform/", env!("CARGO_PKG_VERSION"));

/// Core Signal Sciences API client.
///
/// Holds the HTTP connection pool and the resolved authentication state.
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct SigSciClient {
    config: SigSciConfig,
    client: Client,
    session_token: Option<SecretValue>,
}

#[derive(serde::Deserialize)]
struct AuthResponse {
    token: String,
}

impl SigSciClient {
    /// Build URL with query parameters - centralized helper
    fn build_url_with_params(&self, endpoint: &str, query_params: &[(String, String)]) -> String {
        let mut url = String::with_capacity(
            self.config
                .base_url
                .len()
                .saturating_add(endpoint.len())
                .saturating_add(query_params.len().saturating_mul(32)),
        );
        url.push_str(&self.config.base_url);
        url.push_str(endpoint);

        if !query_params.is_empty() {
            url.push('?');
            for (i, (key, value)) in query_params.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                url.push_str(&urlencoding::encode(key));
                url.push('=');
                url.push_str(&urlencoding::encode(value));
            }
        }

        url
    }

    /// Create a new Signal Sciences API client.
    ///
    /// No network traffic happens here; call [`SigSciClient::authenticate`]
    /// before the first request when using password credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or proxy URL is invalid, or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: SigSciConfig) -> Result<Self, SigSciError> {
        Url::parse(&config.base_url).map_err(|e| {
            SigSciError::InvalidConfig(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;

        let mut client_builder = Client::builder().user_agent(USER_AGENT);

        if !config.validate_certificates {
            client_builder = client_builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        client_builder = client_builder
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| SigSciError::InvalidConfig(format!("Invalid proxy URL: {e}")))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(SigSciError::Http)?;
        Ok(Self {
            config,
            client,
            session_token: None,
        })
    }

    /// Resolve credentials into request authentication.
    ///
    /// API tokens are used as-is. A password is exchanged for a session
    /// token through `POST /auth`.
    ///
    /// # Errors
    ///
    /// Returns `SigSciError::Authentication` when the API rejects the
    /// email/password pair.
    pub async fn authenticate(mut self) -> Result<Self, SigSciError> {
        let password = match &self.config.credentials {
            Credentials::ApiToken(_) => return Ok(self),
            Credentials::Password(password) => password.clone(),
        };

        let url = format!("{}/auth", self.config.base_url);
        debug!("POST {url} (login for {})", self.config.email);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("email", self.config.email.as_str()),
                ("password", password.expose()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SigSciError::Authentication(format!(
                "Login failed for {}: HTTP {status}: {body}",
                self.config.email
            )));
        }

        let auth: AuthResponse = response.json().await?;
        info!("Authenticated as {}", self.config.email);
        self.session_token = Some(SecretValue::new(auth.token));
        Ok(self)
    }

    /// Get the base URL for API requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Corp every request is scoped to.
    #[must_use]
    pub fn corp(&self) -> &str {
        &self.config.corp
    }

    /// Get access to the configuration
    #[must_use]
    pub fn config(&self) -> &SigSciConfig {
        &self.config
    }

    /// Get access to the underlying reqwest client
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `/corps/{corp}{suffix}`
    #[must_use]
    pub fn corp_path(&self, suffix: &str) -> String {
        format!("/corps/{}{suffix}", urlencoding::encode(&self.config.corp))
    }

    /// `/corps/{corp}/sites/{site}{suffix}`
    #[must_use]
    pub fn site_path(&self, site: &str, suffix: &str) -> String {
        format!(
            "/corps/{}/sites/{}{suffix}",
            urlencoding::encode(&self.config.corp),
            urlencoding::encode(site)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.session_token, &self.config.credentials) {
            (Some(session), _) => request.bearer_auth(session.expose()),
            (None, Credentials::ApiToken(token)) => request
                .header("x-api-user", &self.config.email)
                .header("x-api-token", token.expose()),
            // Unauthenticated password client; the API answers 401
            (None, Credentials::Password(_)) => request,
        }
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(String, String)]>,
        body: Option<&T>,
    ) -> Result<reqwest::Response, SigSciError> {
        let url = self.build_url_with_params(endpoint, query_params.unwrap_or(&[]));
        debug!("{method} {url}");

        let mut request = self
            .authorize(self.client.request(method, &url))
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            let serialized = serde_json::to_string(body)?;
            debug!("Request body: {serialized}");
            request = request.body(serialized);
        }

        Ok(request.send().await?)
    }

    /// Make a GET request to the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn get(
        &self,
        endpoint: &str,
        query_params: Option<&[(String, String)]>,
    ) -> Result<reqwest::Response, SigSciError> {
        self.send::<()>(Method::GET, endpoint, query_params, None)
            .await
    }

    /// Make a POST request to the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized or the request cannot be sent.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, SigSciError> {
        self.send(Method::POST, endpoint, None, body).await
    }

    /// Make a PUT request to the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized or the request cannot be sent.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, SigSciError> {
        self.send(Method::PUT, endpoint, None, body).await
    }

    /// Make a PATCH request to the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized or the request cannot be sent.
    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, SigSciError> {
        self.send(Method::PATCH, endpoint, None, body).await
    }

    /// Make a DELETE request to the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn delete(&self, endpoint: &str) -> Result<reqwest::Response, SigSciError> {
        self.send::<()>(Method::DELETE, endpoint, None, None)
            .await
    }

    /// Helper method to handle common response processing.
    ///
    /// Checks if the response is successful and returns an error if not.
    /// The error message carries the failed operation, URL, status and the
    /// body the API returned (the dashboard reports problems as
    /// `{"message": "..."}`).
    ///
    /// # Errors
    ///
    /// `Authentication` for 401/403, `NotFound` for 404, `InvalidResponse`
    /// for any other non-success status.
    pub async fn handle_response(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, SigSciError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let error_text = response.text().await?;
        let message = serde_json::from_str::<serde_json::Value>(&error_text)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(error_text);

        Err(match status.as_u16() {
            401 | 403 => SigSciError::Authentication(format!("Failed to {context}: {message}")),
            404 => SigSciError::NotFound(message),
            _ => SigSciError::InvalidResponse(format!(
                "Failed to {context}\n  URL: {url}\n  HTTP {status}: {message}"
            )),
        })
    }

    /// GET an endpoint and decode its JSON body.
    ///
    /// # Errors
    ///
    /// Propagates transport errors, non-success statuses (see
    /// [`SigSciClient::handle_response`]) and decoding failures.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: Option<&[(String, String)]>,
        context: &str,
    ) -> Result<T, SigSciError> {
        let response = self.get(endpoint, query_params).await?;
        let response = Self::handle_response(response, context).await?;
        let text = response.text().await?;
        debug!("Response for {context}: {text}");
        Ok(serde_json::from_str(&text)?)
    }

    /// Send a mutating request and decode the JSON body it returns.
    ///
    /// # Errors
    ///
    /// Propagates transport errors, non-success statuses and decoding failures.
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        context: &str,
    ) -> Result<T, SigSciError> {
        let response = self.send(method, endpoint, None, Some(body)).await?;
        let response = Self::handle_response(response, context).await?;
        Ok(response.json().await?)
    }

    /// Send a mutating request whose response body is irrelevant.
    ///
    /// # Errors
    ///
    /// Propagates transport errors and non-success statuses.
    pub async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        context: &str,
    ) -> Result<(), SigSciError> {
        let response = self.send(method, endpoint, None, body).await?;
        Self::handle_response(response, context).await?;
        Ok(())
    }
}
