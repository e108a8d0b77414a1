//! Site API functionality for listing, inspecting and creating sites.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// A site (workspace) as returned by the corp sites endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Short name, used in every site-scoped path
    pub name: String,
    /// Human readable name
    #[serde(default)]
    pub display_name: String,
    /// Agent mode: "block", "log" or "off"
    #[serde(default)]
    pub agent_level: String,
    /// How long IPs stay flagged
    #[serde(default)]
    pub block_duration_seconds: i64,
    /// HTTP status returned to blocked requests
    #[serde(default, rename = "blockHTTPCode")]
    pub block_http_code: i64,
}

/// Portable site-wide settings, the part of a site that survives a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub agent_level: String,
    pub block_duration_seconds: i64,
    #[serde(rename = "blockHTTPCode")]
    pub block_http_code: i64,
}

impl From<&Site> for SiteSettings {
    fn from(site: &Site) -> Self {
        Self {
            agent_level: site.agent_level.clone(),
            block_duration_seconds: site.block_duration_seconds,
            block_http_code: site.block_http_code,
        }
    }
}

/// Request body for creating a site
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    pub name: String,
    pub display_name: String,
    #[serde(flatten)]
    pub settings: SiteSettings,
}

/// Site-specific error types
#[derive(Debug)]
#[must_use = "Need to handle all error enum types."]
pub enum SiteError {
    /// General API error
    Api(SigSciError),
    /// Site does not exist in the corp
    SiteNotFound(String),
    /// Site name already taken
    SiteAlreadyExists(String),
}

impl std::fmt::Display for SiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteError::Api(err) => write!(f, "API error: {err}"),
            SiteError::SiteNotFound(name) => write!(f, "Site not found: {name}"),
            SiteError::SiteAlreadyExists(name) => write!(f, "Site already exists: {name}"),
        }
    }
}

impl std::error::Error for SiteError {}

impl From<SigSciError> for SiteError {
    fn from(err: SigSciError) -> Self {
        SiteError::Api(err)
    }
}

impl From<reqwest::Error> for SiteError {
    fn from(err: reqwest::Error) -> Self {
        SiteError::Api(SigSciError::Http(err))
    }
}

impl From<serde_json::Error> for SiteError {
    fn from(err: serde_json::Error) -> Self {
        SiteError::Api(SigSciError::Serialization(err))
    }
}

/// Site API operations
pub struct SitesApi<'a> {
    client: &'a SigSciClient,
}

impl<'a> SitesApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient) -> Self {
        Self { client }
    }

    /// List every site of the corp.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or authentication fails.
    pub async fn list_sites(&self) -> Result<Vec<Site>, SiteError> {
        let endpoint = self.client.corp_path("/sites");
        let envelope: DataEnvelope<Site> =
            self.client.get_json(&endpoint, None, "list sites").await?;
        Ok(envelope.data)
    }

    /// Get one site by short name.
    ///
    /// # Errors
    ///
    /// `SiteError::SiteNotFound` when the corp has no such site; any other
    /// failure is `SiteError::Api`.
    pub async fn get_site(&self, name: &str) -> Result<Site, SiteError> {
        let endpoint = self.client.site_path(name, "");
        let response = self.client.get(&endpoint, None).await?;

        let status = response.status().as_u16();
        match status {
            200 => Ok(response.json().await?),
            404 => Err(SiteError::SiteNotFound(name.to_string())),
            _ => {
                let response = SigSciClient::handle_response(response, "get site").await?;
                Err(SiteError::Api(SigSciError::InvalidResponse(format!(
                    "Unexpected HTTP {} for site {name}",
                    response.status()
                ))))
            }
        }
    }

    /// Check whether a site exists.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than "not found".
    pub async fn site_exists(&self, name: &str) -> Result<bool, SiteError> {
        match self.get_site(name).await {
            Ok(_) => Ok(true),
            Err(SiteError::SiteNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a new site.
    ///
    /// # Errors
    ///
    /// `SiteError::SiteAlreadyExists` when the API reports a conflict.
    pub async fn create_site(&self, request: &CreateSiteRequest) -> Result<Site, SiteError> {
        let endpoint = self.client.corp_path("/sites");
        let response = self.client.post(&endpoint, Some(request)).await?;

        match response.status().as_u16() {
            200 | 201 => Ok(response.json().await?),
            409 => Err(SiteError::SiteAlreadyExists(request.name.clone())),
            _ => {
                SigSciClient::handle_response(response, "create site").await?;
                Err(SiteError::Api(SigSciError::InvalidResponse(
                    "Unexpected response creating site".to_string(),
                )))
            }
        }
    }
}
