//! Advanced rules. The API only exposes them for reading; creating one
//! requires a support request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// An advanced rule; everything but the identifiers is kept as raw JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedRule {
    pub id: String,
    pub short_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdvancedRule {
    /// Only `id` and `shortName`, the form stored in backups
    #[must_use]
    pub fn summary(&self) -> Self {
        Self {
            id: self.id.clone(),
            short_name: self.short_name.clone(),
            extra: Map::new(),
        }
    }
}

/// Read-only advanced rule operations for a site
pub struct AdvancedRulesApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> AdvancedRulesApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// List advanced rules; sites without any answer with no `data` at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<AdvancedRule>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/advancedRules");
        let envelope: DataEnvelope<AdvancedRule> = self
            .client
            .get_json(&endpoint, None, "list advanced rules")
            .await?;
        Ok(envelope.data)
    }
}
