//! Notification integrations (Slack, webhooks, mail...) of a site.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// A site integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
}

impl Integration {
    #[must_use]
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }

    /// Same events regardless of order
    #[must_use]
    pub fn same_events(&self, other: &Integration) -> bool {
        let mut mine = self.events.clone();
        let mut theirs = other.events.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }
}

/// Integration operations for a site
pub struct IntegrationsApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> IntegrationsApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<Integration>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/integrations");
        let envelope: DataEnvelope<Integration> = self
            .client
            .get_json(&endpoint, None, "list integrations")
            .await?;
        Ok(envelope.data)
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the integration.
    pub async fn create(&self, integration: &Integration) -> Result<(), SigSciError> {
        let endpoint = self.client.site_path(self.site, "/integrations");
        self.client
            .send_unit(
                reqwest::Method::POST,
                &endpoint,
                Some(&integration.without_id()),
                "create integration",
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    pub async fn update(&self, id: &str, integration: &Integration) -> Result<(), SigSciError> {
        let endpoint = self.client.site_path(
            self.site,
            &format!("/integrations/{}", urlencoding::encode(id)),
        );
        self.client
            .send_unit(
                reqwest::Method::PATCH,
                &endpoint,
                Some(&integration.without_id()),
                "update integration",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration(events: &[&str]) -> Integration {
        Integration {
            id: None,
            name: "hook".to_string(),
            kind: "slack".to_string(),
            url: "https://hooks.example.com/x".to_string(),
            events: events.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_same_events_ignores_order() {
        let a = integration(&["flag", "listCreated"]);
        let b = integration(&["listCreated", "flag"]);
        let c = integration(&["flag"]);
        assert!(a.same_events(&b));
        assert!(!a.same_events(&c));
    }
}
