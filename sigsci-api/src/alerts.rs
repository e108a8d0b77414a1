//! Custom alerts (signal thresholds) of a site.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// Action of the alerts the service creates for every new site
pub const SITE_METRIC_INFO: &str = "siteMetricInfo";

/// A custom alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAlert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub long_name: String,
    pub interval: i64,
    pub threshold: i64,
    pub enabled: bool,
    pub action: String,
    /// "siteAlert" for user-defined alerts, "templatedSignal" for template alerts
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl CustomAlert {
    /// Copy holding only the fields the create endpoint accepts
    #[must_use]
    pub fn portable(&self) -> Self {
        Self {
            id: None,
            kind: None,
            ..self.clone()
        }
    }

    /// Alerts the service adds on site creation
    #[must_use]
    pub fn is_site_metric(&self) -> bool {
        self.action == SITE_METRIC_INFO
    }
}

/// Custom alert operations for a site
pub struct AlertsApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> AlertsApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<CustomAlert>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/alerts");
        let envelope: DataEnvelope<CustomAlert> = self
            .client
            .get_json(&endpoint, None, "list custom alerts")
            .await?;
        Ok(envelope.data)
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the alert.
    pub async fn create(&self, alert: &CustomAlert) -> Result<CustomAlert, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/alerts");
        self.client
            .send_json(
                reqwest::Method::POST,
                &endpoint,
                &alert.portable(),
                "create custom alert",
            )
            .await
    }

    /// Overwrite the alert `id` with the settings of `alert`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    pub async fn update(&self, id: &str, alert: &CustomAlert) -> Result<(), SigSciError> {
        let endpoint = self
            .client
            .site_path(self.site, &format!("/alerts/{}", urlencoding::encode(id)));
        self.client
            .send_unit(
                reqwest::Method::PATCH,
                &endpoint,
                Some(&alert.portable()),
                "update custom alert",
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_portable_alert_drops_server_fields() {
        let alert: CustomAlert = serde_json::from_value(json!({
            "id": "5a1",
            "siteId": "5a0",
            "tagName": "SQLI",
            "longName": "(1.2) SQLi threshold",
            "interval": 10,
            "threshold": 50,
            "enabled": true,
            "action": "flagged",
            "type": "siteAlert",
            "fieldName": "remoteIP"
        }))
        .expect("should parse");

        assert_eq!(alert.kind.as_deref(), Some("siteAlert"));
        assert!(!alert.is_site_metric());
        assert_eq!(
            serde_json::to_value(alert.portable()).expect("should serialize"),
            json!({
                "tagName": "SQLI",
                "longName": "(1.2) SQLi threshold",
                "interval": 10,
                "threshold": 50,
                "enabled": true,
                "action": "flagged"
            })
        );
    }
}
