//! Templated rules (configured templates) of a site.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// A detection enabled from a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    /// Template-specific settings, kept opaque
    #[serde(default)]
    pub fields: Value,
    pub enabled: bool,
}

/// Alert attached to a templated rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAlert {
    pub long_name: String,
    pub interval: i64,
    pub threshold: i64,
    #[serde(default)]
    pub skip_notifications: bool,
    pub enabled: bool,
    pub action: String,
}

/// A configured template as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatedRule {
    pub name: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub alerts: Vec<TemplateAlert>,
}

impl TemplatedRule {
    /// A template counts as configured once it has detections or alerts.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.detections.is_empty() || !self.alerts.is_empty()
    }

    /// The additions needed to reproduce this template on another site.
    #[must_use]
    pub fn to_update(&self) -> TemplatedRuleUpdate {
        TemplatedRuleUpdate {
            detection_adds: self.detections.clone(),
            alert_adds: self.alerts.clone(),
        }
    }
}

/// Detections and alerts to add to a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatedRuleUpdate {
    #[serde(default)]
    pub detection_adds: Vec<Detection>,
    #[serde(default)]
    pub alert_adds: Vec<TemplateAlert>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyTemplateRequest<'u> {
    detection_adds: &'u [Detection],
    detection_updates: [Value; 0],
    detection_deletes: [Value; 0],
    alert_adds: &'u [TemplateAlert],
    alert_updates: [Value; 0],
    alert_deletes: [Value; 0],
}

/// Templated rule operations for a site
pub struct TemplatesApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> TemplatesApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// List every template of the site, configured or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<TemplatedRule>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/configuredtemplates");
        let envelope: DataEnvelope<TemplatedRule> = self
            .client
            .get_json(&endpoint, None, "list templated rules")
            .await?;
        Ok(envelope.data)
    }

    /// Add detections and alerts to the named template.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    pub async fn apply(&self, name: &str, update: &TemplatedRuleUpdate) -> Result<(), SigSciError> {
        let endpoint = self.client.site_path(
            self.site,
            &format!("/configuredtemplates/{}", urlencoding::encode(name)),
        );
        let request = ApplyTemplateRequest {
            detection_adds: &update.detection_adds,
            detection_updates: [],
            detection_deletes: [],
            alert_adds: &update.alert_adds,
            alert_updates: [],
            alert_deletes: [],
        };
        self.client
            .send_unit(
                reqwest::Method::POST,
                &endpoint,
                Some(&request),
                "apply templated rule",
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{Credentials, SigSciConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_unconfigured_template() {
        let rule: TemplatedRule = serde_json::from_value(json!({
            "name": "LOGINATTEMPT",
            "detections": [],
            "alerts": []
        }))
        .expect("should parse");
        assert!(!rule.is_configured());
    }

    #[tokio::test]
    async fn test_apply_sends_empty_update_and_delete_arrays() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v0/corps/testcorp/sites/www/configuredtemplates/LOGINATTEMPT")
                    .json_body(json!({
                        "detectionAdds": [{"name": "login", "fields": [], "enabled": true}],
                        "detectionUpdates": [],
                        "detectionDeletes": [],
                        "alertAdds": [],
                        "alertUpdates": [],
                        "alertDeletes": []
                    }));
                then.status(200).json_body(json!({}));
            })
            .await;

        let config = SigSciConfig::new(
            "user@example.com".to_string(),
            Credentials::api_token("t".to_string()),
            "testcorp".to_string(),
        )
        .with_base_url(format!("{}/api/v0", server.base_url()));
        let client = SigSciClient::new(config).expect("client should build");

        let update = TemplatedRuleUpdate {
            detection_adds: vec![Detection {
                name: "login".to_string(),
                fields: json!([]),
                enabled: true,
            }],
            alert_adds: vec![],
        };
        client
            .templates_api("www")
            .apply("LOGINATTEMPT", &update)
            .await
            .expect("apply should succeed");

        mock.assert_async().await;
    }
}
