//! Rule list functionality (IP, country, string and wildcard lists).
//!
//! Lists live either at corp level (shared, ids prefixed `corp.`) or inside a
//! single site (ids prefixed `site.`).

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, Scope, SigSciClient, SigSciError};

/// A rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleList {
    /// Server-assigned id such as `corp.blocked-ips`; absent in backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// "ip", "country", "string" or "wildcard"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entries: Vec<String>,
}

impl RuleList {
    /// Copy without the server-assigned id
    #[must_use]
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Entry changes applied to an existing list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntriesDelta {
    pub additions: Vec<String>,
    pub deletions: Vec<String>,
}

/// PATCH body for a rule list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleListUpdate {
    pub entries: EntriesDelta,
}

/// Rule list operations for one scope
pub struct ListsApi<'a> {
    client: &'a SigSciClient,
    scope: Scope<'a>,
}

impl<'a> ListsApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, scope: Scope<'a>) -> Self {
        Self { client, scope }
    }

    fn endpoint(&self, suffix: &str) -> String {
        match self.scope {
            Scope::Corp => self.client.corp_path(&format!("/lists{suffix}")),
            Scope::Site(site) => self.client.site_path(site, &format!("/lists{suffix}")),
        }
    }

    /// List all rule lists in scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<RuleList>, SigSciError> {
        let envelope: DataEnvelope<RuleList> = self
            .client
            .get_json(&self.endpoint(""), None, "list rule lists")
            .await?;
        Ok(envelope.data)
    }

    /// Create a rule list; any id on the input is ignored by the API.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the list.
    pub async fn create(&self, list: &RuleList) -> Result<RuleList, SigSciError> {
        self.client
            .send_json(
                reqwest::Method::POST,
                &self.endpoint(""),
                &list.without_id(),
                "create rule list",
            )
            .await
    }

    /// Add or remove entries of an existing list.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    pub async fn update_entries(&self, id: &str, update: &RuleListUpdate) -> Result<(), SigSciError> {
        let endpoint = self.endpoint(&format!("/{}", urlencoding::encode(id)));
        self.client
            .send_unit(reqwest::Method::PATCH, &endpoint, Some(update), "update rule list")
            .await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_list_from_api_payload() {
        let list: RuleList = serde_json::from_value(json!({
            "id": "site.bad-ips",
            "name": "bad-ips",
            "type": "ip",
            "description": "known bad",
            "entries": ["1.1.1.1", "2.2.2.2"],
            "createdBy": "someone@example.com",
            "entryCount": 2
        }))
        .expect("should parse");

        assert_eq!(list.id.as_deref(), Some("site.bad-ips"));
        assert_eq!(list.kind, "ip");
        assert_eq!(list.entries.len(), 2);
    }

    #[test]
    fn test_backup_form_omits_id() {
        let list = RuleList {
            id: Some("site.x".to_string()),
            name: "x".to_string(),
            kind: "string".to_string(),
            description: String::new(),
            entries: vec!["a".to_string()],
        };
        let value = serde_json::to_value(list.without_id()).expect("should serialize");
        assert_eq!(
            value,
            json!({"name": "x", "type": "string", "description": "", "entries": ["a"]})
        );
    }

    #[test]
    fn test_update_body_shape() {
        let update = RuleListUpdate {
            entries: EntriesDelta {
                additions: vec!["2.2.2.2".to_string()],
                deletions: vec![],
            },
        };
        assert_eq!(
            serde_json::to_value(&update).expect("should serialize"),
            json!({"entries": {"additions": ["2.2.2.2"], "deletions": []}})
        );
    }
}
