//! Request rules and signal rules, including their condition trees.

use serde::{Deserialize, Serialize};

use crate::{DataEnvelope, SigSciClient, SigSciError};

/// Node kind of a condition tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    /// Leaf comparing one request field
    Single,
    /// Boolean combination of child conditions
    Group,
    /// Condition over a multi-valued field (e.g. every POST parameter)
    Multival,
}

/// One node of a rule's boolean condition tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Condition {
    /// Leaf condition `field operator value`
    pub fn single(field: &str, operator: &str, value: &str) -> Self {
        Self {
            kind: ConditionKind::Single,
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value.to_string()),
            group_operator: None,
            conditions: Vec::new(),
        }
    }

    /// Group of child conditions joined by `group_operator` ("all" / "any")
    pub fn group(group_operator: &str, conditions: Vec<Condition>) -> Self {
        Self {
            kind: ConditionKind::Group,
            field: None,
            operator: None,
            value: None,
            group_operator: Some(group_operator.to_string()),
            conditions,
        }
    }
}

/// A request rule: conditions plus an explicit action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub enabled: bool,
    pub group_operator: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// "block", "allow" or "addSignal"
    pub action: String,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub expiration: String,
}

impl RequestRule {
    /// Copy without the server-assigned id
    #[must_use]
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// A signal rule: conditions whose match tags the request with `signal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub enabled: bool,
    pub signal: String,
    pub group_operator: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub reason: String,
}

impl SignalRule {
    /// Copy without the server-assigned id
    #[must_use]
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Request and signal rule operations for a site
pub struct RulesApi<'a> {
    client: &'a SigSciClient,
    site: &'a str,
}

impl<'a> RulesApi<'a> {
    #[must_use]
    pub fn new(client: &'a SigSciClient, site: &'a str) -> Self {
        Self { client, site }
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_request_rules(&self) -> Result<Vec<RequestRule>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/requestRules");
        let envelope: DataEnvelope<RequestRule> = self
            .client
            .get_json(&endpoint, None, "list request rules")
            .await?;
        Ok(envelope.data)
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the rule.
    pub async fn create_request_rule(&self, rule: &RequestRule) -> Result<RequestRule, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/requestRules");
        self.client
            .send_json(
                reqwest::Method::POST,
                &endpoint,
                &rule.without_id(),
                "create request rule",
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_signal_rules(&self) -> Result<Vec<SignalRule>, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/signalRules");
        let envelope: DataEnvelope<SignalRule> = self
            .client
            .get_json(&endpoint, None, "list signal rules")
            .await?;
        Ok(envelope.data)
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the rule.
    pub async fn create_signal_rule(&self, rule: &SignalRule) -> Result<SignalRule, SigSciError> {
        let endpoint = self.client.site_path(self.site, "/signalRules");
        self.client
            .send_json(
                reqwest::Method::POST,
                &endpoint,
                &rule.without_id(),
                "create signal rule",
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
    fn test_nested_condition_tree_parses() {
        let rule: RequestRule = serde_json::from_value(json!({
            "id": "5e1f",
            "enabled": true,
            "groupOperator": "all",
            "conditions": [
                {"type": "single", "field": "ip", "operator": "inList", "value": "corp.bad-ips"},
                {"type": "multival", "field": "postParameter", "operator": "exists",
                 "groupOperator": "any", "conditions": [
                    {"type": "single", "field": "name", "operator": "equals", "value": "foo"}
                 ]},
                {"type": "group", "groupOperator": "any", "conditions": [
                    {"type": "single", "field": "path", "operator": "equals", "value": "/admin"}
                ]}
            ],
            "action": "block",
            "signal": null,
            "reason": "block bad ips",
            "expiration": ""
        }))
        .expect("should parse");

        assert_eq!(rule.conditions.len(), 3);
        assert_eq!(rule.conditions[1].kind, ConditionKind::Multival);
        assert_eq!(rule.conditions[2].conditions[0].value.as_deref(), Some("/admin"));
        assert!(rule.signal.is_none());
    }

    #[test]
    fn test_backup_form_keeps_rule_fields() {
        let rule = RequestRule {
            id: Some("abc".to_string()),
            enabled: false,
            group_operator: "all".to_string(),
            conditions: vec![Condition::single("ip", "equals", "10.0.0.1")],
            action: "allow".to_string(),
            signal: None,
            reason: "office".to_string(),
            expiration: String::new(),
        };
        let value = serde_json::to_value(rule.without_id()).expect("should serialize");
        let mut keys: Vec<_> = value
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "action",
                "conditions",
                "enabled",
                "expiration",
                "groupOperator",
                "reason",
                "signal"
            ]
        );
        assert_eq!(
            value["conditions"][0],
            json!({"type": "single", "field": "ip", "operator": "equals", "value": "10.0.0.1"})
        );
    }
}
