//! The backup document: a site's portable configuration as JSON.
//!
//! Every category is optional when reading, so hand-trimmed files and files
//! produced by older versions of the tool load with empty categories.

use crate::error::{ManagerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigsci_platform::{
    AdvancedRule, CustomAlert, CustomSignal, Integration, RequestRule, RuleList, SignalRule,
    SiteMember, SiteSettings, TemplatedRuleUpdate,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Where a backup was taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub corp: String,
    pub site: String,
}

/// Corp-level objects a migrated site depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpItems {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_list: Vec<RuleList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signal: Vec<CustomSignal>,
}

impl CorpItems {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_list.is_empty() && self.signal.is_empty()
    }
}

/// A site backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteSettings>,
    #[serde(default)]
    pub rule_lists: Vec<RuleList>,
    #[serde(default)]
    pub request_rules: Vec<RequestRule>,
    #[serde(default)]
    pub custom_signals: Vec<CustomSignal>,
    #[serde(default)]
    pub signal_rules: Vec<SignalRule>,
    /// Template name to the detections and alerts it needs
    #[serde(default)]
    pub templated_rules: BTreeMap<String, TemplatedRuleUpdate>,
    #[serde(default)]
    pub custom_alerts: Vec<CustomAlert>,
    #[serde(default)]
    pub site_members: Vec<SiteMember>,
    #[serde(default)]
    pub advanced_rules: Vec<AdvancedRule>,
    #[serde(default)]
    pub integrations: Vec<Integration>,
    /// Newer rule format; carried through migrate untouched otherwise
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub site_rules: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corp_items: Option<CorpItems>,
}

impl BackupDocument {
    /// An empty document for `corp`/`site`
    #[must_use]
    pub fn new(corp: &str, site: &str) -> Self {
        Self {
            source: Source {
                corp: corp.to_string(),
                site: site.to_string(),
            },
            site: None,
            rule_lists: Vec::new(),
            request_rules: Vec::new(),
            custom_signals: Vec::new(),
            signal_rules: Vec::new(),
            templated_rules: BTreeMap::new(),
            custom_alerts: Vec::new(),
            site_members: Vec::new(),
            advanced_rules: Vec::new(),
            integrations: Vec::new(),
            site_rules: Vec::new(),
            corp_items: None,
        }
    }
}

/// Load a backup document from disk.
///
/// # Errors
///
/// I/O failures, or `ManagerError::InvalidBackup` when the content is not a
/// backup document.
pub fn read_backup(path: &Path) -> Result<BackupDocument> {
    debug!("Reading backup from {}", path.display());
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ManagerError::InvalidBackup(format!("{}: {e}", path.display())))
}

/// Write a backup document to disk.
///
/// # Errors
///
/// Serialization or I/O failures.
pub fn write_backup(path: &Path, document: &BackupDocument) -> Result<()> {
    debug!("Writing backup to {}", path.display());
    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_categories_read_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");
        fs::write(
            &path,
            r#"{"source": {"corp": "acme", "site": "www"},
                "custom_signals": [{"tagName": "site.probe", "shortName": "probe", "description": ""}]}"#,
        )
        .unwrap();

        let document = read_backup(&path).unwrap();
        assert_eq!(document.source.site, "www");
        assert_eq!(document.custom_signals.len(), 1);
        assert!(document.rule_lists.is_empty());
        assert!(document.templated_rules.is_empty());
        assert!(document.corp_items.is_none());
    }

    #[test]
    fn test_not_a_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            read_backup(&path),
            Err(ManagerError::InvalidBackup(_))
        ));
    }

    #[test]
    fn test_write_then_read_keeps_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("www.json");

        let document: BackupDocument = serde_json::from_value(json!({
            "source": {"corp": "acme", "site": "www"},
            "site": {"agentLevel": "block", "blockDurationSeconds": 86400, "blockHTTPCode": 406},
            "rule_lists": [{"name": "bad", "type": "ip", "description": "", "entries": ["1.1.1.1"]}],
            "request_rules": [{
                "enabled": true, "groupOperator": "all",
                "conditions": [{"type": "single", "field": "ip", "operator": "inList", "value": "site.bad"}],
                "action": "block", "signal": null, "reason": "bad ips", "expiration": ""
            }],
            "templated_rules": {"LOGINATTEMPT": {
                "detectionAdds": [{"name": "login", "fields": [{"name": "path", "value": "/login"}], "enabled": true}],
                "alertAdds": []
            }},
            "site_members": [{"user": {"email": "jane@example.com"}, "role": "admin"}],
            "corp_items": {"signal": [{"tagName": "corp.shared", "shortName": "shared", "description": ""}]}
        }))
        .unwrap();

        write_backup(&path, &document).unwrap();
        let reread = read_backup(&path).unwrap();
        assert_eq!(reread, document);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["request_rules"][0]["signal"], Value::Null);
        assert!(raw["rule_lists"][0].get("id").is_none());
        assert!(raw["corp_items"].get("rule_list").is_none());
    }
}
