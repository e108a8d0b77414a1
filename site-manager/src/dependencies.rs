//! Detection of corp-level objects a site's configuration refers to.
//!
//! Site rules and alerts can point at corp rule lists and corp signals
//! (names starting with `corp.`). Those objects do not travel with a site
//! backup, so migrating to another corp either has to drop the dependent
//! items or carry the corp objects along.

use crate::error::Result;
use regex::Regex;
use serde_json::{Map, Value};
use sigsci_platform::CustomAlert;
use std::collections::BTreeSet;
use std::fmt;

/// Prefix of corp-scoped list and signal ids
pub const CORP_PREFIX: &str = "corp.";

/// What kind of corp object a dependency names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependencyKind {
    RuleList,
    Signal,
}

impl DependencyKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleList => "rule_list",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corp objects referenced by one or more items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Corp rule list ids, e.g. `corp.blocked-ips`
    pub rule_lists: BTreeSet<String>,
    /// Corp signal tag names, e.g. `corp.scanner`
    pub signals: BTreeSet<String>,
}

impl Dependencies {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_lists.is_empty() && self.signals.is_empty()
    }

    pub fn insert(&mut self, kind: DependencyKind, name: impl Into<String>) {
        match kind {
            DependencyKind::RuleList => self.rule_lists.insert(name.into()),
            DependencyKind::Signal => self.signals.insert(name.into()),
        };
    }

    pub fn extend(&mut self, other: Dependencies) {
        self.rule_lists.extend(other.rule_lists);
        self.signals.extend(other.signals);
    }

    /// Every dependency as `(kind, name)`, lists first
    pub fn iter(&self) -> impl Iterator<Item = (DependencyKind, &str)> {
        self.rule_lists
            .iter()
            .map(|name| (DependencyKind::RuleList, name.as_str()))
            .chain(
                self.signals
                    .iter()
                    .map(|name| (DependencyKind::Signal, name.as_str())),
            )
    }
}

/// Walk arbitrary JSON and collect every object holding at least one string
/// value that starts with `prefix`.
///
/// Objects come back once each, in depth-first discovery order (an object
/// before its children); structurally equal objects are reported once.
#[must_use]
pub fn find_prefixed_objects<'v>(value: &'v Value, prefix: &str) -> Vec<&'v Map<String, Value>> {
    let mut found = Vec::new();
    collect_prefixed(value, prefix, &mut found);
    found
}

fn collect_prefixed<'v>(value: &'v Value, prefix: &str, found: &mut Vec<&'v Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            let has_prefixed = map
                .values()
                .any(|v| v.as_str().is_some_and(|s| s.starts_with(prefix)));
            if has_prefixed && !found.iter().any(|seen| *seen == map) {
                found.push(map);
            }
            for child in map.values() {
                collect_prefixed(child, prefix, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_prefixed(item, prefix, found);
            }
        }
        _ => {}
    }
}

fn str_field<'m>(map: &'m Map<String, Value>, key: &str) -> Option<&'m str> {
    map.get(key).and_then(Value::as_str)
}

/// Corp lists and signals referenced by a request, signal or site rule.
///
/// - a condition with `operator: inList` depends on the list in `value`
/// - an action with `type: addSignal` depends on its `signal`
/// - any `signal` field naming a corp signal is a dependency as well
#[must_use]
pub fn rule_dependencies(rule: &Value) -> Dependencies {
    let mut dependencies = Dependencies::default();
    for object in find_prefixed_objects(rule, CORP_PREFIX) {
        if str_field(object, "operator") == Some("inList") {
            if let Some(list) = str_field(object, "value") {
                dependencies.insert(DependencyKind::RuleList, list);
            }
        }
        if let Some(signal) = str_field(object, "signal") {
            if str_field(object, "type") == Some("addSignal") || signal.starts_with(CORP_PREFIX) {
                dependencies.insert(DependencyKind::Signal, signal);
            }
        }
    }
    dependencies
}

/// The corp signal an alert fires on, if any.
#[must_use]
pub fn alert_dependency(alert: &CustomAlert) -> Option<&str> {
    alert
        .tag_name
        .starts_with(CORP_PREFIX)
        .then_some(alert.tag_name.as_str())
}

/// Finds corp references inside advanced rule sources.
///
/// Advanced rules are opaque to the API, so references are recovered from
/// quoted `corp.` names in their string fields; names reached through
/// `matchers` or `lists` are rule lists, anything else is a signal.
pub struct AdvancedRuleScanner {
    reference: Regex,
}

impl AdvancedRuleScanner {
    /// # Errors
    ///
    /// Fails only if the reference pattern does not compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            reference: Regex::new(r#"[^#]"(matchers|lists)*/*(corp\..+?)[")\s]"#)?,
        })
    }

    /// Corp references in every string leaf of `rule`
    #[must_use]
    pub fn dependencies(&self, rule: &Value) -> Dependencies {
        let mut dependencies = Dependencies::default();
        self.scan(rule, &mut dependencies);
        dependencies
    }

    fn scan(&self, value: &Value, dependencies: &mut Dependencies) {
        match value {
            Value::String(text) => {
                for captures in self.reference.captures_iter(text) {
                    let Some(name) = captures.get(2) else {
                        continue;
                    };
                    let kind = match captures.get(1).map(|m| m.as_str()) {
                        Some("matchers" | "lists") => DependencyKind::RuleList,
                        _ => DependencyKind::Signal,
                    };
                    dependencies.insert(kind, name.as_str());
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.scan(item, dependencies)),
            Value::Object(map) => map.values().for_each(|item| self.scan(item, dependencies)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert(tag_name: &str) -> CustomAlert {
        CustomAlert {
            id: None,
            tag_name: tag_name.to_string(),
            long_name: "alert".to_string(),
            interval: 10,
            threshold: 10,
            enabled: true,
            action: "flagged".to_string(),
            kind: None,
        }
    }

    #[test]
    fn test_walker_finds_all_and_only_prefixed_objects() {
        let value = json!({
            "groupOperator": "all",
            "conditions": [
                {"type": "single", "field": "ip", "operator": "inList", "value": "corp.bad-ips"},
                {"type": "single", "field": "path", "operator": "equals", "value": "/corp.html"},
                {"type": "group", "groupOperator": "any", "conditions": [
                    {"type": "single", "field": "country", "operator": "inList", "value": "corp.countries"},
                    {"type": "single", "field": "ip", "operator": "inList", "value": "corp.bad-ips"}
                ]}
            ],
            "actions": [{"type": "addSignal", "signal": "corp.scanner"}],
            "note": "corp.not-an-object-of-interest-at-root"
        });

        let found = find_prefixed_objects(&value, CORP_PREFIX);
        let values: Vec<Value> = found.iter().map(|m| Value::Object((*m).clone())).collect();

        // Root counts because of `note`; the duplicate bad-ips condition is reported once
        assert_eq!(values.len(), 4);
        assert_eq!(values[0]["groupOperator"], "all");
        assert_eq!(
            values.iter().filter(|v| v["value"] == "corp.bad-ips").count(),
            1
        );
        assert!(values.iter().any(|v| v["value"] == "corp.countries"));
        assert!(values.iter().any(|v| v["signal"] == "corp.scanner"));
        assert!(values.iter().all(|v| v["value"] != "/corp.html"));
    }

    #[test]
    fn test_walker_on_scalars_and_empty_values() {
        assert!(find_prefixed_objects(&json!("corp.x"), CORP_PREFIX).is_empty());
        assert!(find_prefixed_objects(&json!([]), CORP_PREFIX).is_empty());
        assert!(find_prefixed_objects(&json!({"a": 1}), CORP_PREFIX).is_empty());
    }

    #[test]
    fn test_rule_dependencies() {
        let rule = json!({
            "enabled": true,
            "groupOperator": "any",
            "conditions": [
                {"type": "single", "field": "ip", "operator": "inList", "value": "corp.bad-ips"},
                {"type": "single", "field": "ip", "operator": "inList", "value": "site.local-ips"}
            ],
            "action": "addSignal",
            "signal": "corp.bad-actor",
            "reason": "tag bad ips"
        });

        let dependencies = rule_dependencies(&rule);
        assert_eq!(
            dependencies.rule_lists.iter().collect::<Vec<_>>(),
            vec!["corp.bad-ips"]
        );
        assert_eq!(
            dependencies.signals.iter().collect::<Vec<_>>(),
            vec!["corp.bad-actor"]
        );
    }

    #[test]
    fn test_site_scoped_rule_has_no_dependencies() {
        let rule = json!({
            "groupOperator": "all",
            "conditions": [{"type": "single", "field": "ip", "operator": "inList", "value": "site.local"}],
            "action": "block",
            "signal": null
        });
        assert!(rule_dependencies(&rule).is_empty());
    }

    #[test]
    fn test_alert_dependency() {
        assert_eq!(alert_dependency(&alert("corp.scanner")), Some("corp.scanner"));
        assert_eq!(alert_dependency(&alert("site.scanner")), None);
        assert_eq!(alert_dependency(&alert("SQLI")), None);
    }

    #[test]
    fn test_advanced_rule_scanner() {
        let scanner = AdvancedRuleScanner::new().unwrap();
        let rule = json!({
            "id": "adv1",
            "shortName": "geo",
            "rule": "if ip in \"matchers/corp.bad-ips\" then tag \"corp.geo-signal\" ",
            "lists": ["x \"lists/corp.allow\")"],
            "comment": "#\"corp.ignored\" "
        });

        let dependencies = scanner.dependencies(&rule);
        assert!(dependencies.rule_lists.contains("corp.bad-ips"));
        assert!(dependencies.signals.contains("corp.geo-signal"));
        assert!(dependencies.rule_lists.contains("corp.allow"));
        assert!(!dependencies.signals.contains("corp.ignored"));
        assert!(!dependencies.rule_lists.contains("corp.ignored"));
    }

    #[test]
    fn test_dependencies_iter_order() {
        let mut dependencies = Dependencies::default();
        dependencies.insert(DependencyKind::Signal, "corp.s");
        dependencies.insert(DependencyKind::RuleList, "corp.l");
        let items: Vec<_> = dependencies.iter().collect();
        assert_eq!(
            items,
            vec![
                (DependencyKind::RuleList, "corp.l"),
                (DependencyKind::Signal, "corp.s")
            ]
        );
    }
}
