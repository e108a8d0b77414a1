//! Structural comparison of rules and their condition trees.
//!
//! Two rules are "the same" when they would match the same requests and do
//! the same thing. Bookkeeping fields (ids, `enabled`, `reason`,
//! `expiration`) never take part, and condition lists compare as multisets:
//! order does not matter, but every condition on one side must pair with a
//! distinct equal condition on the other.

use serde::Serialize;
use serde_json::Value;
use sigsci_platform::{Condition, ConditionKind, RequestRule, SignalRule};

/// Compare two condition trees.
#[must_use]
pub fn equal_conditions(a: &Condition, b: &Condition) -> bool {
    if a.kind != b.kind {
        return false;
    }

    match a.kind {
        ConditionKind::Single => {
            a.field == b.field && a.operator == b.operator && a.value == b.value
        }
        ConditionKind::Group => {
            a.group_operator == b.group_operator
                && equal_condition_sets(&a.conditions, &b.conditions)
        }
        ConditionKind::Multival => {
            a.group_operator == b.group_operator
                && a.field == b.field
                && a.operator == b.operator
                && equal_condition_sets(&a.conditions, &b.conditions)
        }
    }
}

/// Compare two condition lists as multisets.
///
/// Condition equality is an equivalence relation, so pairing each condition
/// of `a` with the first unused equal condition of `b` finds a one-to-one
/// matching whenever one exists.
#[must_use]
pub fn equal_condition_sets(a: &[Condition], b: &[Condition]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut used = vec![false; b.len()];
    for condition in a {
        let Some(index) =
            (0..b.len()).find(|&i| !used[i] && equal_conditions(condition, &b[i]))
        else {
            return false;
        };
        used[index] = true;
    }
    true
}

/// Request rules have an explicit action, so it takes part in the comparison.
#[must_use]
pub fn equal_request_rules(a: &RequestRule, b: &RequestRule) -> bool {
    a.group_operator == b.group_operator
        && a.action == b.action
        && a.signal == b.signal
        && equal_condition_sets(&a.conditions, &b.conditions)
}

/// Signal rules have an implied action (tag the request with `signal`).
#[must_use]
pub fn equal_signal_rules(a: &SignalRule, b: &SignalRule) -> bool {
    a.group_operator == b.group_operator
        && a.signal == b.signal
        && equal_condition_sets(&a.conditions, &b.conditions)
}

/// First item of `haystack` whose serialized form equals `needle` on every
/// key. A key missing on either side never matches.
pub fn find_match<'h, T: Serialize>(
    needle: &T,
    haystack: &'h [T],
    keys: &[&str],
) -> Option<&'h T> {
    let needle = serde_json::to_value(needle).ok()?;
    haystack.iter().find(|item| {
        serde_json::to_value(item)
            .map(|candidate| keys.iter().all(|key| same_field(&needle, &candidate, key)))
            .unwrap_or(false)
    })
}

fn same_field(a: &Value, b: &Value, key: &str) -> bool {
    match (a.get(key), b.get(key)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(field: &str, operator: &str, value: &str) -> Condition {
        Condition::single(field, operator, value)
    }

    fn multival(field: &str, operator: &str, group_operator: &str, conditions: Vec<Condition>) -> Condition {
        Condition {
            kind: ConditionKind::Multival,
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: None,
            group_operator: Some(group_operator.to_string()),
            conditions,
        }
    }

    fn request_rule(conditions: Vec<Condition>) -> RequestRule {
        RequestRule {
            id: None,
            enabled: true,
            group_operator: "all".to_string(),
            conditions,
            action: "block".to_string(),
            signal: None,
            reason: "test".to_string(),
            expiration: String::new(),
        }
    }

    #[test]
    fn test_equal_single() {
        let a = single("ip", "equals", "1.1.1.1");
        assert!(equal_conditions(&a, &single("ip", "equals", "1.1.1.1")));
        assert!(!equal_conditions(&a, &single("ip", "equals", "2.2.2.2")));
        assert!(!equal_conditions(&a, &single("ip", "notEquals", "1.1.1.1")));
        assert!(!equal_conditions(&a, &single("path", "equals", "1.1.1.1")));
    }

    #[test]
    fn test_kinds_must_match() {
        let leaf = single("ip", "equals", "1.1.1.1");
        let group = Condition::group("all", vec![leaf.clone()]);
        assert!(!equal_conditions(&leaf, &group));
        assert!(!equal_conditions(&group, &leaf));
    }

    #[test]
    fn test_equal_multival() {
        let a = multival(
            "postParameter",
            "exists",
            "all",
            vec![single("name", "equals", "foo"), single("value", "equals", "bar")],
        );
        let reordered = multival(
            "postParameter",
            "exists",
            "all",
            vec![single("value", "equals", "bar"), single("name", "equals", "foo")],
        );
        let other_operator = multival(
            "postParameter",
            "doesNotExist",
            "all",
            vec![single("name", "equals", "foo"), single("value", "equals", "bar")],
        );
        let other_group = multival(
            "postParameter",
            "exists",
            "any",
            vec![single("name", "equals", "foo"), single("value", "equals", "bar")],
        );
        assert!(equal_conditions(&a, &reordered));
        assert!(!equal_conditions(&a, &other_operator));
        assert!(!equal_conditions(&a, &other_group));
    }

    #[test]
    fn test_nested_groups_compare_recursively() {
        let inner_a = Condition::group("any", vec![single("path", "equals", "/a")]);
        let inner_b = Condition::group("any", vec![single("path", "equals", "/b")]);
        let a = Condition::group("all", vec![inner_a.clone(), single("ip", "equals", "1.1.1.1")]);
        let b = Condition::group("all", vec![inner_b, single("ip", "equals", "1.1.1.1")]);
        let c = Condition::group("all", vec![single("ip", "equals", "1.1.1.1"), inner_a]);
        assert!(!equal_conditions(&a, &b));
        assert!(equal_conditions(&a, &c));
    }

    #[test]
    fn test_condition_sets_are_multisets() {
        let x = single("ip", "equals", "1.1.1.1");
        let y = single("ip", "equals", "2.2.2.2");

        // Same length, every element of the left side present on the right,
        // but the right side has no second x to pair with.
        let left = vec![x.clone(), x.clone()];
        let right = vec![x.clone(), y.clone()];
        assert!(!equal_condition_sets(&left, &right));
        assert!(!equal_condition_sets(&right, &left));

        assert!(equal_condition_sets(&[x.clone(), y.clone()], &[y.clone(), x.clone()]));
        assert!(!equal_condition_sets(&[x.clone()], &[x, y]));
    }

    #[test]
    fn test_condition_set_equality_is_commutative_and_order_insensitive() {
        let pool = vec![
            single("ip", "equals", "1.1.1.1"),
            single("path", "contains", "/admin"),
            Condition::group("any", vec![single("method", "equals", "POST")]),
            single("ip", "equals", "1.1.1.1"),
        ];

        // Every rotation of the pool compares equal both ways
        for shift in 0..pool.len() {
            let mut rotated = pool.clone();
            rotated.rotate_left(shift);
            assert!(equal_condition_sets(&pool, &rotated));
            assert!(equal_condition_sets(&rotated, &pool));
        }

        let mut changed = pool.clone();
        changed[3] = single("ip", "equals", "9.9.9.9");
        assert_eq!(
            equal_condition_sets(&pool, &changed),
            equal_condition_sets(&changed, &pool)
        );
        assert!(!equal_condition_sets(&pool, &changed));
    }

    #[test]
    fn test_request_rules_ignore_bookkeeping_fields() {
        let a = request_rule(vec![single("ip", "equals", "1.1.1.1")]);
        let mut b = a.clone();
        b.id = Some("abc".to_string());
        b.enabled = false;
        b.reason = "different reason".to_string();
        b.expiration = "2030-01-01T00:00:00Z".to_string();
        assert!(equal_request_rules(&a, &b));

        let mut c = a.clone();
        c.action = "allow".to_string();
        assert!(!equal_request_rules(&a, &c));

        let mut d = a.clone();
        d.signal = Some("site.probe".to_string());
        assert!(!equal_request_rules(&a, &d));
    }

    #[test]
    fn test_signal_rules() {
        let a = SignalRule {
            id: None,
            enabled: true,
            signal: "site.probe".to_string(),
            group_operator: "any".to_string(),
            conditions: vec![single("path", "equals", "/wp-admin")],
            reason: "wordpress".to_string(),
        };
        let mut b = a.clone();
        b.reason = String::new();
        assert!(equal_signal_rules(&a, &b));

        b.signal = "site.other".to_string();
        assert!(!equal_signal_rules(&a, &b));
    }

    #[test]
    fn test_find_match() {
        let one = json!({"key1": 1, "key2": 2});
        let two = json!({"key1": 1, "key2": 5});
        let three = json!({"key1": 2, "key2": 3});
        let haystack = vec![one, two, three.clone()];
        let needle = json!({"key1": 2, "key2": 4, "key3": 3});

        assert_eq!(find_match(&needle, &haystack, &["key1"]), Some(&three));
        assert_eq!(find_match(&needle, &haystack, &["key2"]), None);
        assert_eq!(find_match(&needle, &haystack, &["key3"]), None);
    }
}
