//! Configuration categories a deploy or merge can be restricted to
use crate::error::{ManagerError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One kind of site configuration object.
///
/// Variants are declared in the order deploy and merge apply them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    RuleLists,
    CustomSignals,
    RequestRules,
    SignalRules,
    TemplatedRules,
    CustomAlerts,
    SiteMembers,
    Integrations,
    AdvancedRules,
}

impl Category {
    /// Every category, in application order
    pub const ALL: [Category; 9] = [
        Category::RuleLists,
        Category::CustomSignals,
        Category::RequestRules,
        Category::SignalRules,
        Category::TemplatedRules,
        Category::CustomAlerts,
        Category::SiteMembers,
        Category::Integrations,
        Category::AdvancedRules,
    ];

    /// Name used on the command line and as the backup document key
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleLists => "rule_lists",
            Self::CustomSignals => "custom_signals",
            Self::RequestRules => "request_rules",
            Self::SignalRules => "signal_rules",
            Self::TemplatedRules => "templated_rules",
            Self::CustomAlerts => "custom_alerts",
            Self::SiteMembers => "site_members",
            Self::Integrations => "integrations",
            Self::AdvancedRules => "advanced_rules",
        }
    }

    /// List all valid values for help text
    #[must_use]
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "Invalid category '{s}'. Valid values: {}",
                    Self::valid_values()
                )
            })
    }
}

/// Categories selected for one run
pub type CategorySet = BTreeSet<Category>;

/// Resolve `--include` / `--exclude` into the set of categories to apply.
///
/// No selection means every category.
///
/// # Errors
///
/// `ManagerError::InvalidArguments` when both lists are given.
pub fn build_category_list(include: &[Category], exclude: &[Category]) -> Result<CategorySet> {
    if !include.is_empty() && !exclude.is_empty() {
        return Err(ManagerError::InvalidArguments(
            "include and exclude are mutually exclusive".to_string(),
        ));
    }

    if !include.is_empty() {
        return Ok(include.iter().copied().collect());
    }

    Ok(Category::ALL
        .iter()
        .copied()
        .filter(|category| !exclude.contains(category))
        .collect())
}
