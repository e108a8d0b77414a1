//! Reconcile a backup document onto existing sites.
//!
//! Every category is handled in two steps. A pure `plan_*` function compares
//! the source items with what the destination already has and produces one
//! [`Decision`] per item; an `apply_*` function then performs the API calls
//! for the decisions that need one. Deploying to a new site reuses the same
//! path with an empty destination.

use crate::backup::backup_site;
use crate::category::{Category, CategorySet};
use crate::compare::{equal_request_rules, equal_signal_rules, find_match};
use crate::document::{BackupDocument, CorpItems, Source, read_backup};
use crate::error::Result;
use log::{debug, info, warn};
use sigsci_platform::{
    AdvancedRule, CustomAlert, CustomSignal, EntriesDelta, Integration, RequestRule, RuleList,
    RuleListUpdate, Scope, SigSciClient, SignalRule, SiteMember, TemplatedRule,
    TemplatedRuleUpdate,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Longest rule list name the API accepts
const MAX_LIST_NAME_LEN: usize = 32;

/// What to do with one source item
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<A, U = A> {
    /// Destination already has an equivalent item
    Skip { label: String, reason: &'static str },
    /// Destination item `id` must change
    Update { id: String, label: String, change: U },
    /// Item is missing from the destination
    Add { label: String, item: A },
}

impl<A, U> Decision<A, U> {
    /// Human readable name of the item
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Decision::Skip { label, .. }
            | Decision::Update { label, .. }
            | Decision::Add { label, .. } => label,
        }
    }

    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip { .. })
    }

    fn announce(&self) {
        match self {
            Decision::Skip { label, reason } => println!("  Skipping {label} ({reason})"),
            Decision::Update { label, .. } => println!("  Updating {label}"),
            Decision::Add { label, .. } => println!("  Adding {label}"),
        }
    }
}

/// Outcome counts for one category on one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub skipped: usize,
    pub updated: usize,
    /// Items created; for advanced rules, items put in the support request
    pub added: usize,
    pub failed: usize,
}

impl MergeSummary {
    /// Number of successful changes
    #[must_use]
    pub fn changes(&self) -> usize {
        self.updated + self.added
    }

    pub fn absorb(&mut self, other: MergeSummary) {
        self.skipped += other.skipped;
        self.updated += other.updated;
        self.added += other.added;
        self.failed += other.failed;
    }

    fn record_added<T, E: fmt::Display>(&mut self, result: std::result::Result<T, E>) {
        match result {
            Ok(_) => self.added += 1,
            Err(e) => self.record_failure(e),
        }
    }

    fn record_updated<T, E: fmt::Display>(&mut self, result: std::result::Result<T, E>) {
        match result {
            Ok(_) => self.updated += 1,
            Err(e) => self.record_failure(e),
        }
    }

    fn record_failure(&mut self, error: impl fmt::Display) {
        println!("    Failed: {error}");
        self.failed += 1;
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} skipped, {} failed",
            self.added, self.updated, self.skipped, self.failed
        )
    }
}

/// Per-category results of one deploy or merge, in application order
pub type CategoryReport = Vec<(Category, MergeSummary)>;

/// Whether the destination existed before the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Freshly created site: nothing to compare against
    Deploy,
    /// Existing site: compare before changing anything
    Merge,
}

fn category_noun(category: Category) -> &'static str {
    match category {
        Category::RuleLists => "lists",
        Category::CustomSignals => "custom signals",
        Category::RequestRules => "request rules",
        Category::SignalRules => "signal rules",
        Category::TemplatedRules => "templated rules",
        Category::CustomAlerts => "custom alerts",
        Category::SiteMembers => "users",
        Category::Integrations => "integrations",
        Category::AdvancedRules => "advanced rules",
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Name for a list that collides with an existing list of another type:
/// the name is cut so that `-<type>` still fits the length limit.
#[must_use]
pub fn renamed_list_name(name: &str, kind: &str) -> String {
    let keep = (MAX_LIST_NAME_LEN - 1).saturating_sub(kind.len());
    let prefix: String = name.chars().take(keep).collect();
    format!("{prefix}-{kind}")
}

/// Rule lists match on (name, type); matched lists only ever gain entries.
#[must_use]
pub fn plan_rule_lists(
    source: &[RuleList],
    existing: &[RuleList],
) -> Vec<Decision<RuleList, RuleListUpdate>> {
    source
        .iter()
        .map(|item| {
            if let Some(found) = find_match(item, existing, &["name", "type"]) {
                let mut additions: Vec<String> = Vec::new();
                for entry in &item.entries {
                    if !found.entries.contains(entry) && !additions.contains(entry) {
                        additions.push(entry.clone());
                    }
                }
                return match (&found.id, additions.is_empty()) {
                    (_, true) => Decision::Skip {
                        label: item.name.clone(),
                        reason: "no differences",
                    },
                    (Some(id), false) => Decision::Update {
                        id: id.clone(),
                        label: item.name.clone(),
                        change: RuleListUpdate {
                            entries: EntriesDelta {
                                additions,
                                deletions: Vec::new(),
                            },
                        },
                    },
                    (None, false) => Decision::Skip {
                        label: item.name.clone(),
                        reason: "destination list has no id",
                    },
                };
            }

            if find_match(item, existing, &["name"]).is_some() {
                // Same name, different type: add a renamed copy unless an
                // earlier merge already did
                let renamed = RuleList {
                    name: renamed_list_name(&item.name, &item.kind),
                    ..item.without_id()
                };
                if existing.iter().any(|list| list.name == renamed.name) {
                    return Decision::Skip {
                        label: renamed.name,
                        reason: "renamed copy exists",
                    };
                }
                return Decision::Add {
                    label: renamed.name.clone(),
                    item: renamed,
                };
            }

            Decision::Add {
                label: item.name.clone(),
                item: item.without_id(),
            }
        })
        .collect()
}

/// Signals match on tag name.
#[must_use]
pub fn plan_custom_signals(
    source: &[CustomSignal],
    existing: &[CustomSignal],
) -> Vec<Decision<CustomSignal>> {
    source
        .iter()
        .map(|item| {
            if existing.iter().any(|signal| signal.tag_name == item.tag_name) {
                Decision::Skip {
                    label: item.short_name.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.short_name.clone(),
                    item: item.clone(),
                }
            }
        })
        .collect()
}

#[must_use]
pub fn plan_request_rules(
    source: &[RequestRule],
    existing: &[RequestRule],
) -> Vec<Decision<RequestRule>> {
    source
        .iter()
        .map(|item| {
            if existing.iter().any(|rule| equal_request_rules(rule, item)) {
                Decision::Skip {
                    label: item.reason.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.reason.clone(),
                    item: item.without_id(),
                }
            }
        })
        .collect()
}

#[must_use]
pub fn plan_signal_rules(
    source: &[SignalRule],
    existing: &[SignalRule],
) -> Vec<Decision<SignalRule>> {
    source
        .iter()
        .map(|item| {
            if existing.iter().any(|rule| equal_signal_rules(rule, item)) {
                Decision::Skip {
                    label: item.reason.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.reason.clone(),
                    item: item.without_id(),
                }
            }
        })
        .collect()
}

/// Templates already configured on the destination are left alone.
#[must_use]
pub fn plan_templated_rules(
    source: &BTreeMap<String, TemplatedRuleUpdate>,
    existing: &[TemplatedRule],
) -> Vec<Decision<TemplatedRuleUpdate>> {
    source
        .iter()
        .map(|(name, update)| {
            let configured = existing
                .iter()
                .any(|rule| rule.name == *name && rule.is_configured());
            if configured {
                Decision::Skip {
                    label: name.clone(),
                    reason: "configured",
                }
            } else {
                Decision::Add {
                    label: name.clone(),
                    item: update.clone(),
                }
            }
        })
        .collect()
}

/// Alerts match on (tag name, long name). A matched alert is only rewritten
/// when it is disabled on the destination and differs from the source;
/// alerts the service creates itself are never touched.
#[must_use]
pub fn plan_custom_alerts(
    source: &[CustomAlert],
    existing: &[CustomAlert],
) -> Vec<Decision<CustomAlert>> {
    source
        .iter()
        .filter(|item| !item.is_site_metric())
        .map(|item| {
            let found = existing
                .iter()
                .find(|alert| alert.tag_name == item.tag_name && alert.long_name == item.long_name);
            let Some(found) = found else {
                return Decision::Add {
                    label: item.long_name.clone(),
                    item: item.portable(),
                };
            };

            let differs = item.interval != found.interval
                || item.threshold != found.threshold
                || item.enabled != found.enabled
                || item.action != found.action;
            match (&found.id, !found.enabled && differs) {
                (Some(id), true) => Decision::Update {
                    id: id.clone(),
                    label: item.long_name.clone(),
                    change: item.portable(),
                },
                _ => Decision::Skip {
                    label: item.long_name.clone(),
                    reason: "exists",
                },
            }
        })
        .collect()
}

/// Members match on email; existing members keep their role.
#[must_use]
pub fn plan_site_members(
    source: &[SiteMember],
    existing: &[SiteMember],
) -> Vec<Decision<SiteMember>> {
    source
        .iter()
        .map(|item| {
            let email = item.user.email.clone();
            if existing.iter().any(|member| member.user.email == email) {
                Decision::Skip {
                    label: email,
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: email,
                    item: item.clone(),
                }
            }
        })
        .collect()
}

/// Integrations match on (url, type); a match with other events is updated.
#[must_use]
pub fn plan_integrations(
    source: &[Integration],
    existing: &[Integration],
) -> Vec<Decision<Integration>> {
    source
        .iter()
        .map(|item| {
            let found = existing
                .iter()
                .find(|integration| integration.url == item.url && integration.kind == item.kind);
            match found {
                None => Decision::Add {
                    label: item.name.clone(),
                    item: item.without_id(),
                },
                Some(found) if found.same_events(item) => Decision::Skip {
                    label: item.name.clone(),
                    reason: "exists",
                },
                Some(found) => match &found.id {
                    Some(id) => Decision::Update {
                        id: id.clone(),
                        label: item.name.clone(),
                        change: item.without_id(),
                    },
                    None => Decision::Skip {
                        label: item.name.clone(),
                        reason: "destination integration has no id",
                    },
                },
            }
        })
        .collect()
}

/// Advanced rules cannot be created through the API; missing ones end up
/// in a support request.
#[must_use]
pub fn plan_advanced_rules(
    source: &[AdvancedRule],
    existing: &[AdvancedRule],
) -> Vec<Decision<AdvancedRule>> {
    source
        .iter()
        .map(|item| {
            if existing.iter().any(|rule| rule.short_name == item.short_name) {
                Decision::Skip {
                    label: item.short_name.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.short_name.clone(),
                    item: item.summary(),
                }
            }
        })
        .collect()
}

/// Corp lists match on name (corp list ids are derived from it).
#[must_use]
pub fn plan_corp_lists(
    wanted: &[RuleList],
    existing: &[RuleList],
) -> Vec<Decision<RuleList, RuleListUpdate>> {
    wanted
        .iter()
        .map(|item| {
            if existing.iter().any(|list| list.name == item.name) {
                Decision::Skip {
                    label: item.name.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.name.clone(),
                    item: item.without_id(),
                }
            }
        })
        .collect()
}

/// Corp signals match on tag name or short name.
#[must_use]
pub fn plan_corp_signals(
    wanted: &[CustomSignal],
    existing: &[CustomSignal],
) -> Vec<Decision<CustomSignal>> {
    wanted
        .iter()
        .map(|item| {
            let present = existing.iter().any(|signal| {
                signal.tag_name == item.tag_name || signal.short_name == item.short_name
            });
            if present {
                Decision::Skip {
                    label: item.short_name.clone(),
                    reason: "exists",
                }
            } else {
                Decision::Add {
                    label: item.short_name.clone(),
                    item: item.clone(),
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub async fn apply_rule_lists(
    client: &SigSciClient,
    scope: Scope<'_>,
    decisions: &[Decision<RuleList, RuleListUpdate>],
) -> MergeSummary {
    let api = client.lists_api(scope);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Skip { .. } => summary.skipped += 1,
            Decision::Update { id, change, .. } => {
                summary.record_updated(api.update_entries(id, change).await);
            }
            Decision::Add { item, .. } => summary.record_added(api.create(item).await),
        }
    }
    summary
}

pub async fn apply_custom_signals(
    client: &SigSciClient,
    scope: Scope<'_>,
    decisions: &[Decision<CustomSignal>],
) -> MergeSummary {
    let api = client.signals_api(scope);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Skip { .. } => summary.skipped += 1,
            // Signals are never updated
            Decision::Update { .. } => summary.skipped += 1,
            Decision::Add { item, .. } => summary.record_added(api.create(item).await),
        }
    }
    summary
}

pub async fn apply_request_rules(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<RequestRule>],
) -> MergeSummary {
    let api = client.rules_api(site);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Add { item, .. } => summary.record_added(api.create_request_rule(item).await),
            _ => summary.skipped += 1,
        }
    }
    summary
}

pub async fn apply_signal_rules(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<SignalRule>],
) -> MergeSummary {
    let api = client.rules_api(site);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Add { item, .. } => summary.record_added(api.create_signal_rule(item).await),
            _ => summary.skipped += 1,
        }
    }
    summary
}

pub async fn apply_templated_rules(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<TemplatedRuleUpdate>],
) -> MergeSummary {
    let api = client.templates_api(site);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Add { label, item } => summary.record_added(api.apply(label, item).await),
            _ => summary.skipped += 1,
        }
    }
    summary
}

pub async fn apply_custom_alerts(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<CustomAlert>],
) -> MergeSummary {
    let api = client.alerts_api(site);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Skip { .. } => summary.skipped += 1,
            Decision::Update { id, change, .. } => {
                summary.record_updated(api.update(id, change).await);
            }
            Decision::Add { item, .. } => summary.record_added(api.create(item).await),
        }
    }
    summary
}

pub async fn apply_site_members(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<SiteMember>],
) -> MergeSummary {
    let api = client.users_api();
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Add { item, .. } => summary.record_added(
                api.update_site_member(site, &item.user.email, &item.role)
                    .await,
            ),
            _ => summary.skipped += 1,
        }
    }
    summary
}

pub async fn apply_integrations(
    client: &SigSciClient,
    site: &str,
    decisions: &[Decision<Integration>],
) -> MergeSummary {
    let api = client.integrations_api(site);
    let mut summary = MergeSummary::default();
    for decision in decisions {
        decision.announce();
        match decision {
            Decision::Skip { .. } => summary.skipped += 1,
            Decision::Update { id, change, .. } => {
                summary.record_updated(api.update(id, change).await);
            }
            Decision::Add { item, .. } => summary.record_added(api.create(item).await),
        }
    }
    summary
}

/// Print the support request for advanced rules the destination lacks.
pub fn request_advanced_rules(
    source: &Source,
    destination_corp: &str,
    destination_site: &str,
    decisions: &[Decision<AdvancedRule>],
) -> MergeSummary {
    let mut summary = MergeSummary::default();
    let mut missing = Vec::new();
    for decision in decisions {
        match decision {
            Decision::Add { item, .. } => missing.push(item),
            _ => {
                decision.announce();
                summary.skipped += 1;
            }
        }
    }

    if !missing.is_empty() {
        println!("\nEmail support@signalsciences.com with the following...\n");
        println!(
            "Please copy the following advanced rules from {}/{} to {destination_corp}/{destination_site}:",
            source.corp, source.site
        );
        for rule in &missing {
            println!("    {} (ID {})", rule.short_name, rule.id);
        }
        summary.added += missing.len();
    }
    summary
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Create the corp lists and signals a migrated document depends on, unless
/// the corp already has them.
///
/// # Errors
///
/// Fails if the corp's current lists or signals cannot be read.
pub async fn reattach_corp_items(client: &SigSciClient, items: &CorpItems) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    if items.is_empty() {
        return Ok(summary);
    }

    println!("Re-attaching corp items...");
    if !items.rule_list.is_empty() {
        let existing = client.lists_api(Scope::Corp).list().await?;
        let decisions = plan_corp_lists(&items.rule_list, &existing);
        summary.absorb(apply_rule_lists(client, Scope::Corp, &decisions).await);
    }
    if !items.signal.is_empty() {
        let existing = client.signals_api(Scope::Corp).list().await?;
        let decisions = plan_corp_signals(&items.signal, &existing);
        summary.absorb(apply_custom_signals(client, Scope::Corp, &decisions).await);
    }
    Ok(summary)
}

/// Reconcile one category of `document` onto `site`.
///
/// # Errors
///
/// Fails if the destination's current items cannot be read; failures of
/// individual changes are counted in the summary instead.
pub async fn reconcile_category(
    client: &SigSciClient,
    site: &str,
    document: &BackupDocument,
    category: Category,
    mode: Mode,
) -> Result<MergeSummary> {
    let fresh = mode == Mode::Deploy;
    let verb = if fresh { "Deploying" } else { "Merging" };
    println!("{verb} {}...", category_noun(category));

    let summary = match category {
        Category::RuleLists => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.lists_api(Scope::Site(site)).list().await?
            };
            let decisions = plan_rule_lists(&document.rule_lists, &existing);
            apply_rule_lists(client, Scope::Site(site), &decisions).await
        }
        Category::CustomSignals => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.signals_api(Scope::Site(site)).list().await?
            };
            let decisions = plan_custom_signals(&document.custom_signals, &existing);
            apply_custom_signals(client, Scope::Site(site), &decisions).await
        }
        Category::RequestRules => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.rules_api(site).list_request_rules().await?
            };
            let decisions = plan_request_rules(&document.request_rules, &existing);
            apply_request_rules(client, site, &decisions).await
        }
        Category::SignalRules => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.rules_api(site).list_signal_rules().await?
            };
            let decisions = plan_signal_rules(&document.signal_rules, &existing);
            apply_signal_rules(client, site, &decisions).await
        }
        Category::TemplatedRules => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.templates_api(site).list().await?
            };
            let decisions = plan_templated_rules(&document.templated_rules, &existing);
            apply_templated_rules(client, site, &decisions).await
        }
        Category::CustomAlerts => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.alerts_api(site).list().await?
            };
            let decisions = plan_custom_alerts(&document.custom_alerts, &existing);
            apply_custom_alerts(client, site, &decisions).await
        }
        Category::SiteMembers => {
            let (source, existing): (Vec<SiteMember>, Vec<SiteMember>) = if fresh {
                // Owners are added to every new site automatically
                let members = document
                    .site_members
                    .iter()
                    .filter(|member| member.role != "owner")
                    .cloned()
                    .collect();
                (members, Vec::new())
            } else {
                let existing = client.users_api().list_site_members(site).await?;
                (document.site_members.clone(), existing)
            };
            let decisions = plan_site_members(&source, &existing);
            apply_site_members(client, site, &decisions).await
        }
        Category::Integrations => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.integrations_api(site).list().await?
            };
            let decisions = plan_integrations(&document.integrations, &existing);
            apply_integrations(client, site, &decisions).await
        }
        Category::AdvancedRules => {
            let existing = if fresh {
                Vec::new()
            } else {
                client.advanced_rules_api(site).list().await?
            };
            let decisions = plan_advanced_rules(&document.advanced_rules, &existing);
            request_advanced_rules(&document.source, client.corp(), site, &decisions)
        }
    };

    debug!("{category} on {site}: {summary}");
    Ok(summary)
}

/// Apply the selected categories in fixed order.
///
/// # Errors
///
/// See [`reconcile_category`].
pub async fn reconcile_categories(
    client: &SigSciClient,
    site: &str,
    document: &BackupDocument,
    categories: &CategorySet,
    mode: Mode,
) -> Result<CategoryReport> {
    let mut report = CategoryReport::new();
    for category in Category::ALL {
        if categories.contains(&category) {
            let summary = reconcile_category(client, site, document, category, mode).await?;
            report.push((category, summary));
        } else {
            println!("Skipping {category} (excluded)");
        }
    }
    Ok(report)
}

/// Merge `document` onto the existing site `site`.
///
/// Returns `None` when the site does not exist.
///
/// # Errors
///
/// Fails if the site lookup fails for any reason other than "not found",
/// or if a category's current state cannot be read.
pub async fn merge_document(
    client: &SigSciClient,
    site: &str,
    document: &BackupDocument,
    categories: &CategorySet,
) -> Result<Option<CategoryReport>> {
    if !client.sites_api().site_exists(site).await? {
        println!("Site '{site}' does not exist");
        return Ok(None);
    }

    if let Some(corp_items) = &document.corp_items {
        reattach_corp_items(client, corp_items).await?;
    }

    let report = reconcile_categories(client, site, document, categories, Mode::Merge).await?;
    Ok(Some(report))
}

/// Where merged configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSource {
    /// A live site in the same corp, backed up once per run
    Site(String),
    /// A backup file
    File(PathBuf),
}

/// Whether a destination argument is a wildcard pattern
#[must_use]
pub fn is_pattern(destination: &str) -> bool {
    destination.contains(['*', '?', '['])
}

/// Expand destination arguments against the corp's sites.
///
/// Exact names pass through unchanged (existence is checked when merging);
/// patterns expand to every matching site. The source site is never a
/// destination, and every site appears once.
///
/// # Errors
///
/// `ManagerError::Pattern` for a malformed pattern.
pub fn select_destinations(
    destinations: &[String],
    corp_sites: &[String],
    source_site: Option<&str>,
) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();
    for destination in destinations {
        let candidates: Vec<String> = if is_pattern(destination) {
            let pattern = glob::Pattern::new(destination)?;
            let matched: Vec<String> = corp_sites
                .iter()
                .filter(|site| pattern.matches(site))
                .cloned()
                .collect();
            if matched.is_empty() {
                warn!("No site matches '{destination}'");
            }
            matched
        } else {
            vec![destination.clone()]
        };

        for candidate in candidates {
            if Some(candidate.as_str()) == source_site {
                info!("Not merging site '{candidate}' onto itself");
                continue;
            }
            if !selected.contains(&candidate) {
                selected.push(candidate);
            }
        }
    }
    Ok(selected)
}

/// Merge a site or backup file onto every selected destination.
///
/// # Errors
///
/// Fails if the source cannot be loaded, the destination list cannot be
/// resolved, or a destination cannot be read.
pub async fn merge(
    client: &SigSciClient,
    source: &MergeSource,
    destinations: &[String],
    categories: &CategorySet,
) -> Result<Vec<(String, CategoryReport)>> {
    let (document, source_site) = match source {
        MergeSource::Site(site) => (backup_site(client, site).await?, Some(site.as_str())),
        MergeSource::File(path) => (read_backup(path)?, None),
    };

    let corp_sites: Vec<String> = if destinations.iter().any(|d| is_pattern(d)) {
        client
            .sites_api()
            .list_sites()
            .await?
            .into_iter()
            .map(|site| site.name)
            .collect()
    } else {
        Vec::new()
    };
    let targets = select_destinations(destinations, &corp_sites, source_site)?;

    let mut results = Vec::new();
    for target in targets {
        match source {
            MergeSource::Site(site) => {
                println!("{}", "=".repeat(80));
                println!("Merging site '{site}' onto site '{target}'...");
            }
            MergeSource::File(path) => {
                println!("Merging file '{}' onto site '{target}'...", path.display());
            }
        }
        if let Some(report) = merge_document(client, &target, &document, categories).await? {
            results.push((target, report));
        }
    }
    Ok(results)
}
