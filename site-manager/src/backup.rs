//! Snapshot a site's configuration into a [`BackupDocument`].
use crate::document::{BackupDocument, write_backup};
use crate::error::Result;
use log::{debug, info};
use sigsci_platform::{Scope, SigSciClient, SiteSettings};
use std::collections::BTreeMap;
use std::path::Path;

/// Read every category of `site` and keep only the fields the create
/// endpoints accept.
///
/// # Errors
///
/// Any API failure; a backup is all or nothing.
pub async fn backup_site(client: &SigSciClient, site: &str) -> Result<BackupDocument> {
    let mut document = BackupDocument::new(client.corp(), site);

    let details = client.sites_api().get_site(site).await?;
    document.site = Some(SiteSettings::from(&details));

    document.rule_lists = client
        .lists_api(Scope::Site(site))
        .list()
        .await?
        .iter()
        .map(|list| list.without_id())
        .collect();

    let rules = client.rules_api(site);
    document.request_rules = rules
        .list_request_rules()
        .await?
        .iter()
        .map(|rule| rule.without_id())
        .collect();
    document.custom_signals = client.signals_api(Scope::Site(site)).list().await?;
    document.signal_rules = rules
        .list_signal_rules()
        .await?
        .iter()
        .map(|rule| rule.without_id())
        .collect();

    let mut templated_rules = BTreeMap::new();
    for template in client.templates_api(site).list().await? {
        if template.detections.is_empty() {
            debug!("Template {} has no detections, not saved", template.name);
            continue;
        }
        templated_rules.insert(template.name.clone(), template.to_update());
    }
    document.templated_rules = templated_rules;

    document.custom_alerts = client
        .alerts_api(site)
        .list()
        .await?
        .iter()
        .map(|alert| alert.portable())
        .collect();
    document.site_members = client.users_api().list_site_members(site).await?;
    document.advanced_rules = client
        .advanced_rules_api(site)
        .list()
        .await?
        .iter()
        .map(|rule| rule.summary())
        .collect();
    document.integrations = client
        .integrations_api(site)
        .list()
        .await?
        .iter()
        .map(|integration| integration.without_id())
        .collect();

    info!(
        "Backed up {}: {} lists, {} request rules, {} signal rules, {} alerts",
        site,
        document.rule_lists.len(),
        document.request_rules.len(),
        document.signal_rules.len(),
        document.custom_alerts.len()
    );
    Ok(document)
}

/// Back up `site` and write the document to `path`.
///
/// # Errors
///
/// Any API or file failure.
pub async fn backup_to_file(client: &SigSciClient, site: &str, path: &Path) -> Result<()> {
    println!(
        "Backing up site '{}' to file '{}'...",
        site,
        path.display()
    );
    let document = backup_site(client, site).await?;
    write_backup(path, &document)
}
