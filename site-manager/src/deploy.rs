//! Create a new site from a backup document, or from another live site.
use crate::backup::backup_site;
use crate::category::CategorySet;
use crate::document::{BackupDocument, read_backup};
use crate::error::Result;
use crate::merge::{CategoryReport, Mode, reattach_corp_items, reconcile_categories};
use log::info;
use sigsci_platform::{CreateSiteRequest, SigSciClient, SiteSettings};
use std::path::Path;

/// Settings for a document that carries none
fn default_settings() -> SiteSettings {
    SiteSettings {
        agent_level: "log".to_string(),
        block_duration_seconds: 86_400,
        block_http_code: 406,
    }
}

/// Build the create request for `site` from a backup document.
#[must_use]
pub fn create_request(
    site: &str,
    display_name: Option<&str>,
    document: &BackupDocument,
) -> CreateSiteRequest {
    CreateSiteRequest {
        name: site.to_string(),
        display_name: display_name.unwrap_or(site).to_string(),
        settings: document.site.clone().unwrap_or_else(default_settings),
    }
}

/// Create `site` and fill it with the selected categories of `document`.
///
/// Returns `None` without changing anything when the site already exists.
///
/// # Errors
///
/// Fails if the existence check or site creation fails, or if corp items
/// cannot be read. Failures of individual items are counted, not raised.
pub async fn deploy_document(
    client: &SigSciClient,
    site: &str,
    display_name: Option<&str>,
    document: &BackupDocument,
    categories: &CategorySet,
) -> Result<Option<CategoryReport>> {
    if client.sites_api().site_exists(site).await? {
        println!("Site '{site}' already exists");
        return Ok(None);
    }

    let request = create_request(site, display_name, document);
    println!("Creating site '{}' ({})...", request.name, request.display_name);
    client.sites_api().create_site(&request).await?;

    if let Some(corp_items) = &document.corp_items {
        reattach_corp_items(client, corp_items).await?;
    }

    let report = reconcile_categories(client, site, document, categories, Mode::Deploy).await?;
    info!("Deployed site '{site}'");
    Ok(Some(report))
}

/// Deploy a backup file as the new site `site`.
///
/// # Errors
///
/// See [`deploy_document`]; also fails on an unreadable backup file.
pub async fn deploy_from_file(
    client: &SigSciClient,
    site: &str,
    display_name: Option<&str>,
    path: &Path,
    categories: &CategorySet,
) -> Result<Option<CategoryReport>> {
    let document = read_backup(path)?;
    println!(
        "Deploying file '{}' to new site '{site}'...",
        path.display()
    );
    deploy_document(client, site, display_name, &document, categories).await
}

/// Copy the live site `source` to the new site `destination`.
///
/// # Errors
///
/// See [`deploy_document`]; also fails when the source cannot be backed up.
pub async fn clone_site(
    client: &SigSciClient,
    source: &str,
    destination: &str,
    display_name: Option<&str>,
    categories: &CategorySet,
) -> Result<Option<CategoryReport>> {
    println!("Cloning site '{source}' to '{destination}'...");
    let document = backup_site(client, source).await?;
    deploy_document(client, destination, display_name, &document, categories).await
}
