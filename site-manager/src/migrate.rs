//! Rewrite a backup so it can be deployed in another corp.
//!
//! Items that reference corp lists or corp signals are either dropped
//! (`strip`) or kept, in which case the referenced corp objects are copied
//! into the document's `corp_items` so deploy can recreate them.

use crate::dependencies::{
    AdvancedRuleScanner, Dependencies, DependencyKind, alert_dependency, rule_dependencies,
};
use crate::document::{BackupDocument, CorpItems, read_backup, write_backup};
use crate::error::{ManagerError, Result};
use log::{debug, info};
use serde::Serialize;
use sigsci_platform::{CustomSignal, RuleList, Scope, SigSciClient};
use std::path::{Path, PathBuf};

/// Inputs of one migration
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub input: PathBuf,
    /// Defaults to [`default_output_path`]
    pub output: Option<PathBuf>,
    pub destination_corp: String,
    /// Drop items with corp dependencies instead of carrying them
    pub strip: bool,
    /// Keep site members (they are dropped by default)
    pub keep_users: bool,
}

/// Result of the offline part of a migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub document: BackupDocument,
    /// Corp objects the kept items refer to
    pub dependencies: Dependencies,
    /// Number of items dropped for having corp dependencies
    pub stripped: usize,
}

/// `migrated_<file name>` next to the input
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup.json".to_string());
    input.with_file_name(format!("migrated_{file_name}"))
}

fn value_dependencies<T: Serialize>(item: &T) -> Result<Dependencies> {
    Ok(rule_dependencies(&serde_json::to_value(item)?))
}

/// Keep or drop `items` by their dependencies, collecting the dependencies
/// of what is kept.
fn filter_items<T, F>(
    items: &[T],
    strip: bool,
    dependencies_of: F,
    collected: &mut Dependencies,
    stripped: &mut usize,
) -> Result<Vec<T>>
where
    T: Clone,
    F: Fn(&T) -> Result<Dependencies>,
{
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let dependencies = dependencies_of(item)?;
        if dependencies.is_empty() {
            kept.push(item.clone());
        } else if strip {
            debug!("Stripping item depending on {dependencies:?}");
            *stripped += 1;
        } else {
            collected.extend(dependencies);
            kept.push(item.clone());
        }
    }
    Ok(kept)
}

/// Rewrite `source` for `destination_corp`.
///
/// # Errors
///
/// `ManagerError::CorpMismatch` when carrying dependencies (no `strip`)
/// from a corp other than the one the client is logged into, since the
/// corp objects could not be looked up.
pub fn plan_migration(
    source: &BackupDocument,
    authenticated_corp: &str,
    destination_corp: &str,
    strip: bool,
    keep_users: bool,
) -> Result<Migration> {
    if !strip && source.source.corp != authenticated_corp {
        return Err(ManagerError::CorpMismatch(
            "CORP must be the same as backup file, otherwise use --strip.".to_string(),
        ));
    }

    let scanner = AdvancedRuleScanner::new()?;
    let mut document = source.clone();
    let mut dependencies = Dependencies::default();
    let mut stripped = 0;

    document.source.corp = destination_corp.to_string();
    document.corp_items = None;
    if !keep_users {
        document.site_members.clear();
    }

    document.custom_alerts = filter_items(
        &source.custom_alerts,
        strip,
        |alert| {
            let mut found = Dependencies::default();
            if let Some(signal) = alert_dependency(alert) {
                found.insert(DependencyKind::Signal, signal);
            }
            Ok(found)
        },
        &mut dependencies,
        &mut stripped,
    )?;
    document.request_rules = filter_items(
        &source.request_rules,
        strip,
        value_dependencies,
        &mut dependencies,
        &mut stripped,
    )?;
    document.signal_rules = filter_items(
        &source.signal_rules,
        strip,
        value_dependencies,
        &mut dependencies,
        &mut stripped,
    )?;
    document.site_rules = filter_items(
        &source.site_rules,
        strip,
        |rule| Ok(rule_dependencies(rule)),
        &mut dependencies,
        &mut stripped,
    )?;
    document.advanced_rules = filter_items(
        &source.advanced_rules,
        strip,
        |rule| Ok(scanner.dependencies(&serde_json::to_value(rule)?)),
        &mut dependencies,
        &mut stripped,
    )?;

    Ok(Migration {
        document,
        dependencies,
        stripped,
    })
}

/// Look dependencies up among the corp's lists (by id) and signals (by tag
/// name). Returns the found objects and the dependencies that no longer
/// exist.
#[must_use]
pub fn resolve_corp_items(
    dependencies: &Dependencies,
    corp_lists: &[RuleList],
    corp_signals: &[CustomSignal],
) -> (CorpItems, Vec<(DependencyKind, String)>) {
    let mut items = CorpItems::default();
    let mut broken = Vec::new();

    for (kind, name) in dependencies.iter() {
        match kind {
            DependencyKind::RuleList => {
                match corp_lists.iter().find(|list| list.id.as_deref() == Some(name)) {
                    Some(list) => items.rule_list.push(list.clone()),
                    None => broken.push((kind, name.to_string())),
                }
            }
            DependencyKind::Signal => {
                match corp_signals.iter().find(|signal| signal.tag_name == name) {
                    Some(signal) => items.signal.push(signal.clone()),
                    None => broken.push((kind, name.to_string())),
                }
            }
        }
    }
    (items, broken)
}

/// Migrate a backup file and write the result. Returns the output path.
///
/// # Errors
///
/// Unreadable input, a corp mismatch (see [`plan_migration`]), failure to
/// read the corp's lists or signals, or an unwritable output file.
pub async fn migrate(client: &SigSciClient, options: &MigrateOptions) -> Result<PathBuf> {
    let source = read_backup(&options.input)?;

    let mut message = format!(
        "Migrating '{}' from corp={} to corp={}.",
        options.input.display(),
        client.corp(),
        options.destination_corp
    );
    if options.strip {
        message.push_str(" Stripping all items with corp-level dependencies.");
    }
    if options.keep_users {
        message.push_str(" Preserving users.");
    }
    println!("{message}");

    let Migration {
        mut document,
        dependencies,
        stripped,
    } = plan_migration(
        &source,
        client.corp(),
        &options.destination_corp,
        options.strip,
        options.keep_users,
    )?;
    if stripped > 0 {
        info!("Stripped {stripped} items with corp-level dependencies");
    }

    if !dependencies.is_empty() {
        let corp_lists = client.lists_api(Scope::Corp).list().await?;
        let corp_signals = client.signals_api(Scope::Corp).list().await?;
        let (items, broken) = resolve_corp_items(&dependencies, &corp_lists, &corp_signals);
        for (kind, name) in broken {
            println!("Existing broken dependency: {kind} > {name}");
        }
        if !items.is_empty() {
            document.corp_items = Some(items);
        }
    }

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&options.input));
    write_backup(&output, &document)?;
    info!("Wrote migrated backup to {}", output.display());
    Ok(output)
}
