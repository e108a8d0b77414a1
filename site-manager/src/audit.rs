//! Compliance audit of a site's custom alerts against a baseline.
//!
//! A baseline maps alert tag names to the sections of a compliance
//! document they cover. It is derived from a reference site whose alerts
//! carry section numbers in their long names, e.g. `(1.2) SQLi burst`
//! covers section `1.2`, or read from a JSON file of the same shape.

use crate::error::{ManagerError, Result};
use log::{debug, info};
use regex::Regex;
use sigsci_platform::{CustomAlert, SigSciClient};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Baseline file used when neither a baseline site nor a file is given
pub const DEFAULT_BASELINE_FILE: &str = "audit_baseline.json";

/// Report bucket for audited alerts the baseline does not know
pub const OTHER_SECTION: &str = "OTHER";

/// Alert type of user-defined alerts
const SITE_ALERT: &str = "siteAlert";

/// Tag name to the sections it covers
pub type AuditReference = BTreeMap<String, BTreeSet<String>>;

/// Section to the `(tag name, long name)` of every alert covering it
pub type ComplianceReport = BTreeMap<String, Vec<(String, String)>>;

/// Pulls `(x)`, `(x.y)`, `(x.y.z)` and `(x.*)` section markers out of text.
pub struct SectionExtractor {
    marker: Regex,
}

impl SectionExtractor {
    /// # Errors
    ///
    /// Fails only if the marker pattern does not compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            marker: Regex::new(r"\(((\d+\.)?(\d+\.)?(\*|\d+))\)")?,
        })
    }

    #[must_use]
    pub fn sections(&self, text: &str) -> Vec<String> {
        self.marker
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .map(|section| section.as_str().to_string())
            .collect()
    }
}

/// User-defined alerts, optionally only the enabled ones
#[must_use]
pub fn site_alerts(alerts: Vec<CustomAlert>, active_only: bool) -> Vec<CustomAlert> {
    alerts
        .into_iter()
        .filter(|alert| alert.kind.as_deref() == Some(SITE_ALERT))
        .filter(|alert| alert.enabled || !active_only)
        .collect()
}

/// Baseline from alerts whose long names carry section markers.
#[must_use]
pub fn build_audit_reference(alerts: &[CustomAlert], extractor: &SectionExtractor) -> AuditReference {
    let mut reference = AuditReference::new();
    for alert in alerts {
        for section in extractor.sections(&alert.long_name) {
            reference
                .entry(alert.tag_name.clone())
                .or_default()
                .insert(section);
        }
    }
    reference
}

/// File a site's alerts under the baseline sections they cover.
///
/// Every baseline section appears in the report, empty or not.
#[must_use]
pub fn compliance_report(baseline: &AuditReference, alerts: &[CustomAlert]) -> ComplianceReport {
    let mut report = ComplianceReport::new();
    report.insert(OTHER_SECTION.to_string(), Vec::new());
    for section in baseline.values().flatten() {
        report.entry(section.clone()).or_default();
    }

    for alert in alerts {
        let entry = (alert.tag_name.clone(), alert.long_name.clone());
        match baseline.get(&alert.tag_name) {
            Some(sections) => {
                for section in sections {
                    report.entry(section.clone()).or_default().push(entry.clone());
                }
            }
            None => report
                .entry(OTHER_SECTION.to_string())
                .or_default()
                .push(entry),
        }
    }
    report
}

/// Read a baseline file.
///
/// # Errors
///
/// `ManagerError::Baseline` when the file is missing or malformed.
pub fn load_baseline(path: &Path) -> Result<AuditReference> {
    if !path.is_file() {
        return Err(ManagerError::Baseline(format!(
            "A baseline is required. '{}' not found.",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ManagerError::Baseline(format!("{}: {e}", path.display())))
}

/// # Errors
///
/// I/O or serialization failures.
pub fn save_baseline(path: &Path, reference: &AuditReference) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(reference)?)?;
    info!("Saved audit baseline to {}", path.display());
    Ok(())
}

/// Options of one audit
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub site: String,
    /// Derive the baseline from this site instead of a file
    pub baseline_site: Option<String>,
    pub baseline_file: PathBuf,
    /// Write the baseline in use to this file
    pub save_baseline: Option<PathBuf>,
    pub active_only: bool,
}

fn print_report(site: &str, report: &ComplianceReport) {
    println!("Audit of site '{site}':");
    for (section, alerts) in report {
        println!("{section}:");
        if alerts.is_empty() {
            println!("  (no alerts)");
        }
        for (tag_name, long_name) in alerts {
            println!("  {tag_name:<30} {long_name}");
        }
    }
}

/// Audit a site and print the per-section report.
///
/// # Errors
///
/// A missing baseline, or API failures while reading alerts.
pub async fn audit(client: &SigSciClient, options: &AuditOptions) -> Result<ComplianceReport> {
    let baseline = match &options.baseline_site {
        Some(baseline_site) => {
            let extractor = SectionExtractor::new()?;
            let alerts = site_alerts(client.alerts_api(baseline_site).list().await?, false);
            debug!("Baseline site {baseline_site} has {} site alerts", alerts.len());
            build_audit_reference(&alerts, &extractor)
        }
        None => load_baseline(&options.baseline_file)?,
    };
    if let Some(path) = &options.save_baseline {
        save_baseline(path, &baseline)?;
    }

    let alerts = site_alerts(
        client.alerts_api(&options.site).list().await?,
        options.active_only,
    );
    let report = compliance_report(&baseline, &alerts);
    print_report(&options.site, &report);
    Ok(report)
}
