//! Integration tests for migrating a backup file to another corp
//!
//! These tests validate that:
//! - Kept items carry the corp lists and signals they refer to
//! - Stripping drops dependent items without reading the corp
//! - The output lands next to the input unless a path is given

use httpmock::prelude::*;
use serde_json::json;
use sigsci_platform::{Credentials, SigSciClient, SigSciConfig};
use sigsci_site_manager::BackupDocument;
use sigsci_site_manager::document::{read_backup, write_backup};
use sigsci_site_manager::migrate::{MigrateOptions, migrate};
use std::path::Path;
use tempfile::TempDir;

fn test_client(server: &MockServer) -> SigSciClient {
    let config = SigSciConfig::new(
        "admin@example.com".to_string(),
        Credentials::api_token("token".to_string()),
        "testcorp".to_string(),
    )
    .with_base_url(server.url("/api/v0"));
    SigSciClient::new(config).unwrap()
}

fn source_document(corp: &str) -> BackupDocument {
    serde_json::from_value(json!({
        "source": {"corp": corp, "site": "www"},
        "request_rules": [
            {
                "enabled": true, "groupOperator": "all",
                "conditions": [{"type": "single", "field": "ip", "operator": "inList", "value": "corp.bad-ips"}],
                "action": "block", "reason": "corp list"
            },
            {
                "enabled": true, "groupOperator": "all",
                "conditions": [{"type": "single", "field": "path", "operator": "equals", "value": "/admin"}],
                "action": "block", "reason": "admin"
            }
        ],
        "custom_alerts": [
            {"tagName": "corp.scanner", "longName": "scanners", "interval": 10,
             "threshold": 5, "enabled": true, "action": "flagged"},
            {"tagName": "corp.gone", "longName": "deleted signal", "interval": 10,
             "threshold": 5, "enabled": true, "action": "flagged"},
            {"tagName": "SQLI", "longName": "SQLi", "interval": 1,
             "threshold": 10, "enabled": true, "action": "flagged"}
        ],
        "site_members": [{"user": {"email": "jane@example.com"}, "role": "admin"}]
    }))
    .unwrap()
}

fn write_source(dir: &Path, corp: &str) -> std::path::PathBuf {
    let path = dir.join("www.json");
    write_backup(&path, &source_document(corp)).unwrap();
    path
}

#[tokio::test]
async fn test_migrate_carries_corp_items_to_default_path() {
    let server = MockServer::start_async().await;
    let lists = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v0/corps/testcorp/lists");
            then.status(200).json_body(json!({"data": [
                {"id": "corp.bad-ips", "name": "bad-ips", "type": "ip",
                 "description": "", "entries": ["1.2.3.4"]},
                {"id": "corp.unused", "name": "unused", "type": "ip",
                 "description": "", "entries": []}
            ]}));
        })
        .await;
    let tags = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v0/corps/testcorp/tags");
            then.status(200).json_body(json!({"data": [
                {"tagName": "corp.scanner", "shortName": "scanner", "description": "scanners"}
            ]}));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_source(dir.path(), "testcorp");
    let options = MigrateOptions {
        input: input.clone(),
        output: None,
        destination_corp: "othercorp".to_string(),
        strip: false,
        keep_users: false,
    };

    let output = migrate(&test_client(&server), &options).await.unwrap();
    assert_eq!(output, dir.path().join("migrated_www.json"));
    lists.assert_async().await;
    tags.assert_async().await;

    let migrated = read_backup(&output).unwrap();
    assert_eq!(migrated.source.corp, "othercorp");
    assert_eq!(migrated.source.site, "www");
    assert_eq!(migrated.request_rules.len(), 2);
    assert_eq!(migrated.custom_alerts.len(), 3);
    assert!(migrated.site_members.is_empty());

    // Only referenced objects travel; the deleted signal cannot be found
    let corp_items = migrated.corp_items.expect("corp items carried");
    assert_eq!(corp_items.rule_list.len(), 1);
    assert_eq!(corp_items.rule_list[0].id.as_deref(), Some("corp.bad-ips"));
    assert_eq!(corp_items.signal.len(), 1);
    assert_eq!(corp_items.signal[0].tag_name, "corp.scanner");

    // The input is left alone
    assert_eq!(read_backup(&input).unwrap(), source_document("testcorp"));
}

#[tokio::test]
async fn test_migrate_strip_skips_corp_lookup() {
    let server = MockServer::start_async().await;
    let corp_reads = server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/corps/testcorp/");
            then.status(500);
        })
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_source(dir.path(), "elsewhere");
    let output_path = dir.path().join("out.json");
    let options = MigrateOptions {
        input,
        output: Some(output_path.clone()),
        destination_corp: "othercorp".to_string(),
        strip: true,
        keep_users: true,
    };

    let output = migrate(&test_client(&server), &options).await.unwrap();
    assert_eq!(output, output_path);
    corp_reads.assert_hits_async(0).await;

    let migrated = read_backup(&output).unwrap();
    assert_eq!(migrated.source.corp, "othercorp");
    assert_eq!(migrated.request_rules.len(), 1);
    assert_eq!(migrated.request_rules[0].reason, "admin");
    assert_eq!(migrated.custom_alerts.len(), 1);
    assert_eq!(migrated.custom_alerts[0].tag_name, "SQLI");
    assert_eq!(migrated.site_members.len(), 1);
    assert!(migrated.corp_items.is_none());
}

#[tokio::test]
async fn test_migrate_without_strip_rejects_foreign_backup() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let input = write_source(dir.path(), "elsewhere");
    let options = MigrateOptions {
        input,
        output: None,
        destination_corp: "othercorp".to_string(),
        strip: false,
        keep_users: false,
    };

    let err = migrate(&test_client(&server), &options).await.unwrap_err();
    assert!(err.to_string().contains("--strip"));
    assert!(!dir.path().join("migrated_www.json").exists());
}
