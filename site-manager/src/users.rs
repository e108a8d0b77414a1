//! Corp user and site member administration.
use crate::error::Result;
use log::{debug, error, info};
use sigsci_platform::users::{DEFAULT_ROLE, VALID_ROLES};
use sigsci_platform::{CorpUser, InviteUserRequest, Scope, SigSciClient};
use std::fs::File;
use std::io::{self, Read};

/// Pick the role to grant: a known role as given, otherwise the default.
#[must_use]
pub fn resolve_role(role: Option<&str>) -> &'static str {
    let wanted = role.map(str::trim).unwrap_or_default();
    VALID_ROLES
        .iter()
        .find(|valid| **valid == wanted)
        .copied()
        .unwrap_or(DEFAULT_ROLE)
}

fn location(scope: Scope<'_>) -> &str {
    match scope {
        Scope::Corp => "corp",
        Scope::Site(site) => site,
    }
}

/// One line of a user import file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub email: String,
    pub role: Option<String>,
}

/// Parse `email[,role]` rows. Blank lines are skipped, extra columns ignored.
///
/// # Errors
///
/// Read or CSV syntax errors.
pub fn parse_user_rows<R: Read>(reader: R) -> Result<Vec<UserEntry>> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in rows.records() {
        let record = record?;
        let Some(email) = record.get(0).filter(|email| !email.is_empty()) else {
            continue;
        };
        entries.push(UserEntry {
            email: email.to_string(),
            role: record
                .get(1)
                .filter(|role| !role.is_empty())
                .map(str::to_string),
        });
    }
    Ok(entries)
}

/// Read import rows from a file, or from stdin for `-`.
///
/// # Errors
///
/// The file cannot be opened or parsed.
pub fn read_user_file(path: &str) -> Result<Vec<UserEntry>> {
    if path == "-" {
        parse_user_rows(io::stdin().lock())
    } else {
        parse_user_rows(File::open(path)?)
    }
}

/// One fixed-width table row
#[must_use]
pub fn format_user_row(email: &str, role: &str, status: &str, name: &str) -> String {
    format!("{email:>45} {role:>10} {status:>10} {name:>30}")
}

/// Table of corp users, or of the members of `site`, rows sorted.
///
/// # Errors
///
/// API failures.
pub async fn user_table(client: &SigSciClient, site: Option<&str>) -> Result<Vec<String>> {
    let api = client.users_api();
    let (header, mut rows) = match site {
        Some(site) => {
            let rows: Vec<String> = api
                .list_site_members(site)
                .await?
                .iter()
                .map(|member| {
                    format_user_row(
                        &member.user.email,
                        &member.role,
                        member.user.status.as_deref().unwrap_or_default(),
                        member.user.name.as_deref().unwrap_or_default(),
                    )
                })
                .collect();
            (format_user_row("email", "siterole", "status", "name"), rows)
        }
        None => {
            let rows: Vec<String> = api
                .list_corp_users()
                .await?
                .iter()
                .map(|user| format_user_row(&user.email, &user.role, &user.status, &user.name))
                .collect();
            (format_user_row("email", "corprole", "status", "name"), rows)
        }
    };
    rows.sort();

    let mut table = Vec::with_capacity(rows.len() + 2);
    if let Some(site) = site {
        table.push(format!("Site: {site}"));
    }
    table.push(header);
    table.extend(rows);
    Ok(table)
}

/// Role and site of each of `email`'s memberships, rows sorted.
///
/// # Errors
///
/// API failures, including an unknown user.
pub async fn membership_table(client: &SigSciClient, email: &str) -> Result<Vec<String>> {
    let mut rows: Vec<String> = client
        .users_api()
        .list_memberships(email)
        .await?
        .iter()
        .map(|membership| {
            format!(
                "{:>10} {} [{}]",
                membership.role, membership.site.display_name, membership.site.name
            )
        })
        .collect();
    rows.sort();

    let mut table = vec![format!("{:>10} {}", "role", "site")];
    table.extend(rows);
    Ok(table)
}

/// What `users add` should do
#[derive(Debug, Clone, Default)]
pub struct AddUsersOptions {
    pub site: Option<String>,
    pub email: Option<String>,
    /// Overrides roles from the file
    pub role: Option<String>,
    pub file: Option<String>,
    pub api_user: bool,
    pub dry_run: bool,
}

/// What `users remove` should do
#[derive(Debug, Clone, Default)]
pub struct RemoveUsersOptions {
    pub site: Option<String>,
    pub email: Option<String>,
    pub file: Option<String>,
    pub dry_run: bool,
}

/// Counts of one add or remove run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsersOutcome {
    pub processed: usize,
    pub failed: usize,
}

/// Entries to process: `--email` first, then the file rows.
fn collect_entries(
    email: Option<&str>,
    role: Option<&str>,
    file: Option<&str>,
) -> Result<Vec<UserEntry>> {
    let mut entries = Vec::new();
    if let Some(email) = email {
        entries.push(UserEntry {
            email: email.to_string(),
            role: role.map(str::to_string),
        });
    }
    if let Some(file) = file {
        for mut entry in read_user_file(file)? {
            if role.is_some() {
                entry.role = role.map(str::to_string);
            }
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Grant access to one user.
///
/// On a site, existing corp users get the site role and anyone else is
/// invited with a membership of that site. At corp level, existing users
/// are left alone.
async fn add_user(
    client: &SigSciClient,
    scope: Scope<'_>,
    email: &str,
    role: &str,
    api_user: bool,
    corp_users: &[CorpUser],
) -> Result<()> {
    let api = client.users_api();
    let known = corp_users
        .iter()
        .any(|user| user.email.eq_ignore_ascii_case(email));

    match scope {
        Scope::Site(site) if known => api.update_site_member(site, email, role).await?,
        Scope::Site(site) => {
            api.invite_corp_user(email, &InviteUserRequest::site(site, role, api_user))
                .await?;
        }
        Scope::Corp if known => info!("{email} is already a member of the corp"),
        Scope::Corp => {
            api.invite_corp_user(email, &InviteUserRequest::corp(role, api_user))
                .await?;
        }
    }
    Ok(())
}

/// Add the given user and/or every user in the import file.
///
/// # Errors
///
/// An unreadable import file or failure to list corp users. Individual
/// users that cannot be added are reported and counted.
pub async fn add_users(client: &SigSciClient, options: &AddUsersOptions) -> Result<UsersOutcome> {
    let scope = options.site.as_deref().map_or(Scope::Corp, Scope::Site);
    let entries = collect_entries(
        options.email.as_deref(),
        options.role.as_deref(),
        options.file.as_deref(),
    )?;

    let corp_users = if options.dry_run || entries.is_empty() {
        Vec::new()
    } else {
        client.users_api().list_corp_users().await?
    };

    let mut outcome = UsersOutcome::default();
    for entry in &entries {
        let role = resolve_role(entry.role.as_deref());
        println!("Adding {} to {} with {role} role", entry.email, location(scope));
        outcome.processed += 1;
        if options.dry_run {
            continue;
        }
        if let Err(e) = add_user(client, scope, &entry.email, role, options.api_user, &corp_users).await {
            error!("Failed to add {}: {e}", entry.email);
            outcome.failed += 1;
        }
    }

    if options.file.is_some() {
        println!("Processed {} entries", outcome.processed);
    }
    Ok(outcome)
}

/// Remove the given user and/or every user in the file, from the site or
/// from the corp.
///
/// # Errors
///
/// An unreadable input file. Individual removals that fail are reported and
/// counted.
pub async fn remove_users(
    client: &SigSciClient,
    options: &RemoveUsersOptions,
) -> Result<UsersOutcome> {
    let scope = options.site.as_deref().map_or(Scope::Corp, Scope::Site);
    let entries = collect_entries(options.email.as_deref(), None, options.file.as_deref())?;
    let api = client.users_api();

    let mut outcome = UsersOutcome::default();
    for entry in &entries {
        println!("Deleting {} from {}", entry.email, location(scope));
        outcome.processed += 1;
        if options.dry_run {
            continue;
        }
        let result = match scope {
            Scope::Site(site) => api.delete_site_member(site, &entry.email).await,
            Scope::Corp => api.delete_corp_user(&entry.email).await,
        };
        if let Err(e) = result {
            error!("Failed to remove {}: {e}", entry.email);
            outcome.failed += 1;
        } else {
            debug!("Removed {}", entry.email);
        }
    }

    if options.file.is_some() {
        println!("Processed {} entries", outcome.processed);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use sigsci_platform::{Credentials, SigSciConfig};

    fn test_client(server: &MockServer) -> SigSciClient {
        let config = SigSciConfig::new(
            "admin@example.com".to_string(),
            Credentials::api_token("token".to_string()),
            "testcorp".to_string(),
        )
        .with_base_url(server.url("/api/v0"));
        SigSciClient::new(config).unwrap()
    }

    #[test]
    fn test_resolve_role() {
        assert_eq!(resolve_role(Some("admin")), "admin");
        assert_eq!(resolve_role(Some(" owner ")), "owner");
        assert_eq!(resolve_role(Some("superuser")), DEFAULT_ROLE);
        assert_eq!(resolve_role(None), "observer");
    }

    #[test]
    fn test_parse_user_rows() {
        let input = "jane@example.com,admin\n\njoe@example.com\n bob@example.com , user ,extra\n";
        let entries = parse_user_rows(input.as_bytes()).unwrap();
        assert_eq!(
            entries,
            vec![
                UserEntry {
                    email: "jane@example.com".to_string(),
                    role: Some("admin".to_string())
                },
                UserEntry {
                    email: "joe@example.com".to_string(),
                    role: None
                },
                UserEntry {
                    email: "bob@example.com".to_string(),
                    role: Some("user".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_format_user_row_widths() {
        let row = format_user_row("a@b.c", "admin", "active", "A");
        assert_eq!(row.len(), 45 + 1 + 10 + 1 + 10 + 1 + 30);
        assert!(row.ends_with(" A"));
    }

    #[tokio::test]
    async fn test_add_users_dry_run_makes_no_calls() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.path_contains("/api/v0");
                then.status(500);
            })
            .await;

        let client = test_client(&server);
        let outcome = add_users(
            &client,
            &AddUsersOptions {
                site: Some("www".to_string()),
                email: Some("jane@example.com".to_string()),
                role: Some("admin".to_string()),
                dry_run: true,
                ..AddUsersOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, UsersOutcome { processed: 1, failed: 0 });
        any.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_add_to_site_updates_existing_and_invites_new() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v0/corps/testcorp/users");
                then.status(200).json_body(json!({"data": [
                    {"email": "jane@example.com", "name": "Jane", "role": "user", "status": "active"}
                ]}));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_contains("/sites/www/members/jane")
                    .json_body(json!({"role": "admin"}));
                then.status(200).json_body(json!({}));
            })
            .await;
        let invite = server
            .mock_async(|when, then| {
                when.method(POST).path_contains("/users/joe");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = test_client(&server);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "jane@example.com,admin\njoe@example.com,admin\n").unwrap();

        let outcome = add_users(
            &client,
            &AddUsersOptions {
                site: Some("www".to_string()),
                file: Some(file.path().to_string_lossy().into_owned()),
                ..AddUsersOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, UsersOutcome { processed: 2, failed: 0 });
        update.assert_async().await;
        invite.assert_async().await;
    }

    #[tokio::test]
    async fn test_remove_from_corp_counts_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path_contains("/users/gone");
                then.status(404).body("not found");
            })
            .await;
        let ok = server
            .mock_async(|when, then| {
                when.method(DELETE).path_contains("/users/jane");
                then.status(204);
            })
            .await;

        let client = test_client(&server);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "jane@example.com\ngone@example.com\n").unwrap();

        let outcome = remove_users(
            &client,
            &RemoveUsersOptions {
                file: Some(file.path().to_string_lossy().into_owned()),
                ..RemoveUsersOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, UsersOutcome { processed: 2, failed: 1 });
        ok.assert_async().await;
    }
}
