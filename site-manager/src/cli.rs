//! CLI argument parsing for sigsci-site-manager
use crate::audit::DEFAULT_BASELINE_FILE;
use crate::category::{Category, CategorySet, build_category_list};
use crate::credentials::CredentialArgs;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sigsci-site-manager",
    version,
    about = "Signal Sciences site management",
    long_about = "Back up, deploy, clone, merge and migrate Signal Sciences site configuration",
    after_help = "CATEGORIES (--include / --exclude):
  rule_lists, custom_signals, request_rules, signal_rules, templated_rules,
  custom_alerts, site_members, integrations, advanced_rules

EXAMPLES:
  # Copy www's rules onto every staging site
  sigsci-site-manager merge --src www --dst 'www-staging*' --include request_rules

  # Prepare a backup for a different corp
  sigsci-site-manager migrate --file www.json --dest-corp other --strip

Credentials may also come from the environment, see: sigsci-site-manager help-env"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Corp name (SIGSCI_CORP)
    #[arg(long, short = 'c', global = true, value_parser = validate_name)]
    pub corp: Option<String>,

    /// Account email (SIGSCI_EMAIL)
    #[arg(long = "user", short = 'u', global = true, value_parser = validate_email)]
    pub user: Option<String>,

    /// Account password (SIGSCI_PASSWORD)
    #[arg(long, short = 'p', global = true)]
    pub password: Option<String>,

    /// API access token (SIGSCI_API_TOKEN)
    #[arg(long, short = 't', global = true)]
    pub token: Option<String>,

    /// Dashboard API root (SIGSCI_API_URL)
    #[arg(long, global = true, hide = true, value_parser = validate_url)]
    pub api_url: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Credential values given on the command line
    #[must_use]
    pub fn credential_args(&self) -> CredentialArgs {
        CredentialArgs {
            corp: self.corp.clone(),
            email: self.user.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            api_url: self.api_url.clone(),
        }
    }
}

/// Category selection shared by deploy, clone and merge
#[derive(Args, Debug, Clone, Default)]
pub struct CategoryArgs {
    /// Only these categories (comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "exclude", value_parser = clap::value_parser!(Category))]
    pub include: Vec<Category>,

    /// Every category except these (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(Category))]
    pub exclude: Vec<Category>,
}

impl CategoryArgs {
    /// # Errors
    ///
    /// Both `--include` and `--exclude` given.
    pub fn categories(&self) -> Result<CategorySet> {
        build_category_list(&self.include, &self.exclude)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the corp's sites
    List,

    /// Back up a site to a file
    Backup {
        /// Site name
        #[arg(short = 'n', long = "name", value_parser = validate_name)]
        name: String,

        /// File to save the backup to
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
    },

    /// Deploy a new site from a backup file
    Deploy {
        /// Name of the new site
        #[arg(short = 'n', long = "name", value_parser = validate_name)]
        name: String,

        /// Backup file
        #[arg(short = 'f', long = "file", value_parser = validate_existing_file)]
        file: PathBuf,

        /// Display name of the new site (defaults to its name)
        #[arg(long)]
        display_name: Option<String>,

        #[command(flatten)]
        categories: CategoryArgs,
    },

    /// Clone an existing site to a new site
    Clone {
        /// Site to clone from
        #[arg(short = 's', long = "src", value_parser = validate_name)]
        src: String,

        /// Site to clone to
        #[arg(short = 'd', long = "dest", value_parser = validate_name)]
        dest: String,

        /// Display name of the new site (defaults to its name)
        #[arg(long)]
        display_name: Option<String>,

        #[command(flatten)]
        categories: CategoryArgs,
    },

    /// Merge a site or backup file onto existing sites
    Merge {
        /// Site to merge from
        #[arg(short = 's', long = "src", conflicts_with = "file", required_unless_present = "file", value_parser = validate_name)]
        src: Option<String>,

        /// Backup file to merge from
        #[arg(short = 'f', long = "file", value_parser = validate_existing_file)]
        file: Option<PathBuf>,

        /// Destination site names or wildcard patterns (repeatable)
        #[arg(short = 'd', long = "dst", required = true, num_args = 1..)]
        dst: Vec<String>,

        #[command(flatten)]
        categories: CategoryArgs,
    },

    /// Rewrite a backup file for another corp
    Migrate {
        /// Backup file to migrate
        #[arg(short = 'f', long = "file", value_parser = validate_existing_file)]
        file: PathBuf,

        /// Output file (default: migrated_<file> next to the input)
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,

        /// Corp the backup will be deployed to
        #[arg(long = "dest-corp", value_parser = validate_name)]
        dest_corp: String,

        /// Drop items that depend on corp lists or signals
        #[arg(long)]
        strip: bool,

        /// Keep site members
        #[arg(long)]
        keep_users: bool,
    },

    /// Send test requests through a site and find them in its request log
    Validate {
        /// Site name
        #[arg(short = 'n', long = "name", value_parser = validate_name)]
        name: String,

        /// Protected application, e.g. https://www.example.com
        #[arg(long, value_parser = validate_url)]
        hostname: String,

        /// JSON file of test cases ([{verb, path, body}])
        #[arg(long, value_parser = validate_existing_file)]
        test_cases: Option<PathBuf>,

        /// Seconds to wait for the agent to upload request logs (0-600)
        #[arg(long, default_value = "30", value_parser = validate_wait)]
        wait: u64,

        /// Print the test plan without sending anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage corp users and site members
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },

    /// Audit a site's alerts against a compliance baseline
    Audit {
        /// Site to audit
        #[arg(short = 'n', long = "name", value_parser = validate_name)]
        name: String,

        /// Site whose alerts define the baseline
        #[arg(long, value_parser = validate_name)]
        baseline_site: Option<String>,

        /// Baseline file, used without --baseline-site
        #[arg(long, default_value = DEFAULT_BASELINE_FILE)]
        baseline_file: PathBuf,

        /// Save the baseline in use to this file
        #[arg(long)]
        save_baseline: Option<PathBuf>,

        /// Only audit enabled alerts
        #[arg(long)]
        active_only: bool,
    },

    /// Display help for environment variables
    HelpEnv,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// List corp users, or the members of a site
    List {
        #[arg(short = 's', long = "site", value_parser = validate_name)]
        site: Option<String>,
    },

    /// List a user's site memberships
    Memberships {
        #[arg(short = 'e', long = "email", value_parser = validate_email)]
        email: String,
    },

    /// Add users to the corp or to a site
    Add {
        #[arg(short = 's', long = "site", value_parser = validate_name)]
        site: Option<String>,

        #[arg(short = 'e', long = "email", required_unless_present = "file", value_parser = validate_email)]
        email: Option<String>,

        /// admin, user, observer or owner (default: observer)
        #[arg(short = 'r', long = "role")]
        role: Option<String>,

        /// CSV file of email,role rows, or - for stdin
        #[arg(short = 'f', long = "file")]
        file: Option<String>,

        /// Create API-only users
        #[arg(long)]
        api_user: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Remove users from the corp or from a site
    Remove {
        #[arg(short = 's', long = "site", value_parser = validate_name)]
        site: Option<String>,

        #[arg(short = 'e', long = "email", required_unless_present = "file", value_parser = validate_email)]
        email: Option<String>,

        /// File with one email per line, or - for stdin
        #[arg(short = 'f', long = "file")]
        file: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },
}

/// Validate a corp or site short name
fn validate_name(s: &str) -> std::result::Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if trimmed.contains(['/', '?', '#']) || trimmed.chars().any(char::is_whitespace) {
        return Err(format!(
            "Name must not contain '/', '?', '#' or whitespace, got: '{s}'"
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_email(s: &str) -> std::result::Result<String, String> {
    let trimmed = s.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(trimmed.to_string())
        }
        _ => Err(format!("'{s}' is not an email address")),
    }
}

/// Validate an http(s) URL
fn validate_url(s: &str) -> std::result::Result<String, String> {
    let trimmed = s.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| format!("URL must start with https:// or http://, got: '{s}'"))?;
    if rest.is_empty() {
        return Err(format!("URL has no host, got: '{s}'"));
    }
    Ok(trimmed.to_string())
}

fn validate_existing_file(s: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if !path.is_file() {
        return Err(format!("File '{s}' does not exist"));
    }
    Ok(path)
}

/// Validate wait time (0-600 seconds)
fn validate_wait(s: &str) -> std::result::Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("Wait must be a number of seconds, got: '{s}'"))?;
    if value > 600 {
        return Err(format!("Wait must be at most 600 seconds, got: {value}"));
    }
    Ok(value)
}
