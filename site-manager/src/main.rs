//! sigsci-site-manager - Signal Sciences site management tool
use clap::Parser;
use log::{error, info, warn};
use sigsci_platform::SigSciClient;
use sigsci_site_manager::audit::{self, AuditOptions};
use sigsci_site_manager::cli::{Cli, Commands, UsersCommand};
use sigsci_site_manager::credentials::{ENVIRONMENT_HELP, load_credentials};
use sigsci_site_manager::migrate::{self, MigrateOptions};
use sigsci_site_manager::users::{self, AddUsersOptions, RemoveUsersOptions};
use sigsci_site_manager::validate::{self, ValidateOptions};
use sigsci_site_manager::{CategoryReport, MergeSource, Result, backup, deploy, merge};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    if matches!(args.command, Commands::HelpEnv) {
        println!("{ENVIRONMENT_HELP}");
        return Ok(());
    }

    let credentials = load_credentials(&args.credential_args())?;
    let client = SigSciClient::new(credentials.into_config())?
        .authenticate()
        .await?;

    match args.command {
        Commands::List => list_sites(&client).await?,
        Commands::Backup { name, out } => backup::backup_to_file(&client, &name, &out).await?,
        Commands::Deploy {
            name,
            file,
            display_name,
            categories,
        } => {
            let categories = categories.categories()?;
            let report = deploy::deploy_from_file(
                &client,
                &name,
                display_name.as_deref(),
                &file,
                &categories,
            )
            .await?;
            log_report(&name, report.as_ref());
        }
        Commands::Clone {
            src,
            dest,
            display_name,
            categories,
        } => {
            let categories = categories.categories()?;
            let report =
                deploy::clone_site(&client, &src, &dest, display_name.as_deref(), &categories)
                    .await?;
            log_report(&dest, report.as_ref());
        }
        Commands::Merge {
            src,
            file,
            dst,
            categories,
        } => {
            let categories = categories.categories()?;
            let source = match (src, file) {
                (Some(site), _) => MergeSource::Site(site),
                (None, Some(path)) => MergeSource::File(path),
                (None, None) => {
                    return Err(sigsci_site_manager::ManagerError::InvalidArguments(
                        "merge needs --src or --file".to_string(),
                    ));
                }
            };
            let results = merge::merge(&client, &source, &dst, &categories).await?;
            if results.is_empty() {
                warn!("No destination site was merged");
            }
            for (site, report) in &results {
                log_report(site, Some(report));
            }
        }
        Commands::Migrate {
            file,
            out,
            dest_corp,
            strip,
            keep_users,
        } => {
            let options = MigrateOptions {
                input: file,
                output: out,
                destination_corp: dest_corp,
                strip,
                keep_users,
            };
            migrate::migrate(&client, &options).await?;
        }
        Commands::Validate {
            name,
            hostname,
            test_cases,
            wait,
            dry_run,
        } => {
            let test_cases = match test_cases {
                Some(path) => validate::load_test_cases(&path)?,
                None => validate::default_test_cases(),
            };
            let options = ValidateOptions {
                site: name,
                hostname,
                test_cases,
                dry_run,
                wait: Duration::from_secs(wait),
            };
            validate::validate(&client, &options).await?;
        }
        Commands::Users { command } => run_users(&client, command).await?,
        Commands::Audit {
            name,
            baseline_site,
            baseline_file,
            save_baseline,
            active_only,
        } => {
            let options = AuditOptions {
                site: name,
                baseline_site,
                baseline_file,
                save_baseline,
                active_only,
            };
            audit::audit(&client, &options).await?;
        }
        Commands::HelpEnv => println!("{ENVIRONMENT_HELP}"),
    }

    Ok(())
}

async fn list_sites(client: &SigSciClient) -> Result<()> {
    println!("Listing sites for \"{}\":", client.corp());
    let mut names: Vec<String> = client
        .sites_api()
        .list_sites()
        .await?
        .into_iter()
        .map(|site| site.name)
        .collect();
    names.sort();
    for name in &names {
        println!("  {name}");
    }
    println!("({} sites)", names.len());
    Ok(())
}

async fn run_users(client: &SigSciClient, command: UsersCommand) -> Result<()> {
    match command {
        UsersCommand::List { site } => {
            for line in users::user_table(client, site.as_deref()).await? {
                println!("{line}");
            }
        }
        UsersCommand::Memberships { email } => {
            for line in users::membership_table(client, &email).await? {
                println!("{line}");
            }
        }
        UsersCommand::Add {
            site,
            email,
            role,
            file,
            api_user,
            dry_run,
        } => {
            let options = AddUsersOptions {
                site,
                email,
                role,
                file,
                api_user,
                dry_run,
            };
            let outcome = users::add_users(client, &options).await?;
            info!("{} users processed, {} failed", outcome.processed, outcome.failed);
        }
        UsersCommand::Remove {
            site,
            email,
            file,
            dry_run,
        } => {
            let options = RemoveUsersOptions {
                site,
                email,
                file,
                dry_run,
            };
            let outcome = users::remove_users(client, &options).await?;
            info!("{} users processed, {} failed", outcome.processed, outcome.failed);
        }
    }
    Ok(())
}

fn log_report(site: &str, report: Option<&CategoryReport>) {
    let Some(report) = report else {
        return;
    };
    for (category, summary) in report {
        info!("{site}: {category}: {summary}");
    }
    let failed: usize = report.iter().map(|(_, summary)| summary.failed).sum();
    if failed > 0 {
        warn!("{site}: {failed} items failed");
    }
}
