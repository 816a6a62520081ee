use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use bc_env_manager::config::{self, AppConfig};
use bc_env_manager::environment::{Inventory, compare_environments};
use bc_env_manager::logging;
use bc_env_manager::sync::sync_owner;
use bc_env_manager::version::cache::Cache;
use bc_env_manager::version::checker::{classify, summarize_fleet};
use bc_env_manager::version::registries::GitHubRegistry;

#[derive(Parser)]
#[command(name = "bc-env-manager")]
#[command(version, about = "Track Business Central apps across customer environments")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify an installed version against a reference version
    Check {
        installed: String,
        latest: Option<String>,
    },
    /// Sync the application catalog from GitHub
    Sync {
        /// Overrides the owner from the configuration
        #[arg(long)]
        owner: Option<String>,
        /// Sync repositories even if they were synced recently
        #[arg(long)]
        force: bool,
    },
    /// List the application catalog
    Apps,
    /// Count outdated installations per application
    Report {
        #[arg(long)]
        inventory: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compare installed apps across environments
    Diff {
        #[arg(long)]
        inventory: PathBuf,
        /// Environment as CUSTOMER/ENVIRONMENT; repeat for each environment
        #[arg(long = "env", required = true)]
        environments: Vec<String>,
        /// Include apps that are identical everywhere
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
}

fn open_cache(config: &AppConfig) -> anyhow::Result<Cache> {
    let db_path = config.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }
    Cache::new(&db_path).with_context(|| format!("Failed to open catalog {:?}", db_path))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Check { installed, latest } => {
            let status = classify(Some(installed.as_str()), latest.as_deref());
            println!("{}", status.as_str());
        }
        Command::Sync { owner, force } => {
            let Some(owner) = owner.or_else(|| config.github.owner.clone()) else {
                bail!("No GitHub owner given; pass --owner or set github.owner in the config");
            };
            let cache = open_cache(&config)?;
            let registry = GitHubRegistry::new(
                &config.github.base_url,
                config.github.resolve_token(),
                config.github.owner_kind,
            );
            let report = sync_owner(&registry, &cache, &owner, &config.sync, force)
                .await
                .with_context(|| format!("Failed to list repositories of {owner}"))?;
            println!(
                "synced {}, skipped {}, fresh {}, failed {}",
                report.synced, report.skipped, report.fresh, report.failed
            );
        }
        Command::Apps => {
            let cache = open_cache(&config)?;
            for entry in cache.list_applications()? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.app_id,
                    entry.name,
                    entry.latest_version.as_deref().unwrap_or("-"),
                    entry.workflow_status.as_deref().unwrap_or("-"),
                    entry.repository
                );
            }
        }
        Command::Report { inventory, json } => {
            let inventory = Inventory::load(&inventory)?;
            let cache = open_cache(&config)?;
            let summary = summarize_fleet(
                &cache,
                inventory
                    .installations()
                    .map(|app| (app.app_id.as_str(), app)),
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for row in &summary.rows {
                    println!(
                        "{}\tlatest {}\t{}/{} outdated",
                        row.app_id,
                        row.latest_version.as_deref().unwrap_or("-"),
                        row.outdated,
                        row.installations
                    );
                }
                println!(
                    "total: {}/{} outdated",
                    summary.total_outdated, summary.total_installations
                );
            }
        }
        Command::Diff {
            inventory,
            environments,
            all,
            json,
        } => {
            let inventory = Inventory::load(&inventory)?;
            let selected = environments
                .iter()
                .map(|spec| {
                    let Some((customer, name)) = spec.split_once('/') else {
                        bail!("Invalid environment {spec:?}; expected CUSTOMER/ENVIRONMENT");
                    };
                    inventory
                        .find_environment(customer, name)
                        .with_context(|| format!("Environment {spec:?} not found in inventory"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let comparison = compare_environments(&selected);

            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                println!("app\t{}", comparison.environments.join("\t"));
                let rows: Vec<_> = if all {
                    comparison.rows.iter().collect()
                } else {
                    comparison.differences().collect()
                };
                for row in rows {
                    let versions: Vec<_> = row
                        .versions
                        .iter()
                        .map(|v| v.as_deref().unwrap_or("-"))
                        .collect();
                    println!("{}\t{}", row.name, versions.join("\t"));
                }
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&config::log_path());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
