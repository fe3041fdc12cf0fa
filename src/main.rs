//! Artidex - searchable indexes over artifact repositories
//!
//! Indexes the local artifact cache and remote repositories, then answers
//! coordinate lookups, free-text searches and checksum identification over
//! all of them at once.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod output;

use artidex::config::AppConfig;
use artidex::watcher::RepositoryWatcher;
use artidex::{
    scanner, ArtifactIndex, ClassifierMask, FindQuery, IndexDetailLevel, IndexManager,
    IndexPacker, RepositoryDescriptor, SearchExpression, SearchType,
};
use cli::{Cli, Commands};
use output::ResultPrinter;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    let printer = ResultPrinter::new(cli.json);

    if let Commands::Publish { dir, repo, keep } = &cli.command {
        return publish(dir, repo.as_deref(), *keep);
    }

    let manager = Arc::new(open_manager(&config)?);

    match cli.command {
        Commands::Update { repo, force, background } => {
            let uids = match repo {
                Some(uid) => vec![manager.repository(&uid)?.uid],
                None => manager.repositories().into_iter().map(|r| r.uid).collect(),
            };

            if background {
                for uid in &uids {
                    manager.schedule_update(uid, force)?;
                }
                let status = manager.wait_for_updates();
                printer.print_update_status(&status);
            } else {
                let cancel = CancellationToken::new();
                for uid in &uids {
                    match manager.update_index(uid, force, &cancel) {
                        Ok(outcome) => println!("   {} {:?}", uid, outcome),
                        Err(e) => println!("   ❌ {}: {}", uid, e),
                    }
                }
            }
        }
        Commands::Find {
            group,
            artifact,
            version,
            packaging,
            exact,
            repo,
        } => {
            let expr = |value: String| {
                if exact {
                    SearchExpression::exact(value)
                } else {
                    SearchExpression::scored(value)
                }
            };
            let mut query = FindQuery::new();
            if let Some(group) = group {
                query = query.group(expr(group));
            }
            if let Some(artifact) = artifact {
                query = query.artifact(expr(artifact));
            }
            for version in version {
                query = query.version(expr(version));
            }
            if let Some(packaging) = packaging {
                query = query.packaging(SearchExpression::exact(packaging));
            }

            let index = target_index(&manager, repo.as_deref())?;
            printer.print_artifacts(&index.find(&query)?)?;
        }
        Commands::Search {
            term,
            search_type,
            include,
            repo,
        } => {
            let search_type: SearchType = search_type.parse()?;
            let mask: ClassifierMask = include.parse()?;
            tracing::info!("Searching {} for: {}", search_type, term);

            let index = target_index(&manager, repo.as_deref())?;
            printer.print_search(&index.search(&term, search_type, mask)?)?;
        }
        Commands::Identify { file } => {
            let index = manager.composite_all()?;
            let found = index
                .identify(&file)
                .with_context(|| format!("Failed to identify {}", file.display()))?;
            printer.print_file(found.as_ref())?;
        }
        Commands::Details { repo, level } => match level {
            Some(level) => {
                let level: IndexDetailLevel = level.parse()?;
                manager.set_index_details(&repo, level)?;
                println!("   {} index detail level set to {}", repo, level);
                let status = manager.wait_for_updates();
                printer.print_update_status(&status);
            }
            None => println!("   {}: {}", repo, manager.detail_level(&manager.repository(&repo)?.uid)),
        },
        Commands::Status => {
            printer.print_status(&manager.status())?;
        }
        Commands::Watch => {
            println!("🔍 Watching the local repository... (Ctrl+C to stop)");
            RepositoryWatcher::default().watch(&manager, RepositoryDescriptor::LOCAL_UID, &CancellationToken::new())?;
        }
        Commands::Publish { .. } => {}
    }

    Ok(())
}

fn open_manager(config: &AppConfig) -> Result<IndexManager> {
    let manager = IndexManager::new(config.manager_config()?)
        .with_context(|| format!("Failed to open indexes in {}", config.index.dir.display()))?;

    manager.repository_added(config.local_repository())?;
    for repo in &config.repositories {
        manager.repository_added(repo.descriptor())?;
    }
    Ok(manager)
}

/// One repository when named, else every repository merged
fn target_index(manager: &Arc<IndexManager>, repo: Option<&str>) -> Result<Box<dyn ArtifactIndex>> {
    let index: Box<dyn ArtifactIndex> = match repo {
        Some(uid) => Box::new(manager.index_handle(uid)?),
        None => Box::new(manager.composite_all()?),
    };
    Ok(index)
}

fn publish(dir: &std::path::Path, id: Option<&str>, keep: u64) -> Result<()> {
    let index_id = match id {
        Some(id) => id.to_string(),
        None => dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repository")
            .to_string(),
    };
    tracing::info!("Publishing index of {:?} as {}", dir, index_id);

    let (records, stats) = scanner::scan_repository(dir, IndexDetailLevel::Full, &CancellationToken::new())
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    let packer = IndexPacker::new(dir).with_index_id(index_id);
    let published = packer.publish_snapshot(&records)?;
    packer.retain_incrementals(keep)?;

    match published {
        Some(props) => {
            println!("\n✨ Published {} artifacts", stats.artifacts);
            println!("   Chain: {}", props.chain_id);
            println!("   Incremental: {}", props.last_incremental);
        }
        None => println!("\n   Index unchanged, nothing published"),
    }
    Ok(())
}
