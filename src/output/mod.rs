//! Terminal output for query results and index status
//!
//! Uses colored for terminal colors. Every printer also has a JSON form for
//! tool integration.

use anyhow::Result;
use colored::*;
use std::collections::BTreeMap;

use artidex::indexer::IndexStatus;
use artidex::manager::RepositoryStatus;
use artidex::model::{IndexedArtifact, IndexedArtifactFile};
use artidex::queue::UpdateStatus;

/// Handles formatting and printing results
pub struct ResultPrinter {
    json: bool,
    max_versions: usize,
}

impl ResultPrinter {
    pub fn new(json: bool) -> Self {
        Self { json, max_versions: 5 }
    }

    pub fn print_artifacts(&self, artifacts: &[IndexedArtifact]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(artifacts)?);
            return Ok(());
        }
        if artifacts.is_empty() {
            println!("\n{}", "No artifacts found.".yellow());
            return Ok(());
        }

        println!(
            "\n{} {}\n",
            "Found".green().bold(),
            format!("{} artifact(s):", artifacts.len()).green()
        );
        for (i, artifact) in artifacts.iter().enumerate() {
            self.print_artifact(i + 1, artifact);
        }
        Ok(())
    }

    pub fn print_search(&self, results: &BTreeMap<String, IndexedArtifact>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(results)?);
            return Ok(());
        }
        let artifacts: Vec<IndexedArtifact> = results.values().cloned().collect();
        self.print_artifacts(&artifacts)
    }

    fn print_artifact(&self, index: usize, artifact: &IndexedArtifact) {
        println!(
            "{} {}{}{} {} {}",
            format!("[{}]", index).cyan().bold(),
            artifact.group_id.blue(),
            ":".dimmed(),
            artifact.artifact_id.blue().bold(),
            "·".dimmed(),
            artifact.packaging.magenta()
        );
        if let Some(classname) = &artifact.classname {
            let package = artifact.package_name.as_deref().unwrap_or_default();
            println!("    {} {}", "class:".dimmed(), qualified(package, classname).yellow());
        }

        let versions = artifact.versions();
        let shown: Vec<&str> = versions.iter().take(self.max_versions).map(String::as_str).collect();
        let more = versions.len().saturating_sub(shown.len());
        let suffix = if more > 0 {
            format!(" (+{} more)", more).dimmed().to_string()
        } else {
            String::new()
        };
        println!("    {} {}{}", "versions:".dimmed(), shown.join(", "), suffix);
        println!();
    }

    pub fn print_file(&self, file: Option<&IndexedArtifactFile>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&file)?);
            return Ok(());
        }
        let Some(file) = file else {
            println!("\n{}", "Not found in any index.".yellow());
            return Ok(());
        };

        println!("\n{} {}", "Identified".green().bold(), coordinates(file).blue().bold());
        println!("    {} {}", "file:".dimmed(), file.file_name);
        println!("    {} {}", "packaging:".dimmed(), file.packaging.magenta());
        println!("    {} {}", "size:".dimmed(), human_size(file.size));
        if let Some(sha1) = &file.sha1 {
            println!("    {} {}", "sha1:".dimmed(), sha1);
        }
        if let Some(prefix) = &file.prefix {
            println!("    {} {}", "plugin prefix:".dimmed(), prefix);
        }
        println!(
            "    {} sources {} · javadoc {}",
            "attached:".dimmed(),
            flag(file.sources_exists),
            flag(file.javadoc_exists)
        );
        Ok(())
    }

    pub fn print_status(&self, statuses: &[RepositoryStatus]) -> Result<()> {
        println!("\n{}", "Index Status".bold());
        for status in statuses {
            println!(
                "\n  {} {} {}",
                status.repository.uid.cyan().bold(),
                "·".dimmed(),
                status.repository.url.dimmed()
            );
            println!("    {} {}", "details:".dimmed(), status.level);
            match &status.index {
                Some(index) => print_index_status(index),
                None => println!("    {} {}", "index:".dimmed(), "disabled".yellow()),
            }
        }
        println!();
        Ok(())
    }

    pub fn print_update_status(&self, status: &UpdateStatus) {
        if status.is_ok() {
            println!("\n{} {} update(s) completed", "✨".green(), status.completed);
            return;
        }
        println!(
            "\n{} completed, {} failed{}",
            status.completed,
            status.failures.len(),
            if status.cancelled {
                format!(", cancelled ({} skipped)", status.skipped)
            } else {
                String::new()
            }
        );
        for (uid, error) in &status.failures {
            println!("   {} {}: {}", "❌".red(), uid.bold(), error);
        }
    }
}

fn print_index_status(index: &IndexStatus) {
    println!("    {} {}", "documents:".dimmed(), index.num_docs);
    println!("    {} {}", "size:".dimmed(), human_size(index.size_bytes));
    println!(
        "    {} {}",
        "searchable:".dimmed(),
        if index.searchable { "yes".green() } else { "no".red() }
    );
    if let Some(state) = &index.state {
        if let Some(chain) = &state.chain_id {
            println!(
                "    {} {} @ {}",
                "chain:".dimmed(),
                chain,
                state.last_incremental.map(|n| n.to_string()).unwrap_or_else(|| "full".to_string())
            );
        }
    }
}

fn qualified(package: &str, classname: &str) -> String {
    if package.is_empty() {
        classname.to_string()
    } else {
        format!("{}.{}", package, classname)
    }
}

fn coordinates(file: &IndexedArtifactFile) -> String {
    match &file.classifier {
        Some(classifier) => format!("{}:{}:{}:{}", file.group_id, file.artifact_id, file.version, classifier),
        None => format!("{}:{}:{}", file.group_id, file.artifact_id, file.version),
    }
}

fn flag(value: bool) -> ColoredString {
    if value {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
