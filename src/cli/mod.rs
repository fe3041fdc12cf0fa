//! CLI definitions using clap derive macros
//!
//! Subcommands:
//! - update: bring repository indexes up to date
//! - find: structured lookup by coordinates
//! - search: free-text search by search type
//! - identify: find the artifact a local file belongs to
//! - details: show or change a repository's detail level
//! - status: show index health
//! - watch: re-index the local repository on changes
//! - publish: write a remote index layout for a local repository

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Artidex - local and remote artifact repository indexes
#[derive(Parser, Debug)]
#[command(name = "artidex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to ~/.artidex/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output results as JSON (for tool integration)
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update one or all repository indexes
    Update {
        /// Repository id (defaults to all repositories)
        #[arg(short, long)]
        repo: Option<String>,

        /// Rebuild remote indexes from their full snapshot
        #[arg(short, long, default_value = "false")]
        force: bool,

        /// Run through the background update queue
        #[arg(short, long, default_value = "false")]
        background: bool,
    },

    /// Find artifacts by coordinates
    Find {
        #[arg(short, long)]
        group: Option<String>,

        #[arg(short, long)]
        artifact: Option<String>,

        /// Repeat to match any of several versions
        #[arg(short = 'v', long = "artifact-version")]
        version: Vec<String>,

        #[arg(short, long)]
        packaging: Option<String>,

        /// Match values exactly instead of by prefix
        #[arg(short, long, default_value = "false")]
        exact: bool,

        /// Only search this repository
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Search indexes by free text
    Search {
        #[arg(value_name = "TERM")]
        term: String,

        /// group, artifact, parent, plugin, archetype, packaging, sha1 or classname
        #[arg(short = 't', long = "type", default_value = "artifact")]
        search_type: String,

        /// Artifact kinds to include: sources, javadoc, tests or all
        #[arg(short, long, value_name = "KINDS", default_value = "")]
        include: String,

        /// Only search this repository
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Identify a local file by its checksum
    Identify {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show or set a repository's index detail level (off, min, full)
    Details {
        #[arg(value_name = "REPO")]
        repo: String,

        #[arg(value_name = "LEVEL")]
        level: Option<String>,
    },

    /// Show index health for every repository
    Status,

    /// Watch the local repository and update its index on changes
    Watch,

    /// Publish a remote index layout for a local repository directory
    Publish {
        /// Directory to publish; `.index/` is written below it
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Index id recorded in the properties file (defaults to the directory name)
        #[arg(short, long, value_name = "ID")]
        repo: Option<String>,

        /// Number of incremental chunks to keep
        #[arg(long, default_value = "30")]
        keep: u64,
    },
}
