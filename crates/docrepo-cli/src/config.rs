use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docrepo_repository::{EmptyBatchPolicy, RepositoryConfig};

/// Configuration for the docrepo CLI.
#[derive(Parser, Debug, Clone)]
#[command(name = "docrepo")]
#[command(about = "Inspect and watch a document collection held in an in-memory store")]
pub struct Config {
    /// JSON seed file: { "<collection>": { "<id>": { ...fields } } }
    #[arg(long, env = "DOCREPO_SEED")]
    pub seed: Option<PathBuf>,

    /// Collection path to operate on
    #[arg(long, default_value = "documents", env = "DOCREPO_COLLECTION")]
    pub collection: String,

    /// Log every repository operation
    #[arg(long, env = "DOCREPO_DEBUG")]
    pub debug: bool,

    /// What batch writes do with zero items
    #[arg(long, default_value = "accept", env = "DOCREPO_EMPTY_BATCH")]
    pub empty_batch: EmptyBatch,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Settings for the repository built from this configuration.
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            debug: self.debug,
            empty_batch: match self.empty_batch {
                EmptyBatch::Accept => EmptyBatchPolicy::Accept,
                EmptyBatch::Reject => EmptyBatchPolicy::Reject,
            },
        }
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print whether a document exists
    Exists { id: String },

    /// Print one document as JSON, or null
    Get { id: String },

    /// Print every document of the collection as a JSON array
    List,

    /// Print live updates while applying writes read from stdin
    ///
    /// Stdin lines: `set <id> <json>`, `update <id> <json>`, `delete <id>`.
    Watch {
        /// Watch a single document instead of the whole collection
        #[arg(long)]
        id: Option<String>,

        /// Stop after this many updates
        #[arg(long)]
        ticks: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmptyBatch {
    Accept,
    Reject,
}

impl std::fmt::Display for EmptyBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyBatch::Accept => write!(f, "accept"),
            EmptyBatch::Reject => write!(f, "reject"),
        }
    }
}
