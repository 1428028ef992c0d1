//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ontograph_graph::{normalize_uri, GraphConfig};
use std::path::PathBuf;

pub mod import;
pub mod status;

/// Incremental graph import for Neo4j
#[derive(Parser)]
#[command(name = "ontograph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Neo4j connection overrides. Unset values fall back to `NEO4J_*`
/// environment variables, then to local defaults.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Bolt URI (an http:// browser URL is rewritten to bolt)
    #[arg(long = "neo4j-uri", global = true)]
    pub uri: Option<String>,

    #[arg(long = "neo4j-user", global = true)]
    pub user: Option<String>,

    #[arg(long = "neo4j-password", global = true)]
    pub password: Option<String>,

    #[arg(long = "neo4j-database", global = true)]
    pub database: Option<String>,
}

impl ConnectionArgs {
    pub fn config(&self) -> GraphConfig {
        let mut config = GraphConfig::from_env();
        if let Some(uri) = &self.uri {
            config.uri = normalize_uri(uri);
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a schema document or CSV directory
    Import(import::ImportArgs),

    /// Show node and relationship totals of the connected store
    Status,
}

impl Cli {
    /// Run the selected command and return the process exit code.
    pub async fn execute(self) -> Result<i32> {
        match self.command {
            Commands::Import(args) => import::execute(args, &self.connection).await,
            Commands::Status => status::execute(&self.connection).await.map(|_| 0),
        }
    }
}
