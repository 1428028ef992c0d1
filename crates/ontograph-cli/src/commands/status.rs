//! Store status command.

use anyhow::Result;
use colored::Colorize;
use ontograph_graph::{GraphClient, GraphStore};

use super::ConnectionArgs;

pub async fn execute(connection: &ConnectionArgs) -> Result<()> {
    let config = connection.config();
    let client = GraphClient::connect(&config).await?;
    let counts = client.totals().await?;

    println!("{}", "Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  URI:           {}", config.uri.dimmed());
    println!("  Database:      {}", config.database);
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());
    println!("{}", "─".repeat(40));

    Ok(())
}
