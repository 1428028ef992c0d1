//! ontograph - incremental graph import
//!
//! Reconciles schema documents and CSV record directories into Neo4j.

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Initialize tracing, optionally mirroring to a log file.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(verbose: bool, log_file: Option<&std::path::Path>) -> Option<WorkerGuard> {
    let default_filter = if verbose {
        "ontograph=debug,ontograph_graph=debug,ontograph_core=debug"
    } else {
        "ontograph=info,ontograph_graph=info,ontograph_core=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // Human output goes to stdout; logs stay on stderr.
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "ontograph.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref());

    let code = cli.execute().await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
