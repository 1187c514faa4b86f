use anyhow::Result;
use clap::Parser;

use syslog_viewer_daemon::cli::DaemonCli;
use syslog_viewer_daemon::logging;
use syslog_viewer_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.resolve_config().await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "syslog-viewer-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("syslog-viewer-daemon shut down");
    Ok(())
}
