//! dockprobe - container lifecycle probe for Docker-compatible daemons.

use anyhow::{Context, Result};
use clap::Parser;
use dockprobe_client::DaemonClient;
use dockprobe_scenario::{Scenario, run_scenario};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod report;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "dockprobe=debug,dockprobe_client=debug,dockprobe_scenario=debug,dockprobe_transport=debug"
    } else {
        "dockprobe=info,dockprobe_scenario=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match probe(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the scenario and prints the report. Returns whether it passed.
async fn probe(cli: Cli) -> Result<bool> {
    let config = cli.resolve_config()?;
    tracing::debug!(?config, "configuration loaded");

    let archive = tokio::fs::read(&config.image_archive)
        .await
        .with_context(|| {
            format!(
                "failed to read image archive {}",
                config.image_archive.display()
            )
        })?;

    let mut client = DaemonClient::connect(&config.socket_path, config.timeout())
        .await
        .context("failed to reach the daemon")?;

    let scenario = Scenario::hello_gravitational(archive);
    let run = run_scenario(&mut client, &scenario).await;

    print!("{}", report::render(&run));
    Ok(run.is_success())
}
