//! Command-line arguments.

use anyhow::{Context, Result};
use clap::Parser;
use dockprobe_scenario::ProbeConfig;
use std::path::PathBuf;

/// Run the container lifecycle probe against a Docker-compatible daemon
#[derive(Debug, Parser)]
#[command(name = "dockprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "DOCKPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Daemon control socket
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Image archive to load
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Per-operation timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Loads the configuration and applies flag overrides.
    pub fn resolve_config(&self) -> Result<ProbeConfig> {
        let config = ProbeConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;
        Ok(self.apply(config))
    }

    fn apply(&self, mut config: ProbeConfig) -> ProbeConfig {
        if let Some(socket) = &self.socket {
            config.socket_path.clone_from(socket);
        }
        if let Some(archive) = &self.archive {
            config.image_archive.clone_from(archive);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config
    }
}
