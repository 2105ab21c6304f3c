//! Probe configuration.
//!
//! Loaded from, in increasing priority:
//!
//! 1. Default values
//! 2. An optional TOML file
//! 3. Environment variables (`DOCKPROBE_*`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! socket_path = "/var/run/docker.sock"
//! timeout_secs = 10
//! image_archive = "fixtures/hello-gravitational.tar"
//! ```

use dockprobe_transport::{DEFAULT_SOCKET_PATH, DEFAULT_TIMEOUT};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DOCKPROBE_";

/// Probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Daemon control socket.
    pub socket_path: PathBuf,
    /// Per-operation timeout in seconds.
    pub timeout_secs: u64,
    /// Image archive loaded by the scenario.
    pub image_archive: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            image_archive: PathBuf::from("hello-gravitational.tar"),
        }
    }
}

impl ProbeConfig {
    /// Loads configuration from defaults, `file` if given, and the environment.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or has the wrong shape.
    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    /// Per-operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
