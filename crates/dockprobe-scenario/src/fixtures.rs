//! Scenario descriptor and resource identifiers.

use bytes::Bytes;
use std::fmt;

/// Prefix of the image load result line.
pub const LOADED_IMAGE_PREFIX: &str = "Loaded image ID: ";

/// Digest algorithm prefix of a content-hash image ID.
const SHA256_PREFIX: &str = "sha256:";

/// Hex length of a SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// First line printed by the well-known image.
pub const STARTUP_BANNER: &str = "Hello Gravitational!";

/// Last line printed by the well-known image when stopped.
pub const SHUTDOWN_BANNER: &str = "Terminated. Bye!";

/// Content-hash image identifier, `sha256:<64 lowercase hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(String);

impl ImageId {
    /// Parses an image ID, accepting only the exact content-hash format.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix(SHA256_PREFIX)?;
        let valid = hex.len() == SHA256_HEX_LEN
            && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    /// Finds the `Loaded image ID: sha256:<hex>` line in image load output.
    #[must_use]
    pub fn from_load_output(output: &str) -> Option<Self> {
        output.lines().find_map(|line| {
            let rest = line.trim_end().strip_prefix(LOADED_IMAGE_PREFIX)?;
            let candidate = rest.get(..SHA256_PREFIX.len() + SHA256_HEX_LEN)?;
            Self::parse(candidate)
        })
    }

    /// Returns the full ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque container identifier assigned by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wraps a container ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to run and what to expect from it.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Name used in logs and reports.
    pub name: String,
    /// Image archive (tar) submitted to `/images/load`.
    pub image_archive: Bytes,
    /// Expected first stdout line.
    pub startup_banner: String,
    /// Expected last stdout line.
    pub shutdown_banner: String,
}

impl Scenario {
    /// The well-known image scenario: the container greets on start and
    /// says goodbye when stopped.
    #[must_use]
    pub fn hello_gravitational(image_archive: impl Into<Bytes>) -> Self {
        Self {
            name: "hello-gravitational".to_string(),
            image_archive: image_archive.into(),
            startup_banner: STARTUP_BANNER.to_string(),
            shutdown_banner: SHUTDOWN_BANNER.to_string(),
        }
    }
}
