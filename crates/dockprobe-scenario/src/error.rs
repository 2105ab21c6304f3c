//! Error types for the scenario runner.

use crate::fixtures::ImageId;
use dockprobe_client::{ClientError, ProtocolError, StatusCode};
use std::fmt;
use thiserror::Error;

/// Result type alias for scenario operations.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// A response carried an unexpected status code.
#[derive(Debug, Clone, Error)]
#[error("{request} returned http status {actual} instead of expected {}.\nBody:\n{body}", ExpectedStatus(.expected))]
pub struct StatusAssertionError {
    /// Verb and path of the offending request.
    pub request: String,
    /// Status the daemon returned.
    pub actual: StatusCode,
    /// Statuses that would have been accepted.
    pub expected: Vec<StatusCode>,
    /// Response body, lossily decoded.
    pub body: String,
}

struct ExpectedStatus<'a>(&'a [StatusCode]);

impl fmt::Display for ExpectedStatus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, status) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            write!(f, "{status}")?;
        }
        Ok(())
    }
}

/// A provisioning response did not contain the identifier it should have.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No `Loaded image ID: sha256:<hex>` line in the image load output.
    #[error("{request} did not report a loaded image ID; output was:\n{output}")]
    MissingImageId {
        /// Verb and path of the load request.
        request: String,
        /// Response body, lossily decoded.
        output: String,
    },

    /// The daemon reported an error inside a successful load response.
    #[error("{request} reported an error: {message}")]
    LoadFailed {
        /// Verb and path of the load request.
        request: String,
        /// Daemon's error message.
        message: String,
    },

    /// The create response had an empty container ID.
    #[error("{request} returned an empty container ID")]
    MissingContainerId {
        /// Verb and path of the create request.
        request: String,
    },

    /// A step after the image load failed; the image is left on the daemon.
    #[error("provisioning failed after image {image_id} was loaded; the image was not removed: {source}")]
    ImageLeaked {
        /// Image that was loaded and not cleaned up.
        image_id: ImageId,
        /// The failure.
        #[source]
        source: Box<ScenarioError>,
    },
}

/// The container's output did not match the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Something was written to stderr.
    #[error("expected empty stderr, got:\n{0}")]
    UnexpectedStderr(String),

    /// Nothing was written to stdout.
    #[error("stdout is empty")]
    EmptyStdout,

    /// The first stdout line is not the startup banner.
    #[error("first stdout line is {actual:?}, expected {expected:?}")]
    StartupBanner {
        /// Expected line.
        expected: String,
        /// Line found.
        actual: String,
    },

    /// The last stdout line is not the shutdown banner.
    #[error("last stdout line is {actual:?}, expected {expected:?}")]
    ShutdownBanner {
        /// Expected line.
        expected: String,
        /// Line found.
        actual: String,
    },
}

/// A teardown step failed or left resources behind.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// A teardown request failed.
    #[error("teardown step '{step}' failed: {source}")]
    Step {
        /// Which step.
        step: &'static str,
        /// The failure.
        #[source]
        source: Box<ScenarioError>,
    },

    /// Resources from this run are still listed by the daemon.
    #[error("resources still present after teardown: {}", .ids.join(", "))]
    Leftovers {
        /// IDs still listed.
        ids: Vec<String>,
    },
}

/// Errors that abort a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Transport or HTTP failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Unexpected status code.
    #[error(transparent)]
    Status(#[from] StatusAssertionError),

    /// Malformed log stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Missing identifier in a provisioning response.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Output mismatch.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Cleanup failure.
    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

impl ScenarioError {
    /// Returns the status assertion behind this error, if any.
    #[must_use]
    pub const fn as_status(&self) -> Option<&StatusAssertionError> {
        match self {
            Self::Status(e) => Some(e),
            _ => None,
        }
    }
}
