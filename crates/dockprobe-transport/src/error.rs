//! Error types for transport operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while dialing the daemon.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be reached.
    ///
    /// Covers a missing path, a path that is not a socket, a refused
    /// connection and a connect that did not finish within the timeout.
    #[error("unable to connect to '{}': is the docker daemon running?", path.display())]
    Connect {
        /// Socket path that was dialed.
        path: PathBuf,
        /// Underlying system error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates a connect error for the given path.
    #[must_use]
    pub fn connect(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Connect {
            path: path.into(),
            source,
        }
    }

    /// Returns the underlying I/O error kind.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Connect { source, .. } => source.kind(),
        }
    }
}
