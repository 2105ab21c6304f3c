//! Error types for API client operations.

use dockprobe_transport::TransportError;
use std::io;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the daemon.
///
/// A response with a non-2xx status is not an error here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon socket could not be reached.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// The HTTP/1 connection could not be set up over the dialed stream.
    #[error("HTTP handshake with '{target}' failed: {source}")]
    Handshake {
        /// Dial target.
        target: String,
        /// Underlying hyper error.
        #[source]
        source: hyper::Error,
    },

    /// The request path is not an absolute API path.
    #[error("invalid API path '{path}': {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// I/O failure or timeout while sending a request or reading its response.
    #[error("failure during '{request}' request to '{target}': {source}")]
    Request {
        /// Verb and path, e.g. `POST /containers/create`.
        request: String,
        /// Dial target.
        target: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A JSON body could not be serialized.
    #[error("failed to serialize body for '{request}': {source}")]
    Encode {
        /// Verb and path.
        request: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// A response body was not the JSON the caller asked for.
    #[error("'{request}' returned a body that could not be decoded: {source}")]
    Decode {
        /// Verb and path.
        request: String,
        /// Deserializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Returns true if the daemon could not be reached at all.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the I/O error kind for transport-level failures.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Connection(e) => Some(e.kind()),
            Self::Request { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
