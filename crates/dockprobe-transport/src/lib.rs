//! # dockprobe-transport
//!
//! Dial strategies for the probe's HTTP client.
//!
//! The request/response engine in `dockprobe-client` speaks HTTP/1.1 over
//! any bidirectional byte stream. A [`Dialer`] decides where that stream
//! comes from; [`UnixDialer`] opens it on a filesystem socket path instead
//! of a host and port.
//!
//! ```text
//! ┌──────────────────┐  dial()  ┌──────────────┐
//! │  DaemonClient    │ ───────► │  UnixDialer  │
//! │  (hyper http1)   │ ◄─────── │              │
//! └──────────────────┘  stream  └──────┬───────┘
//!                                      │
//!                                      ▼
//!                           /var/run/docker.sock
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod unix;

pub use error::{Result, TransportError};
pub use unix::{DEFAULT_SOCKET_PATH, DEFAULT_TIMEOUT, UnixDialer};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Strategy for opening the byte stream a client sends requests over.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// The connected stream type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Opens a new connection to the target.
    async fn dial(&self) -> Result<Self::Stream>;

    /// Human-readable description of the target, used in diagnostics.
    fn target(&self) -> String;
}
