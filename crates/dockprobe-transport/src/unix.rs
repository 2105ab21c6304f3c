//! Unix domain socket dialer.

use crate::Dialer;
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;

/// Well-known path of the Docker Engine API socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Default bound on connect and on each request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials a Unix stream socket at a fixed filesystem path.
#[derive(Debug, Clone)]
pub struct UnixDialer {
    path: PathBuf,
    timeout: Duration,
}

impl UnixDialer {
    /// Creates a dialer for the given socket path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Returns the socket path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check_socket(&self) -> io::Result<()> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        if metadata.file_type().is_socket() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path exists but is not a socket",
            ))
        }
    }
}

impl Default for UnixDialer {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH, DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Dialer for UnixDialer {
    type Stream = UnixStream;

    async fn dial(&self) -> Result<UnixStream> {
        self.check_socket()
            .await
            .map_err(|e| TransportError::connect(&self.path, e))?;

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.path))
            .await
            .map_err(|_| {
                TransportError::connect(
                    &self.path,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect timed out after {:?}", self.timeout),
                    ),
                )
            })?
            .map_err(|e| TransportError::connect(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "connected to daemon socket");
        Ok(stream)
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }
}
