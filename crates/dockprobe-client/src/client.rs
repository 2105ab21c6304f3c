//! Daemon client.
//!
//! One [`DaemonClient`] owns exactly one HTTP/1.1 connection. Requests are
//! sent one at a time; there is no pooling and no reconnect.

use crate::error::{ClientError, Result};
use crate::response::ApiResponse;
use bytes::Bytes;
use dockprobe_transport::{Dialer, UnixDialer};
use http_body_util::Full;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{CONTENT_TYPE, HOST, HeaderValue};
use hyper::http::uri::PathAndQuery;
use hyper::{HeaderMap, Method, Request, Uri};
use hyper_util::rt::TokioIo;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Bytes sent as-is. The caller supplies `Content-Type` and `Content-Length`.
    Raw(Bytes),
    /// A structured value serialized to JSON before sending.
    Json(serde_json::Value),
}

impl RequestBody {
    fn into_payload(self, request: &str) -> Result<(Bytes, bool)> {
        match self {
            Self::Empty => Ok((Bytes::new(), false)),
            Self::Raw(bytes) => Ok((bytes, false)),
            Self::Json(value) => serde_json::to_vec(&value)
                .map(|encoded| (Bytes::from(encoded), true))
                .map_err(|source| ClientError::Encode {
                    request: request.to_string(),
                    source,
                }),
        }
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(Bytes::from(bytes))
    }
}

impl From<()> for RequestBody {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// Client for the Docker Engine API.
pub struct DaemonClient {
    target: String,
    timeout: Duration,
    sender: SendRequest<Full<Bytes>>,
    connection: JoinHandle<()>,
}

impl DaemonClient {
    /// Connects to the daemon listening on a Unix socket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if the socket cannot be reached.
    pub async fn connect(socket_path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::connect_with(&UnixDialer::new(socket_path, timeout), timeout).await
    }

    /// Connects using the given dial strategy.
    ///
    /// `timeout` bounds each later request/response exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if dialing or the HTTP/1 handshake fails.
    pub async fn connect_with<D: Dialer>(dialer: &D, timeout: Duration) -> Result<Self> {
        let target = dialer.target();
        let stream = dialer.dial().await?;

        let (sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|source| ClientError::Handshake {
                target: target.clone(),
                source,
            })?;

        let socket = target.clone();
        let connection = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(socket = %socket, "daemon connection closed: {}", e);
            }
        });

        tracing::debug!(socket = %target, "client connected");
        Ok(Self {
            target,
            timeout,
            sender,
            connection,
        })
    }

    /// Returns the dial target this client is connected to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the per-exchange timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs a GET request.
    ///
    /// # Errors
    ///
    /// See [`DaemonClient::request`].
    pub async fn get(&mut self, path: &str, headers: HeaderMap) -> Result<ApiResponse> {
        self.request(Method::GET, path, RequestBody::Empty, headers)
            .await
    }

    /// Performs a POST request.
    ///
    /// # Errors
    ///
    /// See [`DaemonClient::request`].
    pub async fn post(
        &mut self,
        path: &str,
        body: impl Into<RequestBody>,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        self.request(Method::POST, path, body.into(), headers).await
    }

    /// Sends a request and waits for the response head.
    ///
    /// The returned response has not read its body yet. The connection
    /// carries one exchange at a time, so read or drop the body before
    /// sending the next request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPath`] for a path that is not an
    /// absolute API path and [`ClientError::Request`] if the exchange fails
    /// or times out.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        let path_and_query = parse_path(path)?;
        let label = format!("{method} {path}");
        let (payload, is_json) = body.into_payload(&label)?;

        let mut request = Request::new(Full::new(payload));
        *request.method_mut() = method;
        *request.uri_mut() = Uri::from(path_and_query);
        let request_headers = request.headers_mut();
        request_headers.extend(headers);
        request_headers
            .entry(HOST)
            .or_insert(HeaderValue::from_static("localhost"));
        if is_json {
            request_headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
        }

        tracing::debug!(request = %label, "sending request");

        let sender = &mut self.sender;
        let exchange = async move {
            sender.ready().await?;
            sender.send_request(request).await
        };
        let outcome = tokio::time::timeout(self.timeout, exchange).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.request_error(&label, io::Error::other(e))),
            Err(_) => return Err(self.request_error(&label, timed_out(self.timeout))),
        };

        let (parts, incoming) = response.into_parts();
        tracing::debug!(request = %label, status = %parts.status, "received response");

        Ok(ApiResponse::new(
            label,
            self.target.clone(),
            self.timeout,
            parts.status,
            parts.headers,
            incoming,
        ))
    }

    fn request_error(&self, request: &str, source: io::Error) -> ClientError {
        ClientError::Request {
            request: request.to_string(),
            target: self.target.clone(),
            source,
        }
    }
}

impl Drop for DaemonClient {
    fn drop(&mut self) {
        // Dropping the driver closes the socket.
        self.connection.abort();
    }
}

impl std::fmt::Debug for DaemonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonClient")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn parse_path(path: &str) -> Result<PathAndQuery> {
    let invalid = |reason: &str| ClientError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    path.parse::<PathAndQuery>()
        .map_err(|e| invalid(&e.to_string()))
}

pub(crate) fn timed_out(timeout: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no response within {timeout:?}"),
    )
}
