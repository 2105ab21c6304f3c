//! API responses with a read-once, cached body.

use crate::client::timed_out;
use crate::error::{ClientError, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::io;
use std::time::Duration;

enum BodyState {
    Pending(Incoming),
    Cached(Bytes),
    Lost,
}

/// A response from the daemon.
///
/// The body is pulled off the connection the first time any body accessor
/// is called and kept in memory afterwards, so [`body`](Self::body),
/// [`text`](Self::text) and [`json`](Self::json) can be mixed and repeated.
pub struct ApiResponse {
    request: String,
    target: String,
    timeout: Duration,
    status: StatusCode,
    headers: HeaderMap,
    body: BodyState,
}

impl ApiResponse {
    pub(crate) const fn new(
        request: String,
        target: String,
        timeout: Duration,
        status: StatusCode,
        headers: HeaderMap,
        incoming: Incoming,
    ) -> Self {
        Self {
            request,
            target,
            timeout,
            status,
            headers,
            body: BodyState::Pending(incoming),
        }
    }

    /// Verb and path of the request that produced this response.
    #[must_use]
    pub fn request(&self) -> &str {
        &self.request
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body if it has already been read.
    #[must_use]
    pub fn cached_body(&self) -> Option<&Bytes> {
        match &self.body {
            BodyState::Cached(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the raw body, reading it from the connection on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] if the body cannot be read, and on
    /// every later call after such a failure.
    pub async fn body(&mut self) -> Result<&Bytes> {
        if matches!(self.body, BodyState::Pending(_)) {
            if let BodyState::Pending(incoming) =
                std::mem::replace(&mut self.body, BodyState::Lost)
            {
                let bytes = self.read_incoming(incoming).await?;
                tracing::trace!(request = %self.request, len = bytes.len(), "response body cached");
                self.body = BodyState::Cached(bytes);
            }
        }

        match &self.body {
            BodyState::Cached(bytes) => Ok(bytes),
            BodyState::Pending(_) | BodyState::Lost => Err(ClientError::Request {
                request: self.request.clone(),
                target: self.target.clone(),
                source: io::Error::other("response body was lost by an earlier failed read"),
            }),
        }
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// See [`ApiResponse::body`].
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.body().await?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if the body is not valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.body().await?.clone();
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            request: self.request.clone(),
            source,
        })
    }

    async fn read_incoming(&self, incoming: Incoming) -> Result<Bytes> {
        let error = |source: io::Error| ClientError::Request {
            request: self.request.clone(),
            target: self.target.clone(),
            source,
        };

        match tokio::time::timeout(self.timeout, incoming.collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) => Err(error(io::Error::other(e))),
            Err(_) => Err(error(timed_out(self.timeout))),
        }
    }
}

impl std::fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResponse")
            .field("request", &self.request)
            .field("status", &self.status)
            .field("cached", &self.cached_body().map(Bytes::len))
            .finish_non_exhaustive()
    }
}
