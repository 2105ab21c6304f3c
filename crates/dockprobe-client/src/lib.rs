//! # dockprobe-client
//!
//! A deliberately small Docker Engine API client.
//!
//! - [`DaemonClient`]: issues HTTP/1.1 requests over one connection opened
//!   by a [`Dialer`](dockprobe_transport::Dialer), normally a Unix socket.
//! - [`ApiResponse`]: status, headers and a body that is read from the
//!   connection once and cached for every later access.
//! - [`logs`]: splits the multiplexed `/containers/{id}/logs` stream into
//!   stdout and stderr.
//!
//! Status codes are reported, never judged: a 404 or 500 is a successful
//! exchange at this layer.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod logs;
pub mod response;

pub use client::{DaemonClient, RequestBody};
pub use error::{ClientError, Result};
pub use logs::{Channel, DemuxedLogs, ProtocolError, RawLogs, demux_logs, demux_raw};
pub use response::ApiResponse;

pub use bytes::Bytes;
pub use hyper::{HeaderMap, Method, StatusCode, header};
