//! A stateful in-process daemon on a Unix socket.
//!
//! Implements just enough of the Engine API for one scenario run: image
//! load, container create/start/stop/inspect/logs/delete, image delete and
//! the two listings. Failures are injected through [`Faults`].

#![allow(dead_code)]

use bytes::Bytes;
use dockprobe_client::Channel;
use dockprobe_client::logs::encode_frame;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub const IMAGE_ID: &str =
    "sha256:5d3c4b1a0f9e8d7c6b5a4f3e2d1c0b9a8f7e6d5c4b3a2f1e0d9c8b7a6f5e4d3c";
pub const CONTAINER_ID: &str =
    "f00dfacecafe0123456789abcdef0123456789abcdef0123456789abcdef0123";

/// Failures the daemon should produce.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `/containers/create` answers 500.
    pub fail_create: bool,
    /// Number of stop requests answered with 500 before stops succeed.
    pub failing_stops: usize,
    /// `DELETE /containers/{id}` answers 500.
    pub fail_container_delete: bool,
    /// Replaces the image load response body.
    pub load_reply: Option<String>,
    /// `GET /containers/{id}/json` answers 500.
    pub fail_inspect: bool,
    /// Replaces the framed log stream with these bytes.
    pub raw_logs: Option<Vec<u8>>,
}

/// A request as seen by the daemon.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// `"VERB /path?query"`.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.uri)
    }
}

#[derive(Debug, Default)]
struct State {
    faults: Faults,
    log_frames: Vec<u8>,
    images: Vec<String>,
    container: Option<bool>,
    requests: Vec<RecordedRequest>,
}

/// Running fake daemon.
pub struct FakeDaemon {
    _dir: TempDir,
    path: PathBuf,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl FakeDaemon {
    /// Starts a daemon whose container prints `output` as `(channel, line)` frames.
    pub fn start(output: &[(Channel, &str)], faults: Faults) -> Self {
        let log_frames = faults.raw_logs.clone().unwrap_or_else(|| {
            output
                .iter()
                .flat_map(|(channel, line)| encode_frame(*channel, line.as_bytes()).unwrap())
                .collect()
        });
        let state = Arc::new(Mutex::new(State {
            faults,
            log_frames,
            ..State::default()
        }));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&shared);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await?.to_bytes();
                            let request = RecordedRequest {
                                method: parts.method,
                                uri: parts.uri.to_string(),
                                headers: parts.headers,
                                body,
                            };
                            let mut state = state.lock().unwrap();
                            let response = handle(&mut state, &request);
                            state.requests.push(request);
                            Ok::<_, hyper::Error>(response)
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            _dir: dir,
            path,
            state,
            task,
        }
    }

    /// The well-behaved daemon running the well-known image.
    pub fn hello() -> Self {
        Self::start(
            &[
                (Channel::Stdout, "Hello Gravitational!\n"),
                (Channel::Stdout, "Terminated. Bye!\n"),
            ],
            Faults::default(),
        )
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Request lines in arrival order.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(RecordedRequest::line).collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn has_image(&self) -> bool {
        !self.state.lock().unwrap().images.is_empty()
    }

    pub fn has_container(&self) -> bool {
        self.state.lock().unwrap().container.is_some()
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn reply(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    reply(status, json!({ "message": message }).to_string())
}

fn handle(state: &mut State, request: &RecordedRequest) -> Response<Full<Bytes>> {
    let path = request.uri.split('?').next().unwrap_or_default();
    let container_path = format!("/containers/{CONTAINER_ID}");
    let image_path = format!("/images/{IMAGE_ID}");

    match (&request.method, path) {
        (&Method::POST, "/images/load") => {
            state.images.push(IMAGE_ID.to_string());
            let body = state.faults.load_reply.clone().unwrap_or_else(|| {
                format!(
                    "{}\n",
                    json!({ "stream": format!("Loaded image ID: {IMAGE_ID}\n") })
                )
            });
            reply(StatusCode::OK, body)
        }
        (&Method::POST, "/containers/create") => {
            if state.faults.fail_create {
                return error(StatusCode::INTERNAL_SERVER_ERROR, "no space left on device");
            }
            state.container = Some(false);
            reply(
                StatusCode::CREATED,
                json!({ "Id": CONTAINER_ID, "Warnings": [] }).to_string(),
            )
        }
        (&Method::GET, "/containers/json") => {
            let list: Vec<_> = state
                .container
                .iter()
                .map(|_| json!({ "Id": CONTAINER_ID }))
                .collect();
            reply(StatusCode::OK, serde_json::to_vec(&list).unwrap())
        }
        (&Method::GET, "/images/json") => {
            let list: Vec<_> = state.images.iter().map(|id| json!({ "Id": id })).collect();
            reply(StatusCode::OK, serde_json::to_vec(&list).unwrap())
        }
        (method, p) if p.starts_with(&container_path) => {
            let Some(running) = state.container else {
                return error(StatusCode::NOT_FOUND, "No such container");
            };
            match (method, &p[container_path.len()..]) {
                (&Method::POST, "/start") => {
                    state.container = Some(true);
                    reply(StatusCode::NO_CONTENT, "")
                }
                (&Method::POST, "/stop") => {
                    if state.faults.failing_stops > 0 {
                        state.faults.failing_stops -= 1;
                        return error(StatusCode::INTERNAL_SERVER_ERROR, "cannot stop container");
                    }
                    state.container = Some(false);
                    reply(StatusCode::NO_CONTENT, "")
                }
                (&Method::GET, "/logs") => reply(StatusCode::OK, state.log_frames.clone()),
                (&Method::GET, "/json") => {
                    if state.faults.fail_inspect {
                        return error(StatusCode::INTERNAL_SERVER_ERROR, "inspect unavailable");
                    }
                    let status = if running { "running" } else { "exited" };
                    reply(
                        StatusCode::OK,
                        json!({
                            "Id": CONTAINER_ID,
                            "State": { "Running": running, "Status": status },
                        })
                        .to_string(),
                    )
                }
                (&Method::DELETE, "") => {
                    if state.faults.fail_container_delete {
                        return error(StatusCode::INTERNAL_SERVER_ERROR, "driver failed");
                    }
                    if running {
                        return error(StatusCode::CONFLICT, "container is running");
                    }
                    state.container = None;
                    reply(StatusCode::NO_CONTENT, "")
                }
                _ => error(StatusCode::NOT_FOUND, "page not found"),
            }
        }
        (&Method::DELETE, p) if p == image_path => {
            if state.container.is_some() {
                return error(StatusCode::CONFLICT, "image is being used by a container");
            }
            state.images.clear();
            reply(
                StatusCode::OK,
                json!([{ "Deleted": IMAGE_ID }]).to_string(),
            )
        }
        _ => error(StatusCode::NOT_FOUND, "page not found"),
    }
}
