//! Four-phase scenario runner.
//!
//! ```text
//! Provision ──► Execute ──► Verify ──► Teardown ──► leftover check
//!     │            │           │           ▲
//!     │            └───────────┴───────────┘  (teardown runs on failure too)
//!     └──► stop (nothing is rolled back)
//! ```

use crate::api::{ContainerInspect, CreateContainerResponse, LoadImageMessage, ResourceSummary};
use crate::assertions::{assert_status, verify_output};
use crate::error::{ProvisionError, Result, ScenarioError, TeardownError};
use crate::fixtures::{ContainerId, ImageId, Scenario};
use dockprobe_client::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use dockprobe_client::{
    DaemonClient, DemuxedLogs, HeaderMap, Method, RawLogs, RequestBody, StatusCode, demux_logs,
};
use std::fmt;

const LOAD_IMAGE_PATH: &str = "/images/load?fromSrc=-";
const CREATE_CONTAINER_PATH: &str = "/containers/create";
const LIST_CONTAINERS_PATH: &str = "/containers/json?all=true";
const LIST_IMAGES_PATH: &str = "/images/json";

/// Scenario phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Load the image and create the container.
    Provision,
    /// Start, stop and collect logs.
    Execute,
    /// Check the collected output.
    Verify,
    /// Remove what provisioning created.
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Provision => "provision",
            Self::Execute => "execute",
            Self::Verify => "verify",
            Self::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Daemon resources created by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    /// Loaded image.
    pub image_id: Option<ImageId>,
    /// Created container.
    pub container_id: Option<ContainerId>,
}

/// Outcome of the teardown phase.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Container state seen by the inspect step, if it succeeded.
    pub was_running: Option<bool>,
    /// Failed steps and leftovers, in the order they were found.
    pub errors: Vec<TeardownError>,
}

impl TeardownReport {
    /// Returns `true` if every step succeeded and nothing was left behind.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, step: &'static str, error: ScenarioError) {
        tracing::warn!(step, error = %error, "teardown step failed");
        self.errors.push(TeardownError::Step {
            step,
            source: Box::new(error),
        });
    }
}

/// Everything observed during one scenario run.
#[derive(Debug)]
pub struct ScenarioRun {
    /// Scenario name.
    pub scenario: String,
    /// Phases entered, in order.
    pub phases: Vec<Phase>,
    /// Resources created by provisioning.
    pub resources: Resources,
    /// Demultiplexed container output, if it was collected.
    pub logs: Option<DemuxedLogs>,
    /// Output recovered from a malformed log stream, up to the bad frame.
    pub partial_logs: Option<RawLogs>,
    /// Phase that failed, if any.
    pub failed_phase: Option<Phase>,
    /// First failure outside teardown.
    pub failure: Option<ScenarioError>,
    /// Teardown outcome; `None` when provisioning failed.
    pub teardown: Option<TeardownReport>,
}

impl ScenarioRun {
    fn new(scenario: &Scenario) -> Self {
        Self {
            scenario: scenario.name.clone(),
            phases: Vec::new(),
            resources: Resources::default(),
            logs: None,
            partial_logs: None,
            failed_phase: None,
            failure: None,
            teardown: None,
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!(scenario = %self.scenario, phase = %phase, "entering phase");
        self.phases.push(phase);
    }

    fn fail(&mut self, phase: Phase, error: ScenarioError) {
        tracing::error!(scenario = %self.scenario, phase = %phase, error = %error, "phase failed");
        self.failed_phase = Some(phase);
        self.failure = Some(error);
    }

    /// Returns `true` if every phase passed and teardown was clean.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.teardown.as_ref().is_some_and(TeardownReport::is_clean)
    }

    /// Converts the run into its first error.
    ///
    /// # Errors
    ///
    /// Returns the phase failure if there was one, otherwise the first
    /// teardown error.
    pub fn into_result(self) -> Result<()> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        match self.teardown.and_then(|report| report.errors.into_iter().next()) {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// Runs `scenario` against the daemon behind `client`.
///
/// Never returns early with an error: the returned [`ScenarioRun`] records
/// which phases ran, what they produced and what went wrong.
pub async fn run_scenario(client: &mut DaemonClient, scenario: &Scenario) -> ScenarioRun {
    let mut run = ScenarioRun::new(scenario);

    run.enter(Phase::Provision);
    let container_id = match provision(client, scenario, &mut run.resources).await {
        Ok(container_id) => container_id,
        Err(e) => {
            run.fail(Phase::Provision, e);
            return run;
        }
    };

    run.enter(Phase::Execute);
    match execute(client, &container_id).await {
        Ok(logs) => {
            run.enter(Phase::Verify);
            if let Err(e) = verify_output(&logs, scenario) {
                run.fail(Phase::Verify, e.into());
            }
            run.logs = Some(logs);
        }
        Err(e) => {
            if let ScenarioError::Protocol(protocol) = &e {
                run.partial_logs = Some(protocol.partial().clone());
            }
            run.fail(Phase::Execute, e);
        }
    }

    run.enter(Phase::Teardown);
    let report = teardown(client, &run.resources).await;
    if report.is_clean() {
        tracing::info!(scenario = %run.scenario, "teardown complete");
    }
    run.teardown = Some(report);
    run
}

// ============================================================================
// Provision
// ============================================================================

async fn provision(
    client: &mut DaemonClient,
    scenario: &Scenario,
    resources: &mut Resources,
) -> Result<ContainerId> {
    let image_id = load_image(client, scenario).await?;
    tracing::info!(image_id = %image_id, "image loaded");
    resources.image_id = Some(image_id.clone());

    match create_container(client, &image_id).await {
        Ok(container_id) => {
            tracing::info!(container_id = %container_id, "container created");
            resources.container_id = Some(container_id.clone());
            Ok(container_id)
        }
        Err(source) => {
            tracing::warn!(
                image_id = %image_id,
                "provisioning failed after the image was loaded; the image is left on the daemon"
            );
            Err(ProvisionError::ImageLeaked {
                image_id,
                source: Box::new(source),
            }
            .into())
        }
    }
}

async fn load_image(client: &mut DaemonClient, scenario: &Scenario) -> Result<ImageId> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/tar"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(scenario.image_archive.len()));

    let mut response = client
        .post(LOAD_IMAGE_PATH, scenario.image_archive.clone(), headers)
        .await?;
    assert_status(&mut response, &[StatusCode::OK, StatusCode::CREATED]).await?;
    let output = response.text().await?;
    Ok(parse_load_output(response.request(), &output)?)
}

/// Extracts the image ID from an `/images/load` response body.
///
/// The body is a sequence of JSON messages, one per line; lines that are
/// not JSON are searched as plain text.
fn parse_load_output(request: &str, output: &str) -> std::result::Result<ImageId, ProvisionError> {
    let mut text = String::new();
    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<LoadImageMessage>(line) {
            Ok(LoadImageMessage {
                error: Some(message),
                ..
            }) => {
                return Err(ProvisionError::LoadFailed {
                    request: request.to_string(),
                    message,
                });
            }
            Ok(message) => {
                if let Some(stream) = message.stream {
                    text.push_str(&stream);
                    text.push('\n');
                }
            }
            Err(_) => {
                text.push_str(line);
                text.push('\n');
            }
        }
    }

    ImageId::from_load_output(&text).ok_or_else(|| ProvisionError::MissingImageId {
        request: request.to_string(),
        output: output.to_string(),
    })
}

async fn create_container(client: &mut DaemonClient, image_id: &ImageId) -> Result<ContainerId> {
    let body = serde_json::json!({ "Image": image_id.as_str() });
    let mut response = client
        .post(CREATE_CONTAINER_PATH, body, HeaderMap::new())
        .await?;
    assert_status(&mut response, &[StatusCode::CREATED]).await?;

    let created: CreateContainerResponse = response.json().await?;
    for warning in created.warnings.iter().flatten() {
        tracing::warn!(warning = %warning, "daemon warning on container create");
    }
    if created.id.is_empty() {
        return Err(ProvisionError::MissingContainerId {
            request: response.request().to_string(),
        }
        .into());
    }
    Ok(ContainerId::new(created.id))
}

// ============================================================================
// Execute
// ============================================================================

async fn execute(client: &mut DaemonClient, container_id: &ContainerId) -> Result<DemuxedLogs> {
    let path = format!("/containers/{container_id}/start");
    call(client, Method::POST, &path, StatusCode::NO_CONTENT).await?;
    tracing::info!(container_id = %container_id, "container started");
    stop_container(client, container_id).await?;
    tracing::info!(container_id = %container_id, "container stopped");

    let path = format!("/containers/{container_id}/logs?stdout=true&stderr=true");
    let mut response = client.get(&path, HeaderMap::new()).await?;
    assert_status(&mut response, &[StatusCode::OK]).await?;
    let logs = demux_logs(response.body().await?)?;
    tracing::debug!(
        container_id = %container_id,
        stdout = logs.stdout.len(),
        stderr = logs.stderr.len(),
        "logs collected"
    );
    Ok(logs)
}

async fn stop_container(client: &mut DaemonClient, container_id: &ContainerId) -> Result<()> {
    let path = format!("/containers/{container_id}/stop");
    call(client, Method::POST, &path, StatusCode::NO_CONTENT).await
}

/// Sends a bodyless request and asserts a single expected status.
async fn call(
    client: &mut DaemonClient,
    method: Method,
    path: &str,
    expected: StatusCode,
) -> Result<()> {
    let mut response = client
        .request(method, path, RequestBody::Empty, HeaderMap::new())
        .await?;
    assert_status(&mut response, &[expected]).await
}

// ============================================================================
// Teardown
// ============================================================================

async fn teardown(client: &mut DaemonClient, resources: &Resources) -> TeardownReport {
    let mut report = TeardownReport::default();

    if let Some(container_id) = &resources.container_id {
        match inspect_running(client, container_id).await {
            Ok(running) => {
                report.was_running = Some(running);
                if running {
                    tracing::info!(container_id = %container_id, "container still running, stopping");
                    if let Err(e) = stop_container(client, container_id).await {
                        report.record("stop container", e);
                    }
                }
            }
            Err(e) => report.record("inspect container", e),
        }

        let path = format!("/containers/{container_id}");
        match call(client, Method::DELETE, &path, StatusCode::NO_CONTENT).await {
            Ok(()) => tracing::info!(container_id = %container_id, "container deleted"),
            Err(e) => report.record("delete container", e),
        }
    }

    if let Some(image_id) = &resources.image_id {
        let path = format!("/images/{image_id}");
        match call(client, Method::DELETE, &path, StatusCode::OK).await {
            Ok(()) => tracing::info!(image_id = %image_id, "image deleted"),
            Err(e) => report.record("delete image", e),
        }
    }

    check_leftovers(client, resources, &mut report).await;
    report
}

async fn inspect_running(client: &mut DaemonClient, container_id: &ContainerId) -> Result<bool> {
    let path = format!("/containers/{container_id}/json");
    let mut response = client.get(&path, HeaderMap::new()).await?;
    assert_status(&mut response, &[StatusCode::OK]).await?;
    let inspect: ContainerInspect = response.json().await?;
    tracing::debug!(
        container_id = %container_id,
        status = %inspect.state.status,
        running = inspect.state.running,
        "container inspected"
    );
    Ok(inspect.state.running)
}

async fn check_leftovers(
    client: &mut DaemonClient,
    resources: &Resources,
    report: &mut TeardownReport,
) {
    let mut leftovers = Vec::new();

    if let Some(container_id) = &resources.container_id {
        match list_ids(client, LIST_CONTAINERS_PATH).await {
            Ok(ids) if ids.iter().any(|id| id == container_id.as_str()) => {
                leftovers.push(container_id.to_string());
            }
            Ok(_) => {}
            Err(e) => report.record("list containers", e),
        }
    }

    if let Some(image_id) = &resources.image_id {
        match list_ids(client, LIST_IMAGES_PATH).await {
            Ok(ids) if ids.iter().any(|id| id == image_id.as_str()) => {
                leftovers.push(image_id.to_string());
            }
            Ok(_) => {}
            Err(e) => report.record("list images", e),
        }
    }

    if !leftovers.is_empty() {
        tracing::warn!(ids = ?leftovers, "resources left on the daemon");
        report.errors.push(TeardownError::Leftovers { ids: leftovers });
    }
}

async fn list_ids(client: &mut DaemonClient, path: &str) -> Result<Vec<String>> {
    let mut response = client.get(path, HeaderMap::new()).await?;
    assert_status(&mut response, &[StatusCode::OK]).await?;
    let entries: Vec<ResourceSummary> = response.json().await?;
    Ok(entries.into_iter().map(|entry| entry.id).collect())
}
