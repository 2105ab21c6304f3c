//! Docker Engine API payloads the scenario reads.

use serde::Deserialize;

/// One message of the `/images/load` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadImageMessage {
    /// Progress or result text, e.g. `Loaded image ID: sha256:...`.
    #[serde(default)]
    pub stream: Option<String>,
    /// Error text reported inside a 200 response.
    #[serde(default)]
    pub error: Option<String>,
}

/// Create container response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerResponse {
    /// New container ID.
    pub id: String,
    /// Warnings raised while creating the container.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Container inspect response (only the fields teardown needs).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    /// Runtime state.
    pub state: ContainerState,
}

/// Container state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    /// Whether the container is running.
    pub running: bool,
    /// Status string, e.g. `exited`.
    #[serde(default)]
    pub status: String,
}

/// Entry of `GET /containers/json` or `GET /images/json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceSummary {
    /// Resource ID.
    pub id: String,
}
