//! # dockprobe-scenario
//!
//! Drives one container lifecycle scenario against a Docker-compatible
//! daemon and checks what it observes.
//!
//! ## Phases
//!
//! 1. **Provision** - load the image archive, create a container
//! 2. **Execute** - start, stop, fetch logs
//! 3. **Verify** - compare the demultiplexed output with the expected banners
//! 4. **Teardown** - stop if still running, delete the container, delete the image
//!
//! Teardown runs whenever provisioning succeeded, including after a failed
//! execute or verify phase. A provisioning failure does not roll back.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod assertions;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod runner;

pub use assertions::{assert_status, verify_output};
pub use config::ProbeConfig;
pub use error::{
    ProvisionError, ScenarioError, StatusAssertionError, TeardownError, VerificationError,
};
pub use fixtures::{ContainerId, ImageId, Scenario};
pub use runner::{Phase, Resources, ScenarioRun, TeardownReport, run_scenario};
