//! Checks applied to daemon responses and container output.

use crate::error::{ScenarioError, StatusAssertionError, VerificationError};
use crate::fixtures::Scenario;
use dockprobe_client::{ApiResponse, DemuxedLogs, StatusCode};

/// Fails unless the response status is one of `expected`.
///
/// The body is read (and cached on the response) before the status is
/// judged, so a failure carries the daemon's explanation and a success
/// leaves the connection ready for the next request.
///
/// # Errors
///
/// Returns [`ScenarioError::Status`] on an unexpected status, or
/// [`ScenarioError::Client`] if the body cannot be read.
pub async fn assert_status(
    response: &mut ApiResponse,
    expected: &[StatusCode],
) -> Result<(), ScenarioError> {
    let body = response.text().await?;
    let actual = response.status();
    if expected.contains(&actual) {
        tracing::debug!(request = response.request(), status = %actual, "status ok");
        return Ok(());
    }

    Err(StatusAssertionError {
        request: response.request().to_string(),
        actual,
        expected: expected.to_vec(),
        body,
    }
    .into())
}

/// Compares captured container output with the scenario's banners.
///
/// # Errors
///
/// Returns the first mismatch found: stderr output, empty stdout, wrong
/// first line, wrong last line.
pub fn verify_output(logs: &DemuxedLogs, scenario: &Scenario) -> Result<(), VerificationError> {
    if !logs.stderr.is_empty() {
        return Err(VerificationError::UnexpectedStderr(logs.stderr.clone()));
    }

    let mut lines = logs.stdout.lines();
    let first = lines.next().ok_or(VerificationError::EmptyStdout)?;
    let last = lines.next_back().unwrap_or(first);

    if first != scenario.startup_banner {
        return Err(VerificationError::StartupBanner {
            expected: scenario.startup_banner.clone(),
            actual: first.to_string(),
        });
    }
    if last != scenario.shutdown_banner {
        return Err(VerificationError::ShutdownBanner {
            expected: scenario.shutdown_banner.clone(),
            actual: last.to_string(),
        });
    }
    Ok(())
}
