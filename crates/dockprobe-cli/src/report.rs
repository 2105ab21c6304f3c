//! Human-readable run report.

use dockprobe_scenario::{Phase, ScenarioRun};
use std::fmt::Write;

const PHASES: [Phase; 4] = [Phase::Provision, Phase::Execute, Phase::Verify, Phase::Teardown];

fn phase_status(run: &ScenarioRun, phase: Phase) -> &'static str {
    if run.failed_phase == Some(phase) {
        return "FAILED";
    }
    if !run.phases.contains(&phase) {
        return "skipped";
    }
    match (&run.teardown, phase) {
        (Some(report), Phase::Teardown) if !report.is_clean() => "FAILED",
        _ => "ok",
    }
}

/// Renders the per-phase report followed by any diagnostics.
pub fn render(run: &ScenarioRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "scenario {}", run.scenario);
    for phase in PHASES {
        let _ = writeln!(out, "  {:<10} {}", phase.to_string(), phase_status(run, phase));
    }

    if let Some(failure) = &run.failure {
        let _ = writeln!(out, "\nerror: {failure}");
    }
    if let Some(partial) = &run.partial_logs {
        let _ = writeln!(out, "\nlog output recovered from the malformed stream:");
        for (name, bytes) in [("stdout", &partial.stdout), ("stderr", &partial.stderr)] {
            let _ = writeln!(out, "--- {name} ---\n{}", String::from_utf8_lossy(bytes));
        }
    }
    if let Some(report) = &run.teardown {
        for error in &report.errors {
            let _ = writeln!(out, "\nteardown error: {error}");
        }
    }

    let verdict = if run.is_success() { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "\nresult: {verdict}");
    out
}
