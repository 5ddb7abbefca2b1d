//! Compile stage
//!
//! Runs the profile's compile command once in the scratch root. A failed
//! compile is an outcome, not an error; it gates every test.

use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::engine::SCRATCH_DIR;
use crate::error::RunnerResult;
use crate::evaluator::CompileOutcome;
use crate::profile::LanguageProfile;
use crate::sandbox::Sandbox;

/// Compile the staged source inside `sandbox`.
///
/// The exec is bounded by `deadline` on the host side; expiry is reported as a
/// failed compile and the caller tears the sandbox down as usual.
#[instrument(skip(sandbox, profile), fields(container_id = %sandbox.container_id()))]
pub async fn compile(
    sandbox: &Sandbox,
    profile: &LanguageProfile,
    deadline: Duration,
) -> RunnerResult<CompileOutcome> {
    let Some(command) = profile.compile_command.as_deref() else {
        debug!("No compile step");
        return Ok(CompileOutcome::skipped());
    };

    let start_time = Instant::now();
    let output = match tokio::time::timeout(deadline, sandbox.exec(command, SCRATCH_DIR)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(deadline_secs = deadline.as_secs_f64(), "Compilation timed out");
            return Ok(CompileOutcome {
                success: false,
                output: format!("compilation timed out after {}s", deadline.as_secs_f64()),
            });
        }
    };
    let compilation_time_ms = start_time.elapsed().as_millis() as u64;

    let text = output.text();
    let success = output.exit_code == 0;

    if success {
        info!(compilation_time_ms, "Compilation succeeded");
    } else {
        warn!(
            compilation_time_ms,
            exit_code = output.exit_code,
            error_preview = text.lines().next().unwrap_or(""),
            "Compilation failed"
        );
    }

    Ok(CompileOutcome {
        success,
        output: text,
    })
}
