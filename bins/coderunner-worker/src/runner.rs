//! Instrumented test runner
//!
//! Each test is one exec in the scratch root. The run command reads the staged
//! input from the read-only mount, writes stdout and stderr to scratch files,
//! and is wrapped by GNU `time` and a hard `timeout`. Afterwards the shell
//! prints the framed trailer that `demux` takes apart.

use tracing::{debug, instrument, warn};

use crate::demux::{self, PROGRAM_MARKER, TIME_MARKER};
use crate::engine::{SCRATCH_DIR, WORKSPACE_MOUNT};
use crate::error::RunnerResult;
use crate::evaluator::ExecutionRecord;
use crate::profile::LanguageProfile;
use crate::sandbox::Sandbox;
use crate::staging::input_filename;

pub const STDOUT_FILE: &str = "prog_out.txt";
pub const STDERR_FILE: &str = "prog_err.txt";
pub const TIME_FILE: &str = "prog_time.txt";

/// GNU time report: wall clock seconds and peak RSS in KB
const TIME_FORMAT: &str = r"TIME:%e\nMEM:%M";

/// Wrap `arg` in single quotes for `sh`
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Path of the staged stdin file for test `index` inside the sandbox
pub fn sandbox_input_path(index: usize) -> String {
    format!("{}/{}", WORKSPACE_MOUNT, input_filename(index))
}

/// Build the shell invocation for one test run.
///
/// The exit status of the whole invocation is the status of the `timeout`
/// wrapper, so a kill surfaces as 137.
pub fn instrumented_command(run_command: &str, input_path: &str, timeout_seconds: u64) -> String {
    let redirected = format!(
        "{} < {} > {} 2> {}",
        run_command, input_path, STDOUT_FILE, STDERR_FILE
    );

    let mut script = Vec::with_capacity(9);
    script.push(format!("rm -f {} {} {}", STDOUT_FILE, STDERR_FILE, TIME_FILE));
    script.push(format!(
        "timeout -s KILL {}s /usr/bin/time -o {} -f {} sh -c {}",
        timeout_seconds,
        TIME_FILE,
        shell_quote(TIME_FORMAT),
        shell_quote(&redirected)
    ));
    script.push("rc=$?".to_string());
    script.push(format!("echo {}", shell_quote(PROGRAM_MARKER)));
    script.push(format!("cat {} 2>/dev/null", STDOUT_FILE));
    script.push("echo".to_string());
    script.push(format!("echo {}", shell_quote(TIME_MARKER)));
    script.push(format!("cat {} 2>/dev/null", TIME_FILE));
    script.push("exit $rc".to_string());

    script.join("; ")
}

/// Run test `index` against the already compiled artifact in scratch.
#[instrument(
    skip(sandbox, profile),
    fields(container_id = %sandbox.container_id(), test_index = index)
)]
pub async fn run_test(
    sandbox: &Sandbox,
    profile: &LanguageProfile,
    index: usize,
    timeout_seconds: u64,
) -> RunnerResult<ExecutionRecord> {
    let command = instrumented_command(
        &profile.run_command,
        &sandbox_input_path(index),
        timeout_seconds,
    );

    let output = sandbox.exec(&command, SCRATCH_DIR).await?;
    let parsed = demux::demultiplex(&output.text());

    let record = ExecutionRecord {
        stdout: parsed.stdout,
        exit_code: output.exit_code,
        elapsed_seconds: parsed.elapsed_seconds,
        peak_memory_kb: parsed.peak_memory_kb,
    };

    if record.timed_out() {
        warn!(exit_code = record.exit_code, timeout_seconds, "Test run killed by timeout");
    } else {
        debug!(
            exit_code = record.exit_code,
            elapsed_seconds = ?record.elapsed_seconds,
            peak_memory_kb = ?record.peak_memory_kb,
            "Test run finished"
        );
    }

    Ok(record)
}
