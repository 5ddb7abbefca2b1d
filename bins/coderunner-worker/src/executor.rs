/// Submission Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one submission from request to report.
///
/// **Flow:**
/// 1. Resolve the language profile and check input sizes (no sandbox work yet)
/// 2. Stage source and inputs on the host (staging.rs)
/// 3. Create one sandbox bound to the staging directory (sandbox.rs)
/// 4. Compile once, then run every test in order (compile.rs, runner.rs)
/// 5. Compare and assemble the report (evaluator.rs)
/// 6. Destroy the sandbox, then remove the staging directory, on every path
///
/// This module is the glue layer - it knows nothing about:
/// - How sandboxes are isolated (engine's job)
/// - How output is framed (runner/demux)
/// - How outputs are compared (evaluator's job)

use coderunner_common::config::RunnerConfig;
use coderunner_common::types::{ExecutionReport, ExecutionRequest, TestCase};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::compile;
use crate::engine::{SandboxEngine, SandboxSpec};
use crate::error::{RunnerError, RunnerResult};
use crate::evaluator;
use crate::profile::{LanguageProfile, ProfileTable};
use crate::runner;
use crate::sandbox::Sandbox;
use crate::staging::StagingDirectory;

/// Maximum source code size (1MB)
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024;

/// Maximum single test input size (10MB)
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024;

pub struct Harness {
    engine: Arc<dyn SandboxEngine>,
    profiles: ProfileTable,
    config: RunnerConfig,
}

impl Harness {
    pub fn new(engine: Arc<dyn SandboxEngine>, profiles: ProfileTable, config: RunnerConfig) -> Self {
        Self {
            engine,
            profiles,
            config,
        }
    }

    /// Execute one submission.
    ///
    /// Compile failures and timed-out tests come back inside the report; only
    /// the `RunnerError` conditions abort.
    #[instrument(
        skip(self, request),
        fields(language = %request.language, test_count = request.tests.len())
    )]
    pub async fn execute(&self, request: &ExecutionRequest) -> RunnerResult<ExecutionReport> {
        validate_request(&self.profiles, request)?;
        let (language, profile) = self.profiles.resolve(&request.language)?;

        let start = Instant::now();
        let staging = StagingDirectory::create(&profile.source_filename, &request.code, &request.tests)?;

        let result = self.execute_staged(profile, &staging, &request.tests).await;
        staging.cleanup();

        if let Ok(report) = &result {
            info!(
                language = %language,
                compile_success = report.compile_success,
                passed = report.tests.iter().filter(|t| t.passed).count(),
                total = report.tests.len(),
                execution_ms = start.elapsed().as_millis() as u64,
                "Submission finished"
            );
        }

        result
    }

    /// Sandbox scope: whatever `run_in_sandbox` returns, the sandbox is
    /// destroyed before this returns.
    async fn execute_staged(
        &self,
        profile: &LanguageProfile,
        staging: &StagingDirectory,
        tests: &[TestCase],
    ) -> RunnerResult<ExecutionReport> {
        let spec = SandboxSpec::new(&profile.image, staging.path(), &self.config);
        let sandbox = Sandbox::create(self.engine.clone(), &spec).await?;

        let result = self.run_in_sandbox(&sandbox, profile, tests).await;
        sandbox.destroy().await;

        result
    }

    async fn run_in_sandbox(
        &self,
        sandbox: &Sandbox,
        profile: &LanguageProfile,
        tests: &[TestCase],
    ) -> RunnerResult<ExecutionReport> {
        let compile = compile::compile(sandbox, profile, self.config.compile_timeout()).await?;
        if !compile.success {
            return Ok(evaluator::compile_failure_report(compile));
        }

        // Sequential: tests share the scratch filesystem and report in order
        let mut records = Vec::with_capacity(tests.len());
        for index in 0..tests.len() {
            let record =
                runner::run_test(sandbox, profile, index, self.config.timeout_seconds).await?;
            records.push(record);
        }

        Ok(evaluator::aggregate(compile, &records, tests))
    }
}

/// Client-side checks that need no engine: known language, sizes in bounds.
///
/// Callers run this before connecting to anything, so a bad request is never
/// reported as an engine outage.
pub fn validate_request(profiles: &ProfileTable, request: &ExecutionRequest) -> RunnerResult<()> {
    profiles.resolve(&request.language)?;
    validate_sizes(request)
}

fn validate_sizes(request: &ExecutionRequest) -> RunnerResult<()> {
    if request.code.len() > MAX_SOURCE_CODE_BYTES {
        return Err(RunnerError::InvalidRequest(format!(
            "source code exceeds maximum size of {} bytes",
            MAX_SOURCE_CODE_BYTES
        )));
    }

    if let Some(index) = request
        .tests
        .iter()
        .position(|t| t.input.len() > MAX_TEST_INPUT_BYTES)
    {
        return Err(RunnerError::InvalidRequest(format!(
            "input of test {} exceeds maximum size of {} bytes",
            index, MAX_TEST_INPUT_BYTES
        )));
    }

    Ok(())
}
