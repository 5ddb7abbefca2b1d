//! Sandbox lifecycle
//!
//! A `Sandbox` is acquired once per submission and released exactly once.
//! The normal release is the awaited `destroy`; if the owning future is
//! dropped or panics first, `Drop` hands removal to the runtime instead.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::engine::{ExecOutput, SandboxEngine, SandboxSpec, SCRATCH_DIR, WORKSPACE_MOUNT};
use crate::error::{RunnerError, RunnerResult};

pub struct Sandbox {
    engine: Arc<dyn SandboxEngine>,
    /// `None` once released
    container_id: Option<String>,
}

impl Sandbox {
    /// Create the sandbox and copy the read-only staging mount into scratch.
    ///
    /// If the copy fails the sandbox is destroyed before the error returns.
    #[instrument(skip(engine, spec), fields(image = %spec.image))]
    pub async fn create(engine: Arc<dyn SandboxEngine>, spec: &SandboxSpec) -> RunnerResult<Self> {
        let container_id = engine.create(spec).await?;
        debug!(container_id = %container_id, "Sandbox created");

        let sandbox = Self {
            engine,
            container_id: Some(container_id),
        };

        if let Err(e) = sandbox.populate_scratch().await {
            sandbox.destroy().await;
            return Err(e);
        }

        Ok(sandbox)
    }

    pub fn container_id(&self) -> &str {
        self.container_id.as_deref().unwrap_or_default()
    }

    pub async fn exec(&self, command: &str, workdir: &str) -> RunnerResult<ExecOutput> {
        let container_id = self
            .container_id
            .as_deref()
            .ok_or_else(|| RunnerError::Internal(anyhow::anyhow!("sandbox already destroyed")))?;

        Ok(self.engine.exec(container_id, command, workdir).await?)
    }

    async fn populate_scratch(&self) -> RunnerResult<()> {
        let command = format!("cp -R {}/. {}/", WORKSPACE_MOUNT, SCRATCH_DIR);
        let output = self.exec(&command, "/").await?;

        if output.exit_code != 0 {
            return Err(RunnerError::Internal(anyhow::anyhow!(
                "Failed to populate scratch (exit code {}): {}",
                output.exit_code,
                output.text().trim()
            )));
        }
        Ok(())
    }

    /// Force-remove the sandbox. Failures are logged, never returned.
    pub async fn destroy(mut self) {
        if let Some(container_id) = self.container_id.take() {
            match self.engine.remove(&container_id).await {
                Ok(()) => debug!(container_id = %container_id, "Sandbox destroyed"),
                Err(e) => warn!(container_id = %container_id, error = %e, "Failed to destroy sandbox"),
            }
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let Some(container_id) = self.container_id.take() else {
            return;
        };

        let engine = self.engine.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = engine.remove(&container_id).await {
                        warn!(container_id = %container_id, error = %e, "Failed to destroy abandoned sandbox");
                    }
                });
            }
            Err(_) => {
                warn!(container_id = %container_id, "No runtime available; abandoned sandbox not removed");
            }
        }
    }
}
