//! Host-side staging of one submission's files
//!
//! The staging directory holds the source file plus `input_{i}.txt` for every
//! test case. It is bind-mounted read-only into the sandbox and removed when
//! the submission finishes, whatever the outcome.

use anyhow::{Context, Result};
use coderunner_common::types::TestCase;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name of the staged stdin file for the test at `index`
pub fn input_filename(index: usize) -> String {
    format!("input_{}.txt", index)
}

#[derive(Debug)]
pub struct StagingDirectory {
    dir: TempDir,
}

impl StagingDirectory {
    /// Write `code` and every test input into a fresh temp directory
    pub fn create(source_filename: &str, code: &str, tests: &[TestCase]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("exec_")
            .tempdir()
            .context("Failed to create staging directory")?;

        // The sandbox user is not the host user; everything must be world-readable
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755))
            .context("Failed to set staging directory permissions")?;

        write_readable(&dir.path().join(source_filename), code)
            .with_context(|| format!("Failed to stage source file {}", source_filename))?;

        for (index, test) in tests.iter().enumerate() {
            write_readable(&dir.path().join(input_filename(index)), &test.input)
                .with_context(|| format!("Failed to stage input for test {}", index))?;
        }

        debug!(
            path = %dir.path().display(),
            test_count = tests.len(),
            "Staged submission"
        );

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory. Failures are logged and dropped.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

fn write_readable(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}
