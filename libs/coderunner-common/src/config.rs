// Runner configuration
// Loaded once at startup and handed to the harness explicitly.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RUNNER_IMAGE: &str = "testportal/runner:latest";
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;
pub const DEFAULT_CPUS: f64 = 0.5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_COMPILE_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_SCRATCH_SIZE_MB: u64 = 64;
pub const DEFAULT_PIDS_LIMIT: i64 = 64;

/// Largest memory limit whose byte count still fits the engine's `i64`
pub const MAX_MEMORY_LIMIT_MB: u64 = (i64::MAX >> 20) as u64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Image used by every language profile that does not name its own.
    pub default_image: String,
    pub memory_limit_mb: u64,
    /// Fraction of one CPU granted to a sandbox.
    pub cpus: f64,
    /// Per-test wall clock limit enforced inside the sandbox.
    pub timeout_seconds: u64,
    pub compile_timeout_seconds: u64,
    pub scratch_size_mb: u64,
    pub pids_limit: i64,
    pub pull_missing_images: bool,
    pub languages_file: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_image: DEFAULT_RUNNER_IMAGE.to_string(),
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            cpus: DEFAULT_CPUS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            compile_timeout_seconds: DEFAULT_COMPILE_TIMEOUT_SECONDS,
            scratch_size_mb: DEFAULT_SCRATCH_SIZE_MB,
            pids_limit: DEFAULT_PIDS_LIMIT,
            pull_missing_images: false,
            languages_file: None,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from `RUNNER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys fall back
    /// to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            default_image: lookup("RUNNER_IMAGE")
                .filter(|image| !image.trim().is_empty())
                .unwrap_or(defaults.default_image),
            memory_limit_mb: parse_var(&lookup, "RUNNER_MEMORY_LIMIT_MB", defaults.memory_limit_mb)?,
            cpus: parse_var(&lookup, "RUNNER_CPUS", defaults.cpus)?,
            timeout_seconds: parse_var(&lookup, "RUNNER_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
            compile_timeout_seconds: parse_var(
                &lookup,
                "RUNNER_COMPILE_TIMEOUT_SECONDS",
                defaults.compile_timeout_seconds,
            )?,
            scratch_size_mb: parse_var(&lookup, "RUNNER_SCRATCH_SIZE_MB", defaults.scratch_size_mb)?,
            pids_limit: parse_var(&lookup, "RUNNER_PIDS_LIMIT", defaults.pids_limit)?,
            pull_missing_images: parse_bool(&lookup, "RUNNER_PULL_IMAGES", defaults.pull_missing_images)?,
            languages_file: lookup("RUNNER_LANGUAGES_FILE").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_limit_mb == 0 {
            return Err(ConfigError::OutOfRange("memory_limit_mb must be positive".to_string()));
        }
        if self.memory_limit_mb > MAX_MEMORY_LIMIT_MB {
            return Err(ConfigError::OutOfRange(format!(
                "memory_limit_mb must not exceed {}",
                MAX_MEMORY_LIMIT_MB
            )));
        }
        if self.cpus.is_nan() || self.cpus <= 0.0 || !self.cpus.is_finite() {
            return Err(ConfigError::OutOfRange("cpus must be a positive number".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::OutOfRange("timeout_seconds must be positive".to_string()));
        }
        if self.compile_timeout_seconds == 0 {
            return Err(ConfigError::OutOfRange(
                "compile_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.scratch_size_mb == 0 {
            return Err(ConfigError::OutOfRange("scratch_size_mb must be positive".to_string()));
        }
        if self.pids_limit <= 0 {
            return Err(ConfigError::OutOfRange("pids_limit must be positive".to_string()));
        }
        Ok(())
    }

    pub fn memory_limit_bytes(&self) -> i64 {
        i64::try_from(self.memory_limit_mb)
            .map_or(i64::MAX, |mb| mb.saturating_mul(1024 * 1024))
    }

    /// CPU fraction expressed as the engine's nanosecond quota
    pub fn nano_cpus(&self) -> i64 {
        (self.cpus * 1_000_000_000.0) as i64
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_seconds)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|raw| raw.trim().to_lowercase()) {
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
        None => Ok(default),
    }
}
