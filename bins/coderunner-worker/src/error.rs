//! Error taxonomy for a single submission
//!
//! Compile failures and timed-out tests are not errors: they are folded into
//! the `ExecutionReport`. Only the conditions below abort a submission.

use crate::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The isolation engine is unreachable or refused to start a sandbox
    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl RunnerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SandboxUnavailable(_) => "SANDBOX_UNAVAILABLE",
            Self::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller is at fault (as opposed to the service)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedLanguage(_) | Self::InvalidRequest(_))
    }

    /// Message safe to hand back to the submitter. Internal faults and engine
    /// details are logged, never returned.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                "execution error".to_string()
            }
            Self::SandboxUnavailable(detail) => {
                tracing::error!(detail = %detail, "Sandbox unavailable");
                "sandbox unavailable".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<EngineError> for RunnerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(detail) => RunnerError::SandboxUnavailable(detail),
            EngineError::Operation(detail) => RunnerError::Internal(anyhow::anyhow!(detail)),
        }
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
