//! Sandbox backend seam.
//!
//! The orchestrator only sees this trait, so Docker can be swapped for a
//! scripted fake in tests or another isolation backend in production.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Captured result of a run that exited normally.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOutput {
    /// Stdout and stderr interleaved in arrival order.
    pub output: String,
    pub exit_code: i64,
    pub execution_time_ms: u64,
}

/// Coarse failure classes reported by a sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorKind {
    SetupError,
    RuntimeCrash,
    TimeoutOrApiFailure,
    Unexpected,
}

impl fmt::Display for SandboxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SandboxErrorKind::SetupError => "setup error",
            SandboxErrorKind::RuntimeCrash => "runtime crash",
            SandboxErrorKind::TimeoutOrApiFailure => "timeout or API failure",
            SandboxErrorKind::Unexpected => "unexpected error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    #[error("Sandbox setup failed: {0}")]
    Setup(String),
    #[error("Runtime error (exit code {exit_code}):\n{output}")]
    RuntimeCrash { exit_code: i64, output: String },
    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Execution failed: {0}")]
    Api(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SandboxError {
    pub fn kind(&self) -> SandboxErrorKind {
        match self {
            SandboxError::Setup(_) => SandboxErrorKind::SetupError,
            SandboxError::RuntimeCrash { .. } => SandboxErrorKind::RuntimeCrash,
            SandboxError::Timeout { .. } | SandboxError::Api(_) => SandboxErrorKind::TimeoutOrApiFailure,
            SandboxError::Unexpected(_) => SandboxErrorKind::Unexpected,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout { .. })
    }
}

/// Runs one harness in a fresh, single-use isolated environment.
///
/// Implementations must release the environment on every exit path and must
/// be safe to call concurrently.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    async fn execute(&self, harness: &str) -> Result<SandboxOutput, SandboxError>;
}
