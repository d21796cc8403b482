use thiserror::Error;

/// Failures of a single external tool invocation.
///
/// Best-effort pipeline stages absorb these into warnings plus the stage's
/// documented empty artifact; only the dependency check treats them as fatal.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool not installed: {0}")]
    Unavailable(String),
    #[error("spawn failed for {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("{tool} exited with code {code}: {stderr_tail}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr_tail: String,
    },
    #[error("invocation cancelled: {0}")]
    Cancelled(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
