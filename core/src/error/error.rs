use thiserror::Error;

/// Errors surfaced synchronously to API callers. None of these mutate state.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Fatal faults that terminate a run in the failed state.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("required tool unavailable: {0}")]
    ToolUnavailable(String),
    #[error("executor fault: {0}")]
    Executor(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Short human-readable message attached to the run's terminal state.
    pub fn status_message(&self) -> String {
        match self {
            Self::ToolUnavailable(name) => format!("missing required tool: {name}"),
            Self::Executor(_) => "internal executor fault".to_string(),
            Self::Store(_) => "internal store fault".to_string(),
            Self::Io(_) => "internal io fault".to_string(),
        }
    }
}
