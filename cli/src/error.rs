use overwatch_core::error::ApiError;

/// Top-level CLI error, mapped to process exit codes in `main`.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

impl CliError {
    // 0: success
    // 11: config error
    // 12: invalid request
    // 20: io / server error
    // 30: missing required tool
    // 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 11,
            Self::Api(ApiError::Validation(_)) => 12,
            Self::Api(ApiError::NotFound(_)) => 12,
            Self::Api(ApiError::Conflict(_)) => 12,
            Self::Api(ApiError::Internal(_)) => 50,
            Self::Io(_) => 20,
            Self::Server(_) => 20,
        }
    }
}
