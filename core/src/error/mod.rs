#[allow(clippy::module_inception)]
pub mod error;
pub mod tool;

pub use error::{ApiError, EngineError};
pub use tool::ToolError;
