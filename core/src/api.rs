//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `overwatch_core::api` instead of reaching into
//! internal modules.

pub use crate::artifacts::{run_dir, RunArtifacts};
pub use crate::config::{
    get_data_dir, load_default, AppConfig, HttpServerConfig, LoggingConfig, SchedulerConfig,
    ToolConfig, ToolsConfig,
};
pub use crate::error::{ApiError, EngineError, ToolError};
pub use crate::model::{
    normalize_targets, slugify, Job, JobDescriptor, LaunchMode, Progress, Project, Run, RunState,
    RunStats, TOTAL_STEPS,
};
pub use crate::pipeline::{
    Finding, HostPorts, PipelineExecutor, RunRequest, RunVerdict, ScanSummary, ServiceProbe,
};
pub use crate::proxy::{proxy_env, ProxyCredentials, ProxyMeta, ProxyScheme};
pub use crate::scheduler::{CancelOutcome, ScanScheduler, SubmitRequest};
pub use crate::store::JobRunStore;
pub use crate::tools::{
    run_tool, ProcessSpec, ToolHandle, ToolInvocation, ToolOutput, ToolPlugin, ToolSet,
};
