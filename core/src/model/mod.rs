//! Persisted domain records: projects, runs, and scheduling envelopes.

pub mod job;
pub mod project;
pub mod run;
pub mod transitions;

pub use job::{Job, JobDescriptor, LaunchMode};
pub use project::{normalize_targets, slugify, Project};
pub use run::{Progress, Run, RunState, RunStats, TOTAL_STEPS};
pub use transitions::TransitionError;
