//! overwatch-core: scan orchestration engine.
//!
//! Everything stateful lives here: the project/run store, the job
//! scheduler, the ten-stage pipeline executor and the report synthesizer.
//! Tool adapters live in `overwatch-plugins`; the HTTP surface and CLI
//! live in `overwatch-cli`.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod proxy;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod tools;
