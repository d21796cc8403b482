//! overwatch-cli library: exposes modules for unit tests.

pub mod commands;
pub mod error;
pub mod http;
