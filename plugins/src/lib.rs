//! Tool adapters: one [`overwatch_core::tools::ToolPlugin`] per external
//! recon binary, plus the factory that assembles the configured tool set.

pub mod discovery;
pub mod dns;
pub mod factory;
pub mod http_probe;
pub mod ports;
pub mod screenshot;
pub mod vuln;
