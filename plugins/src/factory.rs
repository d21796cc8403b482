//! Assembles the configured tool set from [`ToolsConfig`].

use std::sync::Arc;

use overwatch_core::config::ToolsConfig;
use overwatch_core::tools::ToolSet;

use crate::discovery::{AssetfinderTool, SubfinderTool};
use crate::dns::DnsxTool;
use crate::http_probe::HttpxTool;
use crate::ports::NaabuTool;
use crate::screenshot::GowitnessTool;
use crate::vuln::NucleiTool;

pub fn build_toolset(cfg: &ToolsConfig) -> ToolSet {
    ToolSet {
        discovery: vec![
            Arc::new(SubfinderTool::new(&cfg.subfinder.bin)),
            Arc::new(AssetfinderTool::new(&cfg.assetfinder.bin)),
        ],
        resolver: Arc::new(DnsxTool::new(&cfg.dnsx.bin)),
        prober: Arc::new(HttpxTool::new(&cfg.httpx.bin)),
        port_scanner: Arc::new(NaabuTool::new(&cfg.naabu.bin, cfg.top_ports)),
        screenshotter: Arc::new(GowitnessTool::new(&cfg.gowitness.bin)),
        vuln_scanner: Arc::new(NucleiTool::new(
            &cfg.nuclei.bin,
            cfg.vuln_severities.clone(),
            cfg.vuln_rate_limit,
            cfg.vuln_concurrency,
        )),
    }
}
