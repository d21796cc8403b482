//! `overwatch check`: report availability of every required tool.

use std::sync::Arc;

use overwatch_core::config::AppConfig;
use overwatch_plugins::factory::build_toolset;

use crate::error::CliError;

pub async fn handle_check(cfg: Arc<AppConfig>) -> Result<i32, CliError> {
    let tools = build_toolset(&cfg.tools);
    let mut missing = 0;

    println!("{:<14} status", "tool");
    for tool in tools.required() {
        let ok = tool.is_available();
        if !ok {
            missing += 1;
        }
        println!(
            "{:<14} {}",
            tool.name(),
            if ok { "ok" } else { "MISSING" }
        );
    }

    if missing > 0 {
        eprintln!("{missing} required tool(s) missing");
        return Ok(30);
    }
    Ok(0)
}
