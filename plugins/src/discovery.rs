//! Subdomain discovery adapters. The pipeline runs both concurrently and
//! union-deduplicates their output with the seed targets.

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct SubfinderTool {
    bin: String,
}

impl SubfinderTool {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "subfinder".to_string(),
            bin: self.bin.clone(),
            // Comma-joined seed domains; -silent keeps output to one
            // hostname per line.
            args: vec![
                "-d".to_string(),
                req.targets.join(","),
                "-all".to_string(),
                "-silent".to_string(),
            ],
            stdin_lines: None,
            artifact: req.output_dir.join("subfinder.txt"),
        }
    }
}

#[async_trait]
impl ToolPlugin for SubfinderTool {
    fn name(&self) -> &str {
        "subfinder"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}

pub struct AssetfinderTool {
    bin: String,
}

impl AssetfinderTool {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "assetfinder".to_string(),
            bin: self.bin.clone(),
            args: vec!["--subs-only".to_string()],
            // Seed domains on stdin, one per line.
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("assetfinder.txt"),
        }
    }
}

#[async_trait]
impl ToolPlugin for AssetfinderTool {
    fn name(&self) -> &str {
        "assetfinder"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}
