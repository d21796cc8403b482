//! Port discovery adapter. Scans a fixed top-N port set per live host and
//! emits `host:port` lines.

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct NaabuTool {
    bin: String,
    top_ports: u16,
}

impl NaabuTool {
    pub fn new(bin: impl Into<String>, top_ports: u16) -> Self {
        Self {
            bin: bin.into(),
            top_ports,
        }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "naabu".to_string(),
            bin: self.bin.clone(),
            args: vec![
                "-silent".to_string(),
                "-top-ports".to_string(),
                self.top_ports.to_string(),
            ],
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("naabu.txt"),
        }
    }
}

#[async_trait]
impl ToolPlugin for NaabuTool {
    fn name(&self) -> &str {
        "naabu"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}
