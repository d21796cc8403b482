//! HTTP service probe adapter. JSON-lines output carrying status, title,
//! server banner and detected technologies per live URL.

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct HttpxTool {
    bin: String,
}

impl HttpxTool {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "httpx".to_string(),
            bin: self.bin.clone(),
            args: vec![
                "-silent".to_string(),
                "-json".to_string(),
                "-status-code".to_string(),
                "-title".to_string(),
                "-web-server".to_string(),
                "-tech-detect".to_string(),
            ],
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("httpx.jsonl"),
        }
    }
}

#[async_trait]
impl ToolPlugin for HttpxTool {
    fn name(&self) -> &str {
        "httpx"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}
