//! Vulnerability assessment adapter. JSON-lines findings filtered to the
//! configured severities, with tool-level rate limiting.

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct NucleiTool {
    bin: String,
    severities: Vec<String>,
    rate_limit: u32,
    concurrency: u32,
}

impl NucleiTool {
    pub fn new(
        bin: impl Into<String>,
        severities: Vec<String>,
        rate_limit: u32,
        concurrency: u32,
    ) -> Self {
        Self {
            bin: bin.into(),
            severities,
            rate_limit,
            concurrency,
        }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "nuclei".to_string(),
            bin: self.bin.clone(),
            args: vec![
                "-silent".to_string(),
                "-jsonl".to_string(),
                "-severity".to_string(),
                self.severities.join(","),
                "-rate-limit".to_string(),
                self.rate_limit.to_string(),
                "-c".to_string(),
                self.concurrency.to_string(),
            ],
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("nuclei.jsonl"),
        }
    }
}

#[async_trait]
impl ToolPlugin for NucleiTool {
    fn name(&self) -> &str {
        "nuclei"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}
