//! Visual capture adapter. URLs arrive on stdin; screenshots land in the
//! run's `screenshots/` directory (the invocation's output dir).

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct GowitnessTool {
    bin: String,
}

impl GowitnessTool {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "gowitness".to_string(),
            bin: self.bin.clone(),
            args: vec![
                "scan".to_string(),
                "file".to_string(),
                "-f".to_string(),
                "-".to_string(),
                "--screenshot-path".to_string(),
                req.output_dir.to_string_lossy().to_string(),
            ],
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("gowitness.log"),
        }
    }
}

#[async_trait]
impl ToolPlugin for GowitnessTool {
    fn name(&self) -> &str {
        "gowitness"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}
