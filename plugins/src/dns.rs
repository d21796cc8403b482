//! DNS liveness adapter. `-resp` makes dnsx print `host [ip]` lines, the
//! format the liveness stage parses.

use async_trait::async_trait;

use overwatch_core::error::ToolError;
use overwatch_core::tools::{run_tool, ProcessSpec, ToolInvocation, ToolOutput, ToolPlugin};

pub struct DnsxTool {
    bin: String,
}

impl DnsxTool {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn spec(&self, req: &ToolInvocation) -> ProcessSpec {
        ProcessSpec {
            tool: "dnsx".to_string(),
            bin: self.bin.clone(),
            args: vec![
                "-silent".to_string(),
                "-a".to_string(),
                "-resp".to_string(),
            ],
            stdin_lines: Some(req.targets.clone()),
            artifact: req.output_dir.join("dnsx.txt"),
        }
    }
}

#[async_trait]
impl ToolPlugin for DnsxTool {
    fn name(&self) -> &str {
        "dnsx"
    }

    fn is_available(&self) -> bool {
        which::which(&self.bin).is_ok()
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        run_tool(self.spec(&req), &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_dnsx_args_and_stdin() {
        let req = ToolInvocation::new(
            vec!["a.example.com".to_string()],
            std::path::PathBuf::from("/tmp/raw"),
            Duration::from_secs(1),
        );
        let spec = DnsxTool::new("dnsx").spec(&req);
        assert_eq!(spec.args, vec!["-silent", "-a", "-resp"]);
        assert_eq!(spec.stdin_lines, Some(vec!["a.example.com".to_string()]));
    }
}
