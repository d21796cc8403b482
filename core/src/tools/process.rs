//! Shared process runtime for tool adapters.
//!
//! Adapters build a [`ProcessSpec`] (binary + args) and delegate spawning,
//! stdin feeding, timeout, cancellation, and stdout persistence here.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::error::ToolError;

use super::{ToolInvocation, ToolOutput};

/// How many bytes of stderr are kept for error reporting.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Adapter name, used in errors and logs.
    pub tool: String,
    pub bin: String,
    pub args: Vec<String>,
    /// Lines fed to the child on stdin (one target per line). None leaves
    /// stdin closed.
    pub stdin_lines: Option<Vec<String>>,
    /// File the child's stdout is persisted to, even on failure.
    pub artifact: std::path::PathBuf,
}

/// Run an external tool to completion under the invocation's timeout and
/// cancellation rules. Partial stdout is persisted before errors return so
/// interrupted runs keep their artifacts.
pub async fn run_tool(spec: ProcessSpec, req: &ToolInvocation) -> Result<ToolOutput, ToolError> {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.bin);
    cmd.args(&spec.args)
        .envs(&req.env)
        .stdin(if spec.stdin_lines.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| ToolError::Spawn {
        tool: spec.tool.clone(),
        source: e,
    })?;

    if let Some(lines) = &spec.stdin_lines {
        if let Some(mut stdin) = child.stdin.take() {
            let payload = lines.join("\n");
            stdin.write_all(payload.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.shutdown().await?;
        }
    }

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(err) = stderr.as_mut() {
            let _ = err.read_to_end(&mut buf).await;
        }
        buf
    });

    let verdict = wait_bounded(&mut child, &spec, req).await;

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    // Persist whatever the tool produced before deciding the outcome.
    if let Some(parent) = spec.artifact.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&spec.artifact, &stdout_bytes).await?;

    let exit_code = verdict?;
    if exit_code != 0 {
        return Err(ToolError::NonZeroExit {
            tool: spec.tool,
            code: exit_code,
            stderr_tail: tail_of(&stderr_bytes),
        });
    }

    let lines = String::from_utf8_lossy(&stdout_bytes)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    Ok(ToolOutput {
        artifact: spec.artifact,
        lines,
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Wait for the child, bounded by the per-invocation timeout and the run's
/// cancel channel. A cancel signal grants the grace period, then kills.
async fn wait_bounded(
    child: &mut Child,
    spec: &ProcessSpec,
    req: &ToolInvocation,
) -> Result<i32, ToolError> {
    let mut cancel = req.cancel.clone();

    let cancelled = async {
        match cancel.as_mut() {
            Some(rx) => {
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        // Scheduler gone; treat as cancel.
                        break;
                    }
                }
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(ToolError::Io)?;
            Ok(status.code().unwrap_or(-1))
        }
        _ = tokio::time::sleep(req.timeout) => {
            let _ = child.kill().await;
            Err(ToolError::Timeout {
                tool: spec.tool.clone(),
                secs: req.timeout.as_secs(),
            })
        }
        _ = cancelled => {
            // Grace period before forcible termination.
            let grace = tokio::time::timeout(req.cancel_grace, child.wait()).await;
            if grace.is_err() {
                let _ = child.kill().await;
            }
            Err(ToolError::Cancelled(spec.tool.clone()))
        }
    }
}

fn tail_of(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::watch;

    fn invocation(dir: &std::path::Path, timeout: Duration) -> ToolInvocation {
        ToolInvocation {
            targets: vec![],
            output_dir: dir.to_path_buf(),
            env: HashMap::new(),
            timeout,
            cancel: None,
            cancel_grace: Duration::from_millis(100),
        }
    }

    fn spec(dir: &std::path::Path, bin: &str, args: &[&str]) -> ProcessSpec {
        ProcessSpec {
            tool: "test-tool".to_string(),
            bin: bin.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin_lines: None,
            artifact: dir.join("out.txt"),
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let req = invocation(tmp.path(), Duration::from_secs(5));
        let out = run_tool(
            spec(tmp.path(), "sh", &["-c", "printf 'a\\nb\\n\\nc\\n'"]),
            &req,
        )
        .await
        .unwrap();
        assert_eq!(out.lines, vec!["a", "b", "c"]);
        assert_eq!(out.exit_code, 0);
        let persisted = std::fs::read_to_string(out.artifact).unwrap();
        assert!(persisted.contains('a'));
    }

    #[tokio::test]
    async fn test_stdin_lines_are_fed() {
        let tmp = tempfile::tempdir().unwrap();
        let req = invocation(tmp.path(), Duration::from_secs(5));
        let mut s = spec(tmp.path(), "cat", &[]);
        s.stdin_lines = Some(vec!["one".to_string(), "two".to_string()]);
        let out = run_tool(s, &req).await.unwrap();
        assert_eq!(out.lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let req = invocation(tmp.path(), Duration::from_secs(5));
        let err = run_tool(
            spec(tmp.path(), "sh", &["-c", "echo boom >&2; exit 3"]),
            &req,
        )
        .await
        .unwrap_err();
        match err {
            ToolError::NonZeroExit {
                code, stderr_tail, ..
            } => {
                assert_eq!(code, 3);
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let tmp = tempfile::tempdir().unwrap();
        let req = invocation(tmp.path(), Duration::from_millis(200));
        let err = run_tool(spec(tmp.path(), "sleep", &["30"]), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancel_terminates_within_grace() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let mut req = invocation(tmp.path(), Duration::from_secs(30));
        req.cancel = Some(rx);

        let s = spec(tmp.path(), "sleep", &["30"]);
        let handle = tokio::spawn(async move { run_tool(s, &req).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ToolError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let req = invocation(tmp.path(), Duration::from_secs(1));
        let err = run_tool(spec(tmp.path(), "definitely-not-a-binary-xyz", &[]), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
