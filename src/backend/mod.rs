//! Code-assistant CLI backends
//!
//! Each supported vendor CLI (claude, codex, gemini, cline) is driven
//! through the [`CodeAssistant`] trait: probe for availability, then run a
//! prompt inside a checked-out repository and capture the output. The CLIs
//! themselves are external collaborators; the harness only knows their
//! non-interactive invocation shape.

use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

mod claude;
mod cline;
mod codex;
mod gemini;

pub use claude::ClaudeBackend;
pub use cline::ClineBackend;
pub use codex::CodexBackend;
pub use gemini::GeminiBackend;

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0} CLI not found. Please ensure '{1}' is installed and in PATH")]
    NotFound(String, String),

    #[error("command timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{name} CLI returned error (exit code {code}): {stderr}")]
    Failed {
        name: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Captured output of one assistant invocation
#[derive(Debug, Clone)]
pub struct AssistantRun {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub timed_out: bool,
}

impl AssistantRun {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Interface to a code-assistant CLI
#[async_trait::async_trait]
pub trait CodeAssistant: Send + Sync {
    /// Backend name (e.g., "claude")
    fn name(&self) -> &str;

    /// Executable looked up on PATH
    fn binary(&self) -> &str;

    /// Default timeout for one prompt
    fn default_timeout(&self) -> Duration;

    /// Check the CLI is installed; returns the version string
    async fn probe(&self) -> Result<String, BackendError> {
        probe_version(self.name(), self.binary(), &["--version"]).await
    }

    /// Run a prompt with the repository at `workdir` as the working
    /// directory. Non-zero exit is a captured result, not an error.
    async fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<AssistantRun, BackendError>;
}

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Claude,
    Codex,
    Gemini,
    Cline,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [Self::Claude, Self::Codex, Self::Gemini, Self::Cline];

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            "gemini" => Ok(Self::Gemini),
            "cline" => Ok(Self::Cline),
            other => anyhow::bail!(
                "unknown backend '{}', expected one of: claude, codex, gemini, cline",
                other
            ),
        }
    }

    pub fn binary(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Cline => "cline",
        }
    }

    /// Environment variable carrying the backend's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::Codex => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Cline => "CLINE_API_KEY",
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            Self::Claude => "https://claude.ai/download",
            Self::Codex => "npm install -g @openai/codex",
            Self::Gemini => "npm install -g @google/gemini-cli",
            Self::Cline => "npm install -g cline",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Create a backend driver for the given kind
pub fn create_backend(kind: BackendKind, model: Option<&str>) -> Box<dyn CodeAssistant> {
    let model = model.map(String::from);
    match kind {
        BackendKind::Claude => Box::new(ClaudeBackend::new(model)),
        BackendKind::Codex => Box::new(CodexBackend::new(model)),
        BackendKind::Gemini => Box::new(GeminiBackend::new(model)),
        BackendKind::Cline => Box::new(ClineBackend::new(model)),
    }
}

/// Probe a CLI with a version-style subcommand
pub(crate) async fn probe_version(
    name: &str,
    binary: &str,
    args: &[&str],
) -> Result<String, BackendError> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(Duration::from_secs(5), cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BackendError::NotFound(
                name.to_string(),
                binary.to_string(),
            ));
        }
        Ok(Err(e)) => return Err(BackendError::Io(e)),
        Err(_) => return Err(BackendError::Timeout { secs: 5 }),
    };

    if !output.status.success() {
        return Err(BackendError::Failed {
            name: name.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Spawn a prepared command, optionally feed stdin, and wait under a timeout.
///
/// The pipes are drained concurrently with the wait, so on timeout the
/// child is killed and whatever output it produced before the deadline is
/// returned in a timed-out [`AssistantRun`] rather than an error, letting
/// the runner record it per instance.
pub(crate) async fn run_with_timeout(
    mut cmd: Command,
    stdin_data: Option<&str>,
    timeout: Duration,
) -> Result<AssistantRun, BackendError> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if stdin_data.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    debug!("spawning: {:?}", cmd);
    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("failed to open child stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("failed to open child stderr"))?;
    // drain before writing stdin so a chatty child cannot deadlock the pipes
    let stdout_task = tokio::spawn(drain(stdout));
    let stderr_task = tokio::spawn(drain(stderr));

    if let Some(input) = stdin_data {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open child stdin"))?;
        stdin.write_all(input.as_bytes()).await?;
        stdin.shutdown().await?;
    }

    let (timed_out, exit_code) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (false, status.code().unwrap_or(-1)),
        Ok(Err(e)) => return Err(BackendError::Io(e)),
        Err(_) => {
            warn!("assistant command timed out after {}s", timeout.as_secs());
            let _ = child.kill().await;
            (true, -1)
        }
    };

    // killing the child closes the pipes, so the readers finish either way
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(AssistantRun {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        exit_code,
        duration: start.elapsed(),
        timed_out,
    })
}

/// Collect a pipe to the end, keeping whatever arrived if reading fails
async fn drain(mut reader: impl tokio::io::AsyncRead + Unpin + Send) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_kind() {
        assert_eq!(BackendKind::parse("claude").unwrap(), BackendKind::Claude);
        assert_eq!(BackendKind::parse("CODEX").unwrap(), BackendKind::Codex);
        assert_eq!(BackendKind::parse("gemini").unwrap(), BackendKind::Gemini);
        assert_eq!(BackendKind::parse("cline").unwrap(), BackendKind::Cline);
        assert!(BackendKind::parse("copilot").is_err());
    }

    #[test]
    fn test_api_key_env() {
        assert_eq!(BackendKind::Claude.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(BackendKind::Codex.api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_create_backend_names() {
        for kind in BackendKind::ALL {
            let backend = create_backend(kind, None);
            assert_eq!(backend.name(), kind.binary());
        }
    }

    #[tokio::test]
    async fn test_run_with_timeout_captures_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; exit 3"]);
        let run = run_with_timeout(cmd, None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(run.stdout.trim(), "out");
        assert_eq!(run.stderr.trim(), "err");
        assert_eq!(run.exit_code, 3);
        assert!(!run.success());
    }

    #[tokio::test]
    async fn test_run_with_timeout_feeds_stdin() {
        let cmd = Command::new("cat");
        let run = run_with_timeout(cmd, Some("hello"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(run.stdout, "hello");
        assert!(run.success());
    }

    #[tokio::test]
    async fn test_run_with_timeout_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("10");
        let run = run_with_timeout(cmd, None, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(!run.success());
    }

    #[tokio::test]
    async fn test_timeout_preserves_partial_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo partial-stdout; echo partial-stderr >&2; sleep 10"]);
        let run = run_with_timeout(cmd, None, Duration::from_millis(500))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(run.stdout.contains("partial-stdout"));
        assert!(run.stderr.contains("partial-stderr"));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let err = probe_version("nope", "definitely-not-a-real-cli", &["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_, _)));
    }
}
