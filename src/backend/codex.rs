//! Codex CLI backend

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use super::{run_with_timeout, AssistantRun, BackendError, CodeAssistant};

/// Drives the `codex` CLI.
///
/// Uses the `exec` subcommand for non-interactive execution with
/// `--full-auto` for sandboxed automatic edits; the prompt goes in on stdin.
pub struct CodexBackend {
    model: Option<String>,
}

impl CodexBackend {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl CodeAssistant for CodexBackend {
    fn name(&self) -> &str {
        "codex"
    }

    fn binary(&self) -> &str {
        "codex"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(600)
    }

    async fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<AssistantRun, BackendError> {
        let mut cmd = Command::new(self.binary());
        cmd.arg("exec");
        if let Some(model) = &self.model {
            cmd.args(["--model", model]);
        }
        cmd.arg("--full-auto");
        cmd.current_dir(workdir);

        info!(workdir = %workdir.display(), "running codex exec");
        run_with_timeout(cmd, Some(prompt), timeout).await
    }
}
