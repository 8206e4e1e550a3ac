//! Claude CLI backend

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use super::{run_with_timeout, AssistantRun, BackendError, CodeAssistant};

/// Drives the `claude` CLI in headless mode.
///
/// The prompt is sent on stdin with `-p`; `--dangerously-skip-permissions`
/// is required for unattended edits inside the workspace.
pub struct ClaudeBackend {
    model: Option<String>,
}

impl ClaudeBackend {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl CodeAssistant for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    fn binary(&self) -> &str {
        "claude"
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
        cmd.args(["-p", "--dangerously-skip-permissions"]);
        if let Some(model) = &self.model {
            cmd.args(["--model", model]);
        }
        cmd.current_dir(workdir);

        info!(workdir = %workdir.display(), "running claude");
        run_with_timeout(cmd, Some(prompt), timeout).await
    }
}
