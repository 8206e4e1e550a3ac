//! Gemini CLI backend

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use super::{run_with_timeout, AssistantRun, BackendError, CodeAssistant};

/// Drives the `gemini` CLI with `--yolo` auto-approval and the prompt
/// passed via `--prompt` for one-shot execution.
pub struct GeminiBackend {
    model: Option<String>,
}

impl GeminiBackend {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl CodeAssistant for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn binary(&self) -> &str {
        "gemini"
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
        cmd.arg("--yolo");
        if let Some(model) = &self.model {
            cmd.args(["--model", model]);
        }
        cmd.args(["--prompt", prompt]);
        cmd.current_dir(workdir);

        info!(workdir = %workdir.display(), "running gemini");
        run_with_timeout(cmd, None, timeout).await
    }
}
