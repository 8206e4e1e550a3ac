//! Cline CLI backend

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::{run_with_timeout, AssistantRun, BackendError, CodeAssistant};

/// Drives the `cline` CLI.
///
/// Invocation: `cline -y -F plain --oneshot <prompt>` with the prompt as a
/// positional argument. Cline does not accept a model via task settings
/// (`-s model=` fails with "unsupported field 'model'"); models are
/// configured through `cline auth`, so a model override is ignored here.
pub struct ClineBackend {
    model: Option<String>,
}

impl ClineBackend {
    pub fn new(model: Option<String>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl CodeAssistant for ClineBackend {
    fn name(&self) -> &str {
        "cline"
    }

    fn binary(&self) -> &str {
        "cline"
    }

    /// Cline may need more time than the other CLIs for complex tasks
    fn default_timeout(&self) -> Duration {
        Duration::from_secs(1800)
    }

    async fn probe(&self) -> Result<String, BackendError> {
        // cline uses a `version` subcommand, not `--version`
        super::probe_version(self.name(), self.binary(), &["version"]).await
    }

    async fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<AssistantRun, BackendError> {
        if self.model.is_some() {
            warn!("cline does not support a model override; configure it via 'cline auth'");
        }

        let mut cmd = Command::new(self.binary());
        cmd.args(["-y", "-F", "plain", "--oneshot"]);
        cmd.arg(prompt);
        cmd.current_dir(workdir);

        info!(workdir = %workdir.display(), "running cline");
        run_with_timeout(cmd, None, timeout).await
    }
}
