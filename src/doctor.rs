//! Environment diagnostics
//!
//! Checks that the external collaborators the harness invokes are actually
//! present and working: git, at least one code-assistant CLI, and a
//! responsive Docker daemon. Missing working directories are created rather
//! than reported as failures.

use std::time::Duration;

use serde::Serialize;

use crate::backend::{create_backend, BackendError, BackendKind};
use crate::config::HarnessConfig;
use crate::docker::DockerExecutor;

/// Status of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Warn => "⚠",
            Self::Fail => "✗",
        }
    }
}

/// One diagnostic check result
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckReport {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    fn warn(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }
}

/// Full diagnostic report
#[derive(Debug, Clone, Serialize, Default)]
pub struct DoctorReport {
    pub checks: Vec<CheckReport>,
}

impl DoctorReport {
    /// All good when nothing failed (warnings are fine)
    pub fn ok(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    fn push(&mut self, check: CheckReport) {
        self.checks.push(check);
    }
}

/// Run every diagnostic check
pub async fn run_checks(config: &HarnessConfig) -> DoctorReport {
    let mut report = DoctorReport::default();

    check_git(&mut report).await;
    check_backends(&mut report).await;
    check_docker(&mut report).await;
    check_dirs(config, &mut report);

    report
}

async fn check_git(report: &mut DoctorReport) {
    match crate::backend::probe_version("git", "git", &["--version"]).await {
        Ok(version) => report.push(CheckReport::pass("git", version)),
        Err(e) => report.push(CheckReport::fail("git", e.to_string())),
    }
}

async fn check_backends(report: &mut DoctorReport) {
    let mut available = Vec::new();

    for kind in BackendKind::ALL {
        let backend = create_backend(kind, None);
        let name = format!("{} CLI", kind);
        match backend.probe().await {
            Ok(version) => {
                report.push(CheckReport::pass(&name, version));
                available.push(kind);
            }
            Err(BackendError::NotFound(_, _)) => {
                report.push(CheckReport::warn(
                    &name,
                    format!("not found (install: {})", kind.install_hint()),
                ));
            }
            Err(e) => report.push(CheckReport::warn(&name, e.to_string())),
        }
    }

    if available.is_empty() {
        report.push(CheckReport::fail(
            "code-assistant CLIs",
            "no code-assistant CLI found; install at least one of claude, codex, gemini, cline",
        ));
    } else {
        report.push(CheckReport::pass(
            "code-assistant CLIs",
            format!(
                "{} available",
                available
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));

        if available.contains(&BackendKind::Claude) {
            smoke_test_claude(report).await;
        }
    }
}

/// Run a trivial prompt through claude headless mode. A timeout here is a
/// warning, not a failure: the CLI may be waiting for a login flow.
async fn smoke_test_claude(report: &mut DoctorReport) {
    let backend = create_backend(BackendKind::Claude, None);
    let workdir = std::env::temp_dir();

    match backend
        .run("Reply with the single word: ok", &workdir, Duration::from_secs(30))
        .await
    {
        Ok(run) if run.timed_out => {
            report.push(CheckReport::warn(
                "claude smoke test",
                "timed out (this might be normal if it requires interaction)",
            ));
        }
        Ok(run) if run.success() => {
            report.push(CheckReport::pass("claude smoke test", "executed successfully"));
        }
        Ok(run) => {
            report.push(CheckReport::warn(
                "claude smoke test",
                format!(
                    "exit code {}: {}",
                    run.exit_code,
                    run.stderr.chars().take(200).collect::<String>()
                ),
            ));
        }
        Err(e) => {
            report.push(CheckReport::warn("claude smoke test", e.to_string()));
        }
    }
}

async fn check_docker(report: &mut DoctorReport) {
    match crate::backend::probe_version("docker", "docker", &["--version"]).await {
        Ok(version) => report.push(CheckReport::pass("docker", version)),
        Err(e) => {
            report.push(CheckReport::fail("docker", e.to_string()));
            return;
        }
    }

    match DockerExecutor::connect().await {
        Ok(_) => report.push(CheckReport::pass("docker daemon", "running")),
        Err(_) => report.push(CheckReport::fail(
            "docker daemon",
            "not running. Try: sudo systemctl start docker (Linux) or start Docker Desktop (macOS/Windows)",
        )),
    }
}

fn check_dirs(config: &HarnessConfig, report: &mut DoctorReport) {
    for (name, path) in config.dirs.all() {
        let label = format!("directory '{}'", name);
        if path.exists() {
            report.push(CheckReport::pass(&label, path.display().to_string()));
        } else {
            match std::fs::create_dir_all(path) {
                Ok(()) => report.push(CheckReport::warn(
                    &label,
                    format!("did not exist, created {}", path.display()),
                )),
                Err(e) => report.push(CheckReport::fail(
                    &label,
                    format!("cannot create {}: {}", path.display(), e),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_ok_ignores_warnings() {
        let mut report = DoctorReport::default();
        report.push(CheckReport::pass("a", ""));
        report.push(CheckReport::warn("b", ""));
        assert!(report.ok());

        report.push(CheckReport::fail("c", ""));
        assert!(!report.ok());
    }

    #[test]
    fn test_status_symbols() {
        assert_eq!(CheckStatus::Pass.symbol(), "✓");
        assert_eq!(CheckStatus::Warn.symbol(), "⚠");
        assert_eq!(CheckStatus::Fail.symbol(), "✗");
    }

    #[test]
    fn test_check_dirs_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.dirs.predictions = tmp.path().join("p");
        config.dirs.results = tmp.path().join("r");
        config.dirs.evaluation_results = tmp.path().join("e");
        config.dirs.workspaces = tmp.path().join("w");
        config.dirs.cache = tmp.path().join("c");

        let mut report = DoctorReport::default();
        check_dirs(&config, &mut report);

        assert!(config.dirs.predictions.exists());
        assert!(report
            .checks
            .iter()
            .all(|c| c.status != CheckStatus::Fail));
    }
}
