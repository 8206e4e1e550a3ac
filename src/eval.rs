//! Containerized evaluation of predicted patches
//!
//! Each instance runs in its prebuilt SWE-bench evaluation image: the model
//! patch is applied to the checkout baked into the image at `/testbed`, the
//! gold test patch is applied on top, and the fail-to-pass tests are run.
//! Full output is written under `evaluation_results/<run>/<instance_id>/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DockerSettings;
use crate::dataset::{Prediction, SweInstance};
use crate::docker::{ContainerRun, DockerExecutor};

/// Repository checkout location inside SWE-bench evaluation images
const TESTBED: &str = "/testbed";

/// Outcome of evaluating one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub instance_id: String,
    /// Tests exited 0 after the model patch was applied
    pub resolved: bool,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_sec: f64,
    pub log_path: PathBuf,
    pub error: Option<String>,
}

impl EvalOutcome {
    fn failed(instance_id: &str, log_path: PathBuf, error: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            resolved: false,
            exit_code: -1,
            timed_out: false,
            duration_sec: 0.0,
            log_path,
            error: Some(error.to_string()),
        }
    }
}

pub struct Evaluator {
    docker: DockerExecutor,
    settings: DockerSettings,
    output_dir: PathBuf,
    timeout: std::time::Duration,
}

impl Evaluator {
    pub async fn new(
        settings: DockerSettings,
        output_dir: PathBuf,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let docker = DockerExecutor::connect().await?;
        Ok(Self {
            docker,
            settings,
            output_dir,
            timeout,
        })
    }

    /// Evaluate one prediction; infrastructure failures are folded into the
    /// outcome so a bad instance never aborts the run.
    pub async fn evaluate(
        &self,
        instance: &SweInstance,
        prediction: &Prediction,
        run_name: &str,
    ) -> EvalOutcome {
        let log_dir = self.output_dir.join(run_name).join(&instance.instance_id);
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            return EvalOutcome::failed(
                &instance.instance_id,
                log_dir,
                &format!("failed to create log dir: {}", e),
            );
        }

        match self.run_in_container(instance, prediction, &log_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(instance = %instance.instance_id, error = %e, "evaluation failed");
                EvalOutcome::failed(&instance.instance_id, log_dir, &format!("{:#}", e))
            }
        }
    }

    async fn run_in_container(
        &self,
        instance: &SweInstance,
        prediction: &Prediction,
        log_dir: &Path,
    ) -> Result<EvalOutcome> {
        let image = image_for(&self.settings.image_prefix, &instance.instance_id);
        info!(instance = %instance.instance_id, image = %image, "starting evaluation");

        let start = std::time::Instant::now();
        let container = self.docker.launch(&image, &self.settings).await?;
        container.start().await?;

        let result = self
            .apply_and_test(&container, instance, prediction, log_dir)
            .await;

        // always clean up, even when the pipeline failed
        let _ = container.stop().await;
        if let Err(e) = container.remove().await {
            warn!(container = container.id(), error = %e, "failed to remove container");
        }

        let mut outcome = result?;
        outcome.duration_sec = start.elapsed().as_secs_f64();
        self.write_outcome(log_dir, &outcome)?;
        Ok(outcome)
    }

    async fn apply_and_test(
        &self,
        container: &ContainerRun,
        instance: &SweInstance,
        prediction: &Prediction,
        log_dir: &Path,
    ) -> Result<EvalOutcome> {
        // model patch
        container
            .write_file("/tmp/model.patch", &prediction.model_patch)
            .await?;
        let applied = container
            .shell(&format!(
                "cd {} && (git apply -v /tmp/model.patch || patch -p1 < /tmp/model.patch)",
                TESTBED
            ))
            .await?;
        std::fs::write(log_dir.join("apply_model_patch.log"), applied.output())?;
        if !applied.success() {
            return Ok(EvalOutcome::failed(
                &instance.instance_id,
                log_dir.to_path_buf(),
                "model patch did not apply",
            ));
        }

        // gold test patch
        if !instance.test_patch.trim().is_empty() {
            container
                .write_file("/tmp/test.patch", &instance.test_patch)
                .await?;
            let applied = container
                .shell(&format!(
                    "cd {} && (git apply -v /tmp/test.patch || patch -p1 < /tmp/test.patch)",
                    TESTBED
                ))
                .await?;
            std::fs::write(log_dir.join("apply_test_patch.log"), applied.output())?;
            if !applied.success() {
                return Ok(EvalOutcome::failed(
                    &instance.instance_id,
                    log_dir.to_path_buf(),
                    "test patch did not apply",
                ));
            }
        }

        // tests
        let script = test_script(instance);
        let run = container.run_script(&script, self.timeout).await?;
        std::fs::write(log_dir.join("test_output.txt"), run.exec.output())
            .context("failed to write test output")?;

        Ok(EvalOutcome {
            instance_id: instance.instance_id.clone(),
            resolved: run.exec.success() && !run.timed_out,
            exit_code: run.exec.exit_code,
            timed_out: run.timed_out,
            duration_sec: 0.0,
            log_path: log_dir.to_path_buf(),
            error: if run.timed_out {
                Some("tests timed out".to_string())
            } else {
                None
            },
        })
    }

    fn write_outcome(&self, log_dir: &Path, outcome: &EvalOutcome) -> Result<()> {
        let report = serde_json::json!({
            "outcome": outcome,
            "evaluated_at": Utc::now(),
        });
        std::fs::write(
            log_dir.join("outcome.json"),
            serde_json::to_string_pretty(&report)?,
        )?;
        Ok(())
    }
}

/// Evaluation image for an instance.
///
/// Registry image names cannot contain `__`, so SWE-bench publishes them
/// with `__` replaced by `_1776_`.
pub fn image_for(prefix: &str, instance_id: &str) -> String {
    format!("{}{}:latest", prefix, instance_id.replace("__", "_1776_"))
}

/// Test command for an instance.
///
/// An explicit `test_cmd`/`test_command` column wins; otherwise the
/// fail-to-pass tests are run through pytest, which covers the published
/// Python datasets.
pub fn test_script(instance: &SweInstance) -> String {
    for field in ["test_cmd", "test_command"] {
        if let Some(cmd) = instance.extra.get(field).and_then(|v| v.as_str()) {
            return format!("cd {}\n{}\n", TESTBED, cmd);
        }
    }

    let mut script = format!("cd {}\n", TESTBED);
    if instance.fail_to_pass.is_empty() {
        script.push_str("python -m pytest -x\n");
    } else {
        let tests = instance
            .fail_to_pass
            .iter()
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(" ");
        script.push_str(&format!("python -m pytest -rA {}\n", tests));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(extra: serde_json::Value) -> SweInstance {
        let mut base = serde_json::json!({
            "instance_id": "django__django-11099",
            "repo": "django/django",
            "base_commit": "deadbeef",
            "problem_statement": "..."
        });
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_image_naming() {
        assert_eq!(
            image_for("swebench/sweb.eval.x86_64.", "django__django-11099"),
            "swebench/sweb.eval.x86_64.django_1776_django-11099:latest"
        );
    }

    #[test]
    fn test_script_uses_explicit_command() {
        let inst = instance(serde_json::json!({"test_cmd": "tox -e py38"}));
        let script = test_script(&inst);
        assert!(script.contains("tox -e py38"));
        assert!(!script.contains("pytest"));
    }

    #[test]
    fn test_script_falls_back_to_fail_to_pass() {
        let inst = instance(
            serde_json::json!({"fail_to_pass": ["tests/test_a.py::test_x", "tests/test_b.py::test_y"]}),
        );
        let script = test_script(&inst);
        assert!(script.contains("python -m pytest -rA"));
        assert!(script.contains("'tests/test_a.py::test_x'"));
        assert!(script.contains("'tests/test_b.py::test_y'"));
    }

    #[test]
    fn test_script_without_tests_runs_suite() {
        let inst = instance(serde_json::json!({}));
        assert!(test_script(&inst).contains("python -m pytest -x"));
    }
}
