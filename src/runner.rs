//! End-to-end run pipeline
//!
//! For each instance: check out the repository at the base commit, build the
//! prompt, let the assistant edit the tree, extract the diff as the model
//! patch, record it in the predictions file, and (unless evaluation is
//! skipped) evaluate the patch in the instance's Docker image.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::{create_backend, BackendKind, CodeAssistant};
use crate::config::HarnessConfig;
use crate::dataset::{
    append_prediction, longcode, HuggingFaceDataset, Prediction, SweInstance,
};
use crate::eval::Evaluator;
use crate::prompt;
use crate::results::{InstanceResult, ResultExporter, RunResults};
use crate::workspace::WorkspaceManager;

/// Options for one run, layered over the config defaults
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dataset: Option<String>,
    pub split: Option<String>,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub limit: Option<usize>,
    pub no_eval: bool,
    pub context_length: Option<u32>,
    /// Override for the results directory
    pub output_dir: Option<PathBuf>,
}

/// Per-instance progress callback data
pub struct InstanceProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub instance_id: &'a str,
}

pub struct Runner {
    config: HarnessConfig,
    options: RunOptions,
}

impl Runner {
    pub fn new(config: HarnessConfig, options: RunOptions) -> Self {
        Self { config, options }
    }

    fn dataset_id(&self) -> &str {
        self.options
            .dataset
            .as_deref()
            .unwrap_or(&self.config.run.dataset)
    }

    fn split(&self) -> &str {
        self.options
            .split
            .as_deref()
            .unwrap_or(&self.config.run.split)
    }

    fn backend_kind(&self) -> Result<BackendKind> {
        BackendKind::parse(
            self.options
                .backend
                .as_deref()
                .unwrap_or(&self.config.run.backend),
        )
    }

    fn model(&self) -> Option<&str> {
        self.options
            .model
            .as_deref()
            .or(self.config.run.model.as_deref())
    }

    fn context_length(&self) -> Option<u32> {
        self.options.context_length.or(self.config.run.context_length)
    }

    /// Fetch and filter the instances this run will process
    pub async fn load_instances(&self) -> Result<Vec<SweInstance>> {
        let dataset_id = self.dataset_id();
        let dataset = HuggingFaceDataset::new(
            dataset_id,
            self.split(),
            self.config.dirs.cache.clone(),
        );

        info!(dataset = dataset_id, split = self.split(), "fetching dataset");
        // over-fetch is fine when filtering shrinks the set afterwards
        let mut instances = dataset
            .fetch(if self.context_length().is_some() {
                None
            } else {
                self.options.limit
            })
            .await
            .with_context(|| format!("failed to load dataset '{}'", dataset_id))?;

        if longcode::is_longcodebench_dataset(dataset_id) {
            info!("LongCodeBench dataset detected");
            if let Some(k) = self.context_length() {
                instances = longcode::filter_by_context_length(instances, dataset_id, k)?;
                info!(k = k, count = instances.len(), "filtered by context length");
            }
        } else if self.context_length().is_some() {
            warn!("--context-length set but dataset does not look like LongCodeBench");
        }

        if let Some(limit) = self.options.limit {
            instances.truncate(limit);
        }

        anyhow::ensure!(
            !instances.is_empty(),
            "no instances to run for dataset '{}'",
            dataset_id
        );
        Ok(instances)
    }

    /// Execute the full run. `progress` is invoked before each instance.
    pub async fn run(
        &self,
        mut progress: impl FnMut(InstanceProgress<'_>),
    ) -> Result<RunResults> {
        self.config.ensure_dirs()?;

        let kind = self.backend_kind()?;
        let backend = create_backend(kind, self.model());

        // fail fast before touching the dataset
        let version = backend
            .probe()
            .await
            .with_context(|| format!("backend '{}' is not usable", kind))?;
        info!(backend = %kind, version = %version, "backend ready");

        if std::env::var(kind.api_key_env()).is_err() {
            warn!(
                "{} is not set; the {} CLI may rely on its own login state",
                kind.api_key_env(),
                kind
            );
        }

        let instances = self.load_instances().await?;

        let run_name = format!(
            "run-{}-{}",
            kind,
            &Uuid::new_v4().as_simple().to_string()[..8]
        );
        let results_dir = self
            .options
            .output_dir
            .clone()
            .unwrap_or_else(|| self.config.dirs.results.clone())
            .join(&run_name);
        std::fs::create_dir_all(&results_dir)?;

        let predictions_path = self
            .config
            .dirs
            .predictions
            .join(format!("{}.jsonl", run_name));

        let evaluator = if self.options.no_eval {
            None
        } else {
            Some(
                Evaluator::new(
                    self.config.docker.clone(),
                    self.config.dirs.evaluation_results.clone(),
                    self.config.eval_timeout(),
                )
                .await
                .context("evaluation requested but Docker is unavailable (use --no-eval to skip)")?,
            )
        };

        let workspaces = WorkspaceManager::new(self.config.dirs.workspaces.clone());
        let model_label = self
            .model()
            .map(String::from)
            .unwrap_or_else(|| kind.to_string());

        let mut results = RunResults::new(
            &run_name,
            self.dataset_id(),
            &kind.to_string(),
            self.model(),
        );

        let total = instances.len();
        for (index, instance) in instances.iter().enumerate() {
            progress(InstanceProgress {
                index,
                total,
                instance_id: &instance.instance_id,
            });

            let result = self
                .run_instance(
                    backend.as_ref(),
                    &workspaces,
                    evaluator.as_ref(),
                    instance,
                    &predictions_path,
                    &model_label,
                    &run_name,
                )
                .await;

            match result {
                Ok(instance_result) => results.add(instance_result),
                Err(e) => {
                    error!(instance = %instance.instance_id, error = %e, "instance failed");
                    results.add(InstanceResult {
                        instance_id: instance.instance_id.clone(),
                        backend: kind.to_string(),
                        model: self.model().map(String::from),
                        patched: false,
                        resolved: None,
                        duration_sec: 0.0,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        results.complete();

        let exporter = ResultExporter::new(&results_dir);
        exporter.export_all(&results)?;
        info!(run = %run_name, "run complete");

        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_instance(
        &self,
        backend: &dyn CodeAssistant,
        workspaces: &WorkspaceManager,
        evaluator: Option<&Evaluator>,
        instance: &SweInstance,
        predictions_path: &std::path::Path,
        model_label: &str,
        run_name: &str,
    ) -> Result<InstanceResult> {
        let start = std::time::Instant::now();

        let worktree = workspaces
            .prepare(&instance.instance_id, &instance.repo, &instance.base_commit)
            .await
            .context("workspace preparation failed")?;

        let context = if longcode::has_context_files(instance) {
            let paths = longcode::context_files(instance);
            prompt::gather_context_files(&worktree, &paths, self.config.run.max_context_bytes)
        } else {
            Vec::new()
        };

        let prompt_text = prompt::build_prompt(instance, &context);
        let run = backend
            .run(
                &prompt_text,
                &worktree,
                self.config.prompt_timeout(backend.default_timeout()),
            )
            .await
            .context("assistant invocation failed")?;

        if !run.success() {
            warn!(
                instance = %instance.instance_id,
                exit_code = run.exit_code,
                timed_out = run.timed_out,
                "assistant did not finish cleanly"
            );
        }

        let patch = workspaces.extract_patch(&worktree).await?;
        let patched = !patch.trim().is_empty();

        if patched {
            append_prediction(
                predictions_path,
                &Prediction {
                    instance_id: instance.instance_id.clone(),
                    model_name_or_path: model_label.to_string(),
                    model_patch: patch.clone(),
                },
            )?;
        } else {
            warn!(instance = %instance.instance_id, "assistant produced no changes");
        }

        let resolved = match (patched, evaluator) {
            (true, Some(evaluator)) => {
                let prediction = Prediction {
                    instance_id: instance.instance_id.clone(),
                    model_name_or_path: model_label.to_string(),
                    model_patch: patch,
                };
                let outcome = evaluator.evaluate(instance, &prediction, run_name).await;
                if let Some(err) = &outcome.error {
                    warn!(instance = %instance.instance_id, error = %err, "evaluation error");
                }
                Some(outcome.resolved)
            }
            _ => None,
        };

        if let Err(e) = workspaces.cleanup(&instance.instance_id, &instance.repo).await {
            warn!(instance = %instance.instance_id, error = %e, "worktree cleanup failed");
        }

        let error = if run.timed_out {
            Some("assistant timed out".to_string())
        } else if !run.success() {
            Some(format!("assistant exit code {}", run.exit_code))
        } else {
            None
        };

        Ok(InstanceResult {
            instance_id: instance.instance_id.clone(),
            backend: backend.name().to_string(),
            model: self.model().map(String::from),
            patched,
            resolved,
            duration_sec: start.elapsed().as_secs_f64(),
            error,
        })
    }
}
