//! SWE-bench evaluation harness
//!
//! Drives code-assistant CLIs (claude, codex, gemini, cline) against real
//! repositories checked out at a failing base commit, collects the patches
//! they produce, and evaluates them in Docker containers.
//!
//! ## Module Structure
//!
//! - `config`: harness configuration (directories, run defaults, docker limits)
//! - `backend`: code-assistant CLI drivers behind the [`CodeAssistant`] trait
//! - `dataset`: SWE-bench / LongCodeBench dataset access and prediction files
//! - `workspace`: per-instance git checkouts and patch extraction
//! - `prompt`: prompt assembly for the assistant CLIs
//! - `docker`: container executor for evaluation
//! - `eval`: containerized evaluation of predicted patches
//! - `results`: run aggregation, export, and reporting
//! - `doctor`: environment diagnostics
//! - `runner`: the end-to-end run pipeline

pub mod backend;
pub mod config;
pub mod dataset;
pub mod docker;
pub mod doctor;
pub mod eval;
pub mod prompt;
pub mod results;
pub mod runner;
pub mod workspace;

pub use backend::{create_backend, AssistantRun, BackendError, BackendKind, CodeAssistant};
pub use config::{DirsConfig, DockerSettings, HarnessConfig, RunSettings};
pub use dataset::{Prediction, SweInstance};
pub use eval::{EvalOutcome, Evaluator};
pub use results::{InstanceResult, RunResults, RunSummary};
pub use runner::{RunOptions, Runner};
