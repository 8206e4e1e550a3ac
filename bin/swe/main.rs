//! SWE-bench harness CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "swe-bench")]
#[command(about = "SWE-bench evaluation harness for code-assistant CLIs")]
#[command(version)]
struct Cli {
    /// Config file (defaults to swe-harness.toml when present)
    #[arg(short, long, global = true, env = "SWE_HARNESS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the benchmark: generate patches and evaluate them
    Run {
        /// HuggingFace dataset identifier
        #[arg(long, env = "SWE_BENCH_DATASET")]
        dataset: Option<String>,

        /// Dataset split
        #[arg(long)]
        split: Option<String>,

        /// Maximum number of instances to run
        #[arg(long)]
        limit: Option<usize>,

        /// Skip Docker evaluation; only generate predictions
        #[arg(long)]
        no_eval: bool,

        /// Assistant backend (claude, codex, gemini, cline)
        #[arg(short, long, env = "SWE_BENCH_BACKEND")]
        backend: Option<String>,

        /// Model override passed to the backend
        #[arg(short, long)]
        model: Option<String>,

        /// Context length (k) for LongCodeBench datasets
        #[arg(long)]
        context_length: Option<u32>,

        /// Results output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Multiplier applied to all timeouts
        #[arg(long)]
        timeout_multiplier: Option<f64>,
    },

    /// Report the latest (or a named) run
    Check {
        /// Run name under the results directory
        #[arg(long)]
        run: Option<String>,
    },

    /// Check the environment is ready (CLIs, Docker, directories)
    Doctor,

    /// Inspect datasets without running anything
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DatasetCommands {
    /// Show dataset details and sample instances
    Info {
        /// HuggingFace dataset identifier
        id: String,

        /// Dataset split
        #[arg(long, default_value = "test")]
        split: String,

        /// Number of instances to inspect
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swe_harness=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = swe_harness::HarnessConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            dataset,
            split,
            limit,
            no_eval,
            backend,
            model,
            context_length,
            output_dir,
            timeout_multiplier,
        } => {
            let mut config = config;
            if let Some(multiplier) = timeout_multiplier {
                config.run.timeout_multiplier = multiplier;
            }
            let options = swe_harness::RunOptions {
                dataset,
                split,
                backend,
                model,
                limit,
                no_eval,
                context_length,
                output_dir,
            };
            commands::run::execute(config, options).await
        }
        Commands::Check { run } => commands::check::execute(&config, run.as_deref()),
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Dataset { command } => match command {
            DatasetCommands::Info { id, split, limit } => {
                commands::dataset::execute(&config, &id, &split, limit).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_shape() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dataset_info_subcommand() {
        let cli = Cli::try_parse_from(["swe-bench", "dataset", "info", "org/ds"]).unwrap();
        match cli.command {
            Commands::Dataset {
                command: DatasetCommands::Info { id, split, limit },
            } => {
                assert_eq!(id, "org/ds");
                assert_eq!(split, "test");
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // the id alone is not a dataset subcommand
        assert!(Cli::try_parse_from(["swe-bench", "dataset", "org/ds"]).is_err());
    }
}
