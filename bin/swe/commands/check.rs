//! `swe-bench check` - report a finished run

use anyhow::{bail, Result};
use swe_harness::dataset::load_predictions;
use swe_harness::results::{find_latest_run, load_results, print_report};
use swe_harness::HarnessConfig;

pub fn execute(config: &HarnessConfig, run: Option<&str>) -> Result<()> {
    let run_dir = match run {
        Some(name) => {
            let dir = config.dirs.results.join(name);
            if !dir.join("results.json").exists() {
                bail!("no results found for run '{}'", name);
            }
            dir
        }
        None => match find_latest_run(&config.dirs.results)? {
            Some(dir) => dir,
            None => bail!(
                "no runs found under '{}'. Run 'swe-bench run' first.",
                config.dirs.results.display()
            ),
        },
    };

    let results = load_results(&run_dir)?;
    print_report(&results);

    // cross-reference the predictions file: anything predicted but not
    // evaluated is still pending
    let predictions_path = config
        .dirs
        .predictions
        .join(format!("{}.jsonl", results.name));
    if predictions_path.exists() {
        let predictions = load_predictions(&predictions_path)?;
        let pending: Vec<&str> = predictions
            .iter()
            .filter(|p| {
                results
                    .instances
                    .iter()
                    .find(|i| i.instance_id == p.instance_id)
                    .map(|i| i.resolved.is_none())
                    .unwrap_or(true)
            })
            .map(|p| p.instance_id.as_str())
            .collect();

        println!("\n  Predictions: {}", predictions_path.display());
        println!("  Recorded:    {}", predictions.len());
        if !pending.is_empty() {
            println!("  ⚠ {} prediction(s) not yet evaluated:", pending.len());
            for id in pending {
                println!("      {}", id);
            }
        }
    }

    println!();
    Ok(())
}
