//! `swe-bench dataset` - inspect a dataset without running anything

use anyhow::Result;
use swe_harness::dataset::{longcode, HuggingFaceDataset};
use swe_harness::HarnessConfig;

pub async fn execute(config: &HarnessConfig, id: &str, split: &str, limit: usize) -> Result<()> {
    println!("\n  📦 Dataset: {} (split: {})\n", id, split);

    let is_lcb = longcode::is_longcodebench_dataset(id);
    println!("  LongCodeBench: {}", if is_lcb { "yes" } else { "no" });
    if let Some(k) = longcode::extract_context_length(id) {
        println!("  Context length (from name): k={}", k);
    }

    let dataset = HuggingFaceDataset::new(id, split, config.dirs.cache.clone());
    let instances = dataset.fetch(Some(limit)).await?;

    println!("  Fetched: {} instance(s)\n", instances.len());

    for instance in &instances {
        let statement = instance
            .problem_statement
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(60)
            .collect::<String>();

        println!("  {} ({})", instance.instance_id, instance.repo);
        println!("      base:  {}", &instance.base_commit[..instance.base_commit.len().min(12)]);
        println!("      issue: {}", statement);
        if longcode::has_context_files(instance) {
            println!(
                "      context files: {}",
                longcode::context_files(instance).len()
            );
        }
        if !instance.fail_to_pass.is_empty() {
            println!("      fail-to-pass tests: {}", instance.fail_to_pass.len());
        }
        println!();
    }

    let cache_bytes = dir_size(&config.dirs.cache);
    if cache_bytes > 0 {
        println!(
            "  Local cache: {:.1} MiB ({})",
            cache_bytes as f64 / (1024.0 * 1024.0),
            config.dirs.cache.display()
        );
    }

    Ok(())
}

fn dir_size(path: &std::path::Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}
