//! `swe-bench doctor` - environment diagnostics

use anyhow::Result;
use colored::Colorize;
use swe_harness::doctor::{run_checks, CheckStatus};
use swe_harness::HarnessConfig;

pub async fn execute(config: &HarnessConfig) -> Result<()> {
    println!("\n  🔍 SWE-bench Environment Diagnostics\n");

    let report = run_checks(config).await;

    for check in &report.checks {
        let symbol = match check.status {
            CheckStatus::Pass => check.status.symbol().green(),
            CheckStatus::Warn => check.status.symbol().yellow(),
            CheckStatus::Fail => check.status.symbol().red(),
        };
        println!("  {} {:<24} {}", symbol, check.name, check.detail);
    }

    println!("\n  {}", "-".repeat(60));
    if report.ok() {
        println!("  {} Your environment looks good.\n", "✓".green());
        Ok(())
    } else {
        println!(
            "  {} Some checks failed. Fix the issues above and re-run.\n",
            "✗".red()
        );
        std::process::exit(1);
    }
}
