//! `swe-bench run` - the full benchmark pipeline

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use swe_harness::results::print_report;
use swe_harness::{HarnessConfig, RunOptions, Runner};

pub async fn execute(config: HarnessConfig, options: RunOptions) -> Result<()> {
    let dataset = options
        .dataset
        .clone()
        .unwrap_or_else(|| config.run.dataset.clone());
    let backend = options
        .backend
        .clone()
        .unwrap_or_else(|| config.run.backend.clone());

    println!("\n  🏁 Starting benchmark run\n");
    println!("  Dataset:  {}", style(&dataset).cyan());
    println!("  Backend:  {}", style(&backend).cyan());
    if let Some(model) = options.model.as_deref().or(config.run.model.as_deref()) {
        println!("  Model:    {}", style(model).cyan());
    }
    if let Some(limit) = options.limit {
        println!("  Limit:    {}", limit);
    }
    if let Some(k) = options.context_length.or(config.run.context_length) {
        println!("  Context:  k={}", k);
    }
    if options.no_eval {
        println!("  Eval:     {}", style("skipped (--no-eval)").yellow());
    }
    println!();

    // length is only known once the dataset is loaded, so the bar starts
    // hidden and materializes on the first callback
    let bar = ProgressBar::hidden();

    let runner = Runner::new(config, options);
    let results = runner
        .run(|progress| {
            if bar.length().unwrap_or(0) == 0 {
                bar.set_length(progress.total as u64);
                bar.set_style(
                    ProgressStyle::with_template(
                        "  [{pos}/{len}] {bar:30.cyan/blue} {msg}",
                    )
                    .unwrap()
                    .progress_chars("=> "),
                );
                bar.set_draw_target(ProgressDrawTarget::stderr());
            }
            bar.set_position(progress.index as u64);
            bar.set_message(progress.instance_id.to_string());
            bar.println(format!(
                "  [{}/{}] Running: {}",
                progress.index + 1,
                progress.total,
                progress.instance_id
            ));
        })
        .await?;
    bar.finish_and_clear();

    print_report(&results);

    let s = &results.summary;
    if s.evaluated > 0 {
        println!(
            "\n  {} {} of {} evaluated instances resolved ({:.1}%)\n",
            style("✓").green(),
            s.resolved,
            s.evaluated,
            s.resolve_rate * 100.0
        );
    } else {
        println!(
            "\n  {} {} of {} instances produced a patch (evaluation skipped)\n",
            style("✓").green(),
            s.patched,
            s.total
        );
    }

    Ok(())
}
