//! Run results, export, and reporting

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Result for a single instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResult {
    pub instance_id: String,
    /// Backend that produced the patch
    #[serde(default)]
    pub backend: String,
    /// Model override, when one was set
    #[serde(default)]
    pub model: Option<String>,
    /// A non-empty patch was produced
    pub patched: bool,
    /// Evaluation verdict; None when evaluation was skipped (`--no-eval`)
    pub resolved: Option<bool>,
    pub duration_sec: f64,
    pub error: Option<String>,
}

/// Aggregated results for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    /// Run name
    pub name: String,
    /// Dataset used
    pub dataset: String,
    /// Backend and model
    pub backend: String,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub instances: Vec<InstanceResult>,
    pub summary: RunSummary,
}

/// Summary statistics for a run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    pub total: u32,
    /// Instances that produced a non-empty patch
    pub patched: u32,
    /// Instances that were evaluated
    pub evaluated: u32,
    /// Instances whose tests passed after the patch
    pub resolved: u32,
    pub errors: u32,
    pub patch_rate: f64,
    pub resolve_rate: f64,
    pub total_duration_sec: f64,
    pub average_duration_sec: f64,
}

impl RunResults {
    pub fn new(name: &str, dataset: &str, backend: &str, model: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            dataset: dataset.to_string(),
            backend: backend.to_string(),
            model: model.map(String::from),
            started_at: Utc::now(),
            ended_at: None,
            instances: vec![],
            summary: RunSummary::default(),
        }
    }

    pub fn add(&mut self, result: InstanceResult) {
        self.instances.push(result);
        self.update_summary();
    }

    pub fn complete(&mut self) {
        self.ended_at = Some(Utc::now());
        self.update_summary();
    }

    fn update_summary(&mut self) {
        let total = self.instances.len() as u32;
        let patched = self.instances.iter().filter(|i| i.patched).count() as u32;
        let evaluated = self.instances.iter().filter(|i| i.resolved.is_some()).count() as u32;
        let resolved = self
            .instances
            .iter()
            .filter(|i| i.resolved == Some(true))
            .count() as u32;
        let errors = self.instances.iter().filter(|i| i.error.is_some()).count() as u32;
        let total_duration: f64 = self.instances.iter().map(|i| i.duration_sec).sum();

        self.summary = RunSummary {
            total,
            patched,
            evaluated,
            resolved,
            errors,
            patch_rate: if total > 0 {
                patched as f64 / total as f64
            } else {
                0.0
            },
            resolve_rate: if evaluated > 0 {
                resolved as f64 / evaluated as f64
            } else {
                0.0
            },
            total_duration_sec: total_duration,
            average_duration_sec: if total > 0 {
                total_duration / total as f64
            } else {
                0.0
            },
        };
    }
}

/// Export run results into the run directory
pub struct ResultExporter {
    output_dir: PathBuf,
}

impl ResultExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn export_json(&self, results: &RunResults) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Exported JSON results to {:?}", path);
        Ok(path)
    }

    pub fn export_csv(&self, results: &RunResults) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("results.csv");
        let mut csv = String::new();

        csv.push_str("instance_id,patched,resolved,duration_sec,error\n");
        for inst in &results.instances {
            let resolved = match inst.resolved {
                Some(true) => "true",
                Some(false) => "false",
                None => "skipped",
            };
            csv.push_str(&format!(
                "{},{},{},{:.2},{}\n",
                inst.instance_id,
                inst.patched,
                resolved,
                inst.duration_sec,
                inst.error.as_deref().unwrap_or("")
            ));
        }

        std::fs::write(&path, csv)?;

        info!("Exported CSV results to {:?}", path);
        Ok(path)
    }

    pub fn export_markdown(&self, results: &RunResults) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("results.md");
        let mut md = String::new();

        md.push_str(&format!("# Run Results: {}\n\n", results.name));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Dataset**: {}\n", results.dataset));
        md.push_str(&format!("- **Backend**: {}\n", results.backend));
        if let Some(model) = &results.model {
            md.push_str(&format!("- **Model**: {}\n", model));
        }
        md.push_str(&format!("- **Started**: {}\n", results.started_at));
        if let Some(ended) = results.ended_at {
            md.push_str(&format!("- **Ended**: {}\n", ended));
        }
        md.push('\n');

        let s = &results.summary;
        md.push_str("## Statistics\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| Instances | {} |\n", s.total));
        md.push_str(&format!(
            "| Patched | {} ({:.1}%) |\n",
            s.patched,
            s.patch_rate * 100.0
        ));
        md.push_str(&format!(
            "| Resolved | {} / {} evaluated ({:.1}%) |\n",
            s.resolved,
            s.evaluated,
            s.resolve_rate * 100.0
        ));
        md.push_str(&format!("| Errors | {} |\n", s.errors));
        md.push_str(&format!(
            "| Average Duration | {:.1}s |\n",
            s.average_duration_sec
        ));
        md.push('\n');

        md.push_str("## Instances\n\n");
        md.push_str("| Instance | Patched | Resolved | Duration |\n");
        md.push_str("|----------|---------|----------|----------|\n");

        for inst in &results.instances {
            let patched = if inst.patched { "✓" } else { "✗" };
            let resolved = match inst.resolved {
                Some(true) => "✓",
                Some(false) => "✗",
                None => "-",
            };
            md.push_str(&format!(
                "| {} | {} | {} | {:.1}s |\n",
                inst.instance_id, patched, resolved, inst.duration_sec
            ));
        }

        std::fs::write(&path, md)?;

        info!("Exported Markdown results to {:?}", path);
        Ok(path)
    }

    pub fn export_all(&self, results: &RunResults) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.export_json(results)?,
            self.export_csv(results)?,
            self.export_markdown(results)?,
        ])
    }
}

/// Load results.json from a run directory
pub fn load_results(run_dir: &Path) -> Result<RunResults> {
    let path = run_dir.join("results.json");
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse '{}'", path.display()))
}

/// Find the most recently modified run directory containing a results.json
pub fn find_latest_run(results_dir: &Path) -> Result<Option<PathBuf>> {
    if !results_dir.exists() {
        return Ok(None);
    }

    let mut runs: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in std::fs::read_dir(results_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join("results.json").exists() {
            let modified = entry.metadata()?.modified()?;
            runs.push((path, modified));
        }
    }

    runs.sort_by_key(|(_, modified)| *modified);
    Ok(runs.pop().map(|(path, _)| path))
}

/// Print a run report to the console
pub fn print_report(results: &RunResults) {
    println!("\n{}", "=".repeat(60));
    println!("RUN RESULTS: {}", results.name);
    println!("{}", "=".repeat(60));

    println!("\nDataset: {}", results.dataset);
    println!("Backend: {}", results.backend);
    if let Some(model) = &results.model {
        println!("Model:   {}", model);
    }

    let s = &results.summary;
    println!("\n--- Summary ---");
    println!("Instances:        {}", s.total);
    println!(
        "Patched:          {} ({:.1}%)",
        s.patched,
        s.patch_rate * 100.0
    );
    println!(
        "Resolved:         {} / {} evaluated ({:.1}%)",
        s.resolved,
        s.evaluated,
        s.resolve_rate * 100.0
    );
    println!("Errors:           {}", s.errors);
    println!("Total Duration:   {:.1}s", s.total_duration_sec);
    println!("Average Duration: {:.1}s", s.average_duration_sec);

    println!("\n--- Instances ---");
    println!(
        "{:<40} {:>8} {:>9} {:>10}",
        "Instance", "Patched", "Resolved", "Duration"
    );
    println!("{}", "-".repeat(70));

    for inst in &results.instances {
        let patched = if inst.patched { "✓" } else { "✗" };
        let resolved = match inst.resolved {
            Some(true) => "✓",
            Some(false) => "✗",
            None => "-",
        };
        println!(
            "{:<40} {:>8} {:>9} {:>9.1}s",
            truncate(&inst.instance_id, 40),
            patched,
            resolved,
            inst.duration_sec
        );
    }

    println!("{}", "=".repeat(60));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    // back off to a char boundary so multi-byte ids don't panic
    let mut cut = max_len - 3;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> RunResults {
        let mut results = RunResults::new("run-1", "ds", "claude", Some("opus"));
        results.add(InstanceResult {
            instance_id: "a".to_string(),
            backend: "claude".to_string(),
            model: Some("opus".to_string()),
            patched: true,
            resolved: Some(true),
            duration_sec: 10.0,
            error: None,
        });
        results.add(InstanceResult {
            instance_id: "b".to_string(),
            backend: "claude".to_string(),
            model: Some("opus".to_string()),
            patched: true,
            resolved: Some(false),
            duration_sec: 20.0,
            error: None,
        });
        results.add(InstanceResult {
            instance_id: "c".to_string(),
            backend: "claude".to_string(),
            model: Some("opus".to_string()),
            patched: false,
            resolved: None,
            duration_sec: 6.0,
            error: Some("backend error".to_string()),
        });
        results.complete();
        results
    }

    #[test]
    fn test_summary_math() {
        let results = sample_results();
        let s = &results.summary;
        assert_eq!(s.total, 3);
        assert_eq!(s.patched, 2);
        assert_eq!(s.evaluated, 2);
        assert_eq!(s.resolved, 1);
        assert_eq!(s.errors, 1);
        assert!((s.resolve_rate - 0.5).abs() < f64::EPSILON);
        assert!((s.total_duration_sec - 36.0).abs() < f64::EPSILON);
        assert!(results.ended_at.is_some());
    }

    #[test]
    fn test_export_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample_results();

        let exporter = ResultExporter::new(dir.path());
        let paths = exporter.export_all(&results).unwrap();
        assert_eq!(paths.len(), 3);

        let loaded = load_results(dir.path()).unwrap();
        assert_eq!(loaded.name, "run-1");
        assert_eq!(loaded.instances.len(), 3);
        assert_eq!(loaded.instances[0].backend, "claude");
        assert_eq!(loaded.instances[0].model.as_deref(), Some("opus"));

        let csv = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
        assert!(csv.contains("a,true,true"));
        assert!(csv.contains("c,false,skipped"));
    }

    #[test]
    fn test_find_latest_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_latest_run(dir.path()).unwrap().is_none());

        let old = dir.path().join("run-old");
        let new = dir.path().join("run-new");
        for run in [&old, &new] {
            std::fs::create_dir_all(run).unwrap();
            ResultExporter::new(run).export_json(&sample_results()).unwrap();
        }
        // nudge mtime ordering
        filetime_touch(&new);

        let latest = find_latest_run(dir.path()).unwrap().unwrap();
        assert_eq!(latest, new);
    }

    #[test]
    fn test_truncate_multibyte() {
        let id = "répo__prøjet-11099-très-long-identifiant-d-instance";
        let cut = truncate(id, 40);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 40);
        assert_eq!(truncate("short", 40), "short");
    }

    fn filetime_touch(path: &Path) {
        // directory mtime only moves when an entry is added
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(path.join("marker"), "x").unwrap();
    }
}
