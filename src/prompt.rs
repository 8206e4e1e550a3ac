//! Prompt assembly for the assistant CLIs

use std::path::Path;

use crate::dataset::SweInstance;

/// Instruction header sent with every instance
const INSTRUCTIONS: &str = r#"You are working inside a checked-out repository that contains a bug.

Below is the issue report. Fix the underlying problem by editing the
repository files in place.

RULES:
1. Edit files directly in the working directory - do not create patch files
2. Do not commit, stage, or otherwise run git write commands
3. Do not modify tests unless the issue explicitly requires it
4. Keep the change minimal and focused on the reported problem"#;

/// Marker inserted when a context file is cut off at the byte cap
const TRUNCATION_MARKER: &str = "\n... [truncated]\n";

/// Build the full prompt for one instance.
///
/// `context` holds (path, contents) pairs for LongCodeBench instances and
/// is empty otherwise.
pub fn build_prompt(instance: &SweInstance, context: &[(String, String)]) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n## Issue\n\n");
    prompt.push_str(instance.problem_statement.trim());
    prompt.push('\n');

    if !instance.hints_text.trim().is_empty() {
        prompt.push_str("\n## Hints\n\n");
        prompt.push_str(instance.hints_text.trim());
        prompt.push('\n');
    }

    if !context.is_empty() {
        prompt.push_str("\n## Relevant files\n");
        prompt.push_str("\nThe following files are likely involved:\n");
        for (path, contents) in context {
            prompt.push_str(&format!("\n### {}\n```\n{}\n```\n", path, contents));
        }
    }

    prompt
}

/// Read context files from the repo root, skipping missing ones, up to a
/// total byte cap. The file that crosses the cap is truncated with a marker
/// and nothing further is read.
pub fn gather_context_files(
    repo_root: &Path,
    paths: &[String],
    max_bytes: usize,
) -> Vec<(String, String)> {
    let mut gathered = Vec::new();
    let mut budget = max_bytes;

    for path in paths {
        if budget == 0 {
            break;
        }

        let full = repo_root.join(path);
        let Ok(contents) = std::fs::read_to_string(&full) else {
            tracing::debug!(path = %full.display(), "skipping unreadable context file");
            continue;
        };

        if contents.len() <= budget {
            budget -= contents.len();
            gathered.push((path.clone(), contents));
        } else {
            let mut cut = budget;
            // don't split a UTF-8 sequence
            while cut > 0 && !contents.is_char_boundary(cut) {
                cut -= 1;
            }
            let mut truncated = contents[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            gathered.push((path.clone(), truncated));
            budget = 0;
        }
    }

    gathered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(problem: &str, hints: &str) -> SweInstance {
        serde_json::from_value(serde_json::json!({
            "instance_id": "x__y-1",
            "repo": "x/y",
            "base_commit": "deadbeef",
            "problem_statement": problem,
            "hints_text": hints
        }))
        .unwrap()
    }

    #[test]
    fn test_prompt_contains_issue_and_rules() {
        let prompt = build_prompt(&instance("widget is broken", ""), &[]);
        assert!(prompt.contains("widget is broken"));
        assert!(prompt.contains("Do not commit"));
        assert!(!prompt.contains("## Hints"));
    }

    #[test]
    fn test_prompt_includes_hints_and_context() {
        let context = vec![("src/a.py".to_string(), "print('a')".to_string())];
        let prompt = build_prompt(&instance("bug", "look at a.py"), &context);
        assert!(prompt.contains("## Hints"));
        assert!(prompt.contains("look at a.py"));
        assert!(prompt.contains("### src/a.py"));
        assert!(prompt.contains("print('a')"));
    }

    #[test]
    fn test_gather_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "aaaa").unwrap();

        let paths = vec!["a.py".to_string(), "missing.py".to_string()];
        let gathered = gather_context_files(dir.path(), &paths, 1024);
        assert_eq!(gathered.len(), 1);
        assert_eq!(gathered[0].0, "a.py");
    }

    #[test]
    fn test_gather_respects_byte_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "a".repeat(100)).unwrap();
        std::fs::write(dir.path().join("b.py"), "b".repeat(100)).unwrap();

        let paths = vec!["a.py".to_string(), "b.py".to_string()];
        let gathered = gather_context_files(dir.path(), &paths, 150);
        assert_eq!(gathered.len(), 2);
        assert_eq!(gathered[0].1.len(), 100);
        assert!(gathered[1].1.starts_with(&"b".repeat(50)));
        assert!(gathered[1].1.contains("[truncated]"));
    }
}
