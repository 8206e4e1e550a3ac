//! LongCodeBench dataset support
//!
//! LongCodeBench datasets are SWE-bench variants tuned for long-context
//! evaluation: each instance carries a set of context files for a given
//! context length (k). Detection is by dataset name; the context columns
//! vary across published datasets, so several field names are probed.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde_json::Value;

use super::types::SweInstance;

/// Field names under which published datasets store context files
const CONTEXT_FIELDS: [&str; 5] = [
    "context_files",
    "context_file_paths",
    "retrieved_files",
    "relevant_files",
    "k_files",
];

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"longcodebench",
        r"long-code-bench",
        r"swebench.*tuned",
        r"swebench.*k\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid pattern"))
    .collect()
});

static K_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"k-?(\d+)", r"context-?(\d+)", r"(\d+)k"]
        .iter()
        .map(|p| Regex::new(p).expect("invalid pattern"))
        .collect()
});

/// Does this dataset name look like a LongCodeBench dataset?
pub fn is_longcodebench_dataset(dataset_name: &str) -> bool {
    let lower = dataset_name.to_lowercase();
    NAME_PATTERNS.iter().any(|p| p.is_match(&lower))
}

/// Extract the context length (k) encoded in a dataset name, if any
/// (`k20`, `k-20`, `context-20`, `32k`).
pub fn extract_context_length(dataset_name: &str) -> Option<u32> {
    let lower = dataset_name.to_lowercase();
    for pattern in K_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&lower) {
            if let Ok(k) = caps[1].parse() {
                return Some(k);
            }
        }
    }
    None
}

/// Does the instance carry context file information?
pub fn has_context_files(instance: &SweInstance) -> bool {
    CONTEXT_FIELDS.iter().any(|field| {
        instance
            .extra
            .get(*field)
            .is_some_and(|v| !value_is_empty(v))
    })
}

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Extract context file paths (relative to the repo root) from an instance.
///
/// Values may be JSON arrays, JSON-encoded strings, or newline-separated
/// strings depending on how the dataset was exported.
pub fn context_files(instance: &SweInstance) -> Vec<String> {
    for field in CONTEXT_FIELDS {
        let Some(value) = instance.extra.get(field) else {
            continue;
        };

        match value {
            Value::Array(items) => {
                return items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect();
            }
            Value::String(text) => {
                if let Ok(list) = serde_json::from_str::<Vec<String>>(text) {
                    return list;
                }
                return text
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    Vec::new()
}

/// Filter instances to one context length.
///
/// Uses a `k` or `context_length` column when the dataset has one. When it
/// does not, but the dataset *name* encodes a different k than requested,
/// that mismatch is an error rather than a silent empty result.
pub fn filter_by_context_length(
    instances: Vec<SweInstance>,
    dataset_name: &str,
    requested_k: u32,
) -> Result<Vec<SweInstance>> {
    let has_k_field = instances
        .iter()
        .any(|i| i.extra.contains_key("k") || i.extra.contains_key("context_length"));

    if has_k_field {
        return Ok(instances
            .into_iter()
            .filter(|i| instance_k(i) == Some(requested_k))
            .collect());
    }

    if let Some(dataset_k) = extract_context_length(dataset_name) {
        if dataset_k != requested_k {
            anyhow::bail!(
                "dataset '{}' has context length {}, but {} was requested",
                dataset_name,
                dataset_k,
                requested_k
            );
        }
    }

    Ok(instances)
}

fn instance_k(instance: &SweInstance) -> Option<u32> {
    for field in ["k", "context_length"] {
        match instance.extra.get(field) {
            Some(Value::Number(n)) => return n.as_u64().map(|v| v as u32),
            // some exports store k as "32K"
            Some(Value::String(s)) => return extract_context_length(s),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_with_extra(extra: serde_json::Value) -> SweInstance {
        let mut base = serde_json::json!({
            "instance_id": "x__y-1",
            "repo": "x/y",
            "base_commit": "deadbeef",
            "problem_statement": "..."
        });
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_name_detection() {
        assert!(is_longcodebench_dataset("Steefano/LongCodeBench"));
        assert!(is_longcodebench_dataset("org/long-code-bench-v2"));
        assert!(is_longcodebench_dataset("org/swebench-lite-tuned"));
        assert!(is_longcodebench_dataset("org/swebench-k32"));
        assert!(!is_longcodebench_dataset("princeton-nlp/SWE-bench_Lite"));
    }

    #[test]
    fn test_extract_context_length() {
        assert_eq!(extract_context_length("org/swebench-k20"), Some(20));
        assert_eq!(extract_context_length("org/swebench-k-20"), Some(20));
        assert_eq!(extract_context_length("org/bench-context-64"), Some(64));
        assert_eq!(extract_context_length("org/lcb-32k"), Some(32));
        assert_eq!(extract_context_length("org/plain-bench"), None);
    }

    #[test]
    fn test_context_files_from_array() {
        let instance =
            instance_with_extra(serde_json::json!({"context_files": ["src/a.py", "src/b.py"]}));
        assert!(has_context_files(&instance));
        assert_eq!(context_files(&instance), vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_context_files_from_json_string() {
        let instance = instance_with_extra(
            serde_json::json!({"retrieved_files": "[\"src/a.py\", \"src/b.py\"]"}),
        );
        assert_eq!(context_files(&instance), vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_context_files_from_newline_string() {
        let instance =
            instance_with_extra(serde_json::json!({"k_files": "src/a.py\nsrc/b.py\n"}));
        assert_eq!(context_files(&instance), vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_no_context_files() {
        let instance = instance_with_extra(serde_json::json!({}));
        assert!(!has_context_files(&instance));
        assert!(context_files(&instance).is_empty());
    }

    #[test]
    fn test_filter_by_k_field() {
        let instances = vec![
            instance_with_extra(serde_json::json!({"k": 32})),
            instance_with_extra(serde_json::json!({"k": 64})),
        ];
        let filtered = filter_by_context_length(instances, "org/lcb", 32).unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_filter_by_string_k() {
        let instances = vec![instance_with_extra(
            serde_json::json!({"context_length": "32K"}),
        )];
        let filtered = filter_by_context_length(instances, "org/lcb", 32).unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_filter_name_mismatch_is_error() {
        let instances = vec![instance_with_extra(serde_json::json!({}))];
        let result = filter_by_context_length(instances, "org/lcb-k64", 32);
        assert!(result.is_err());
    }
}
