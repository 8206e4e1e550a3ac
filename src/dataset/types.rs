//! Dataset record types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One SWE-bench task instance.
///
/// Published datasets are inconsistent about field casing
/// (`FAIL_TO_PASS` vs `fail_to_pass`) and encode test lists either as JSON
/// arrays or as JSON-encoded strings; both forms are accepted. Fields the
/// harness does not model (LongCodeBench context columns among them) land
/// in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweInstance {
    pub instance_id: String,
    /// Repository in `owner/name` form
    pub repo: String,
    pub base_commit: String,
    pub problem_statement: String,
    /// Gold patch (not shown to the assistant)
    #[serde(default)]
    pub patch: String,
    #[serde(default)]
    pub test_patch: String,
    #[serde(default)]
    pub hints_text: String,
    #[serde(default)]
    pub version: String,
    #[serde(
        default,
        alias = "FAIL_TO_PASS",
        deserialize_with = "de_test_list"
    )]
    pub fail_to_pass: Vec<String>,
    #[serde(
        default,
        alias = "PASS_TO_PASS",
        deserialize_with = "de_test_list"
    )]
    pub pass_to_pass: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn de_test_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(Raw::List(list)) => Ok(list),
        Some(Raw::Text(text)) => {
            // JSON-encoded list first, newline-separated as a last resort
            if let Ok(list) = serde_json::from_str::<Vec<String>>(&text) {
                Ok(list)
            } else {
                Ok(text
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect())
            }
        }
    }
}

/// Prediction record in the JSONL format the SWE-bench ecosystem expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub instance_id: String,
    pub model_name_or_path: String,
    pub model_patch: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_with_list_tests() {
        let instance: SweInstance = serde_json::from_str(
            r#"{
                "instance_id": "django__django-11099",
                "repo": "django/django",
                "base_commit": "abc123",
                "problem_statement": "UsernameValidator allows trailing newline",
                "fail_to_pass": ["test_a", "test_b"],
                "pass_to_pass": []
            }"#,
        )
        .unwrap();

        assert_eq!(instance.repo, "django/django");
        assert_eq!(instance.fail_to_pass, vec!["test_a", "test_b"]);
        assert!(instance.pass_to_pass.is_empty());
        assert!(instance.patch.is_empty());
    }

    #[test]
    fn test_instance_with_json_encoded_tests() {
        // published SWE-bench splits use uppercase keys with stringified lists
        let instance: SweInstance = serde_json::from_str(
            r#"{
                "instance_id": "x__y-1",
                "repo": "x/y",
                "base_commit": "deadbeef",
                "problem_statement": "...",
                "FAIL_TO_PASS": "[\"tests/test_x.py::test_one\"]",
                "PASS_TO_PASS": "[\"tests/test_x.py::test_two\", \"tests/test_x.py::test_three\"]"
            }"#,
        )
        .unwrap();

        assert_eq!(instance.fail_to_pass, vec!["tests/test_x.py::test_one"]);
        assert_eq!(instance.pass_to_pass.len(), 2);
    }

    #[test]
    fn test_extra_fields_preserved() {
        let instance: SweInstance = serde_json::from_str(
            r#"{
                "instance_id": "x__y-1",
                "repo": "x/y",
                "base_commit": "deadbeef",
                "problem_statement": "...",
                "context_files": ["src/a.py", "src/b.py"],
                "k": 32
            }"#,
        )
        .unwrap();

        assert_eq!(instance.extra["k"], 32);
        assert!(instance.extra["context_files"].is_array());
    }

    #[test]
    fn test_prediction_roundtrip() {
        let pred = Prediction {
            instance_id: "x__y-1".to_string(),
            model_name_or_path: "claude".to_string(),
            model_patch: "diff --git a/a b/a\n".to_string(),
        };
        let line = serde_json::to_string(&pred).unwrap();
        let back: Prediction = serde_json::from_str(&line).unwrap();
        assert_eq!(back.instance_id, pred.instance_id);
        assert_eq!(back.model_patch, pred.model_patch);
    }
}
