//! Dataset client integration tests against a mock HuggingFace server

use httpmock::prelude::*;
use serde_json::json;
use swe_harness::dataset::HuggingFaceDataset;

fn row(id: &str) -> serde_json::Value {
    json!({
        "row": {
            "instance_id": id,
            "repo": "django/django",
            "base_commit": "abc123",
            "problem_statement": "UsernameValidator allows trailing newline",
            "FAIL_TO_PASS": "[\"tests/test_validators.py::test_one\"]"
        }
    })
}

fn dataset_for(server: &MockServer, cache: &std::path::Path) -> HuggingFaceDataset {
    HuggingFaceDataset::new("org/swe-ds", "test", cache.to_path_buf()).with_endpoints(
        &server.url("/api/datasets"),
        &server.url("/datasets"),
        &server.url("/rows"),
    )
}

#[tokio::test]
async fn fetches_instances_through_rows_api() {
    let server = MockServer::start_async().await;
    let cache = tempfile::tempdir().unwrap();

    let rows = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rows")
                .query_param("dataset", "org/swe-ds")
                .query_param("split", "test")
                .query_param("offset", "0")
                .query_param("length", "2");
            then.status(200)
                .json_body(json!({"rows": [row("a__b-1"), row("a__b-2")]}));
        })
        .await;

    let instances = dataset_for(&server, cache.path())
        .fetch(Some(2))
        .await
        .unwrap();

    rows.assert_async().await;
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].instance_id, "a__b-1");
    assert_eq!(
        instances[0].fail_to_pass,
        vec!["tests/test_validators.py::test_one"]
    );
}

#[tokio::test]
async fn paginates_rows_api() {
    let server = MockServer::start_async().await;
    let cache = tempfile::tempdir().unwrap();

    // a full first page means a second request is made
    let full_page: Vec<_> = (0..100).map(|i| row(&format!("a__b-{}", i))).collect();
    let page_one = server
        .mock_async(|when, then| {
            when.method(GET).path("/rows").query_param("offset", "0");
            then.status(200).json_body(json!({ "rows": full_page }));
        })
        .await;
    let page_two = server
        .mock_async(|when, then| {
            when.method(GET).path("/rows").query_param("offset", "100");
            then.status(200)
                .json_body(json!({"rows": [row("a__b-100")]}));
        })
        .await;

    let instances = dataset_for(&server, cache.path()).fetch(None).await.unwrap();

    page_one.assert_async().await;
    page_two.assert_async().await;
    assert_eq!(instances.len(), 101);
}

#[tokio::test]
async fn falls_back_to_file_download() {
    let server = MockServer::start_async().await;
    let cache = tempfile::tempdir().unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/rows");
            then.status(404);
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/datasets/org/swe-ds/tree/main");
            then.status(200).json_body(json!([
                {"type": "file", "path": "README.md"},
                {"type": "directory", "path": "data"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/datasets/org/swe-ds/tree/main/data");
            then.status(200)
                .json_body(json!([{"type": "file", "path": "data/test.jsonl"}]));
        })
        .await;

    // one good record, one malformed line that should be skipped
    let jsonl = concat!(
        r#"{"instance_id":"a__b-1","repo":"a/b","base_commit":"c1","problem_statement":"p"}"#,
        "\n",
        "{not json}\n",
    );
    let download = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/datasets/org/swe-ds/resolve/main/data/test.jsonl");
            then.status(200).body(jsonl);
        })
        .await;

    let dataset = dataset_for(&server, cache.path());
    let instances = dataset.fetch(None).await.unwrap();

    download.assert_async().await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].instance_id, "a__b-1");

    // second fetch is served from the cache
    let again = dataset.fetch(None).await.unwrap();
    assert_eq!(again.len(), 1);
    download.assert_hits_async(1).await;
}

#[tokio::test]
async fn rows_api_respects_limit() {
    let server = MockServer::start_async().await;
    let cache = tempfile::tempdir().unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/rows").query_param("length", "1");
            then.status(200).json_body(json!({"rows": [row("a__b-1")]}));
        })
        .await;

    let instances = dataset_for(&server, cache.path())
        .fetch(Some(1))
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
}
