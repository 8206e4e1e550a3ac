//! HuggingFace dataset client
//!
//! Fetches instances through the datasets-server rows API when the dataset
//! is served there, falling back to listing the repository tree and
//! downloading raw `.json`/`.jsonl` files. Downloads are cached on disk and
//! written atomically.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use super::types::SweInstance;

const HF_API_BASE: &str = "https://huggingface.co/api/datasets";
const HF_RESOLVE_BASE: &str = "https://huggingface.co/datasets";
const ROWS_API_BASE: &str = "https://datasets-server.huggingface.co/rows";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows API serves at most this many rows per request
const ROWS_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    entry_type: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowWrapper>,
}

#[derive(Debug, Deserialize)]
struct RowWrapper {
    row: SweInstance,
}

pub struct HuggingFaceDataset {
    repo_id: String,
    split: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
    api_base: String,
    resolve_base: String,
    rows_base: String,
}

impl HuggingFaceDataset {
    pub fn new(repo_id: &str, split: &str, cache_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            repo_id: repo_id.to_string(),
            split: split.to_string(),
            cache_dir,
            client,
            api_base: HF_API_BASE.to_string(),
            resolve_base: HF_RESOLVE_BASE.to_string(),
            rows_base: ROWS_API_BASE.to_string(),
        }
    }

    /// Point the client at alternate endpoints (tests)
    pub fn with_endpoints(mut self, api: &str, resolve: &str, rows: &str) -> Self {
        self.api_base = api.to_string();
        self.resolve_base = resolve.to_string();
        self.rows_base = rows.to_string();
        self
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Fetch up to `limit` instances (all when `None`)
    pub async fn fetch(&self, limit: Option<usize>) -> anyhow::Result<Vec<SweInstance>> {
        match self.fetch_rows(limit).await {
            Ok(rows) if !rows.is_empty() => return Ok(rows),
            Ok(_) => {
                tracing::debug!("rows API returned no rows, trying file download");
            }
            Err(e) => {
                tracing::debug!(error = %e, "rows API unavailable, trying file download");
            }
        }

        let mut entries = self.fetch_files().await?;
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn fetch_rows(&self, limit: Option<usize>) -> anyhow::Result<Vec<SweInstance>> {
        let mut instances = Vec::new();
        let mut offset = 0usize;

        loop {
            let length = match limit {
                Some(limit) => (limit - instances.len()).min(ROWS_PAGE_SIZE),
                None => ROWS_PAGE_SIZE,
            };
            if length == 0 {
                break;
            }

            let url = format!(
                "{}?dataset={}&config=default&split={}&offset={}&length={}",
                self.rows_base, self.repo_id, self.split, offset, length
            );

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .context("failed to fetch rows from datasets server")?;

            if !response.status().is_success() {
                return Err(anyhow!("datasets server returned {}", response.status()));
            }

            let body: RowsResponse = response
                .json()
                .await
                .context("failed to parse rows response")?;

            let page_len = body.rows.len();
            instances.extend(body.rows.into_iter().map(|w| w.row));

            if page_len < length {
                break;
            }
            offset += page_len;
        }

        Ok(instances)
    }

    async fn fetch_files(&self) -> anyhow::Result<Vec<SweInstance>> {
        let files = self.list_files().await?;
        let data_files: Vec<&str> = files
            .iter()
            .map(|f| f.as_str())
            .filter(|f| f.ends_with(".json") || f.ends_with(".jsonl"))
            .collect();

        if data_files.is_empty() {
            return Err(anyhow!(
                "no .json/.jsonl files found in dataset '{}'",
                self.repo_id
            ));
        }

        let mut all = Vec::new();
        for file in data_files {
            let path = self.download_file(file).await?;
            let mut parsed = load_json_entries(&path).await?;
            all.append(&mut parsed);
        }

        Ok(all)
    }

    pub async fn list_files(&self) -> anyhow::Result<Vec<String>> {
        let mut files = Vec::new();
        let mut dirs_to_visit = vec![String::new()];

        while let Some(dir) = dirs_to_visit.pop() {
            let url = if dir.is_empty() {
                format!("{}/{}/tree/main", self.api_base, self.repo_id)
            } else {
                format!("{}/{}/tree/main/{}", self.api_base, self.repo_id, dir)
            };

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("failed to list dataset files at '{dir}'"))?;

            if !response.status().is_success() {
                return Err(anyhow!(
                    "HuggingFace API returned {} for path '{}'",
                    response.status(),
                    dir
                ));
            }

            let entries: Vec<TreeEntry> = response
                .json()
                .await
                .with_context(|| format!("failed to parse tree response for '{dir}'"))?;

            for entry in entries {
                match entry.entry_type.as_str() {
                    "file" => files.push(entry.path),
                    "directory" => dirs_to_visit.push(entry.path),
                    _ => {}
                }
            }
        }

        files.sort();
        Ok(files)
    }

    pub async fn download_file(&self, filename: &str) -> anyhow::Result<PathBuf> {
        let dest = self
            .cache_dir
            .join(self.repo_id.replace('/', "__"))
            .join(filename);

        if dest.exists() {
            tracing::debug!(path = %dest.display(), "using cached file");
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create cache directory '{}'", parent.display())
            })?;
        }

        let url = format!(
            "{}/{}/resolve/main/{}",
            self.resolve_base, self.repo_id, filename
        );

        tracing::debug!(url = %url, dest = %dest.display(), "downloading file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to download '{filename}'"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HuggingFace returned {} for file '{}'",
                response.status(),
                filename
            ));
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body for '{filename}'"))?;

        let tmp_path = dest.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("failed to write '{}'", tmp_path.display()))?;

        tokio::fs::rename(&tmp_path, &dest)
            .await
            .with_context(|| format!("failed to rename temp file to '{}'", dest.display()))?;

        tracing::debug!(
            path = %dest.display(),
            size_bytes = bytes.len(),
            "file downloaded"
        );

        Ok(dest)
    }
}

async fn load_json_entries(path: &Path) -> anyhow::Result<Vec<SweInstance>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    if let Ok(entries) = serde_json::from_str::<Vec<SweInstance>>(&content) {
        return Ok(entries);
    }

    let mut entries = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<SweInstance>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping malformed line"
                );
            }
        }
    }

    Ok(entries)
}
