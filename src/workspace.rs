//! Per-instance git workspaces
//!
//! Each repository gets one shared clone under `workspaces/repos/`; each
//! instance gets a detached worktree at its base commit. The model patch is
//! the diff of the worktree after the assistant has run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Timeout for a single git invocation (clones of large repos are slow)
const GIT_TIMEOUT: Duration = Duration::from_secs(1800);

pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn clone_dir(&self, repo: &str) -> PathBuf {
        self.root.join("repos").join(sanitize_repo(repo))
    }

    fn instance_dir(&self, instance_id: &str) -> PathBuf {
        self.root.join(instance_id)
    }

    /// Prepare a clean checkout of `repo` at `base_commit` for one instance.
    ///
    /// Returns the worktree path. A leftover worktree from a previous run is
    /// removed first so every run starts from a pristine tree.
    pub async fn prepare(
        &self,
        instance_id: &str,
        repo: &str,
        base_commit: &str,
    ) -> Result<PathBuf> {
        let clone_dir = self.clone_dir(repo);
        self.ensure_clone(repo, &clone_dir, base_commit).await?;

        let worktree = self.instance_dir(instance_id);
        if worktree.exists() {
            debug!(path = %worktree.display(), "removing stale worktree");
            let _ = git(&clone_dir, &["worktree", "remove", "--force", &worktree.to_string_lossy()]).await;
            if worktree.exists() {
                std::fs::remove_dir_all(&worktree)
                    .with_context(|| format!("failed to remove '{}'", worktree.display()))?;
            }
        }
        git(&clone_dir, &["worktree", "prune"]).await?;

        info!(instance = instance_id, commit = base_commit, "creating worktree");
        git(
            &clone_dir,
            &[
                "worktree",
                "add",
                "--detach",
                &worktree.to_string_lossy(),
                base_commit,
            ],
        )
        .await
        .with_context(|| format!("failed to create worktree for {}", instance_id))?;

        Ok(worktree)
    }

    async fn ensure_clone(&self, repo: &str, clone_dir: &Path, base_commit: &str) -> Result<()> {
        if !clone_dir.join(".git").exists() {
            if let Some(parent) = clone_dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let url = repo_url(repo);
            info!(repo = repo, "cloning repository");
            git_in(
                None,
                &["clone", "--quiet", &url, &clone_dir.to_string_lossy()],
            )
            .await
            .with_context(|| format!("failed to clone {}", url))?;
            return Ok(());
        }

        // clone exists; fetch only when the base commit is missing
        let have_commit = git(clone_dir, &["cat-file", "-e", &format!("{}^{{commit}}", base_commit)])
            .await
            .is_ok();
        if !have_commit {
            info!(repo = repo, commit = base_commit, "fetching missing commit");
            git(clone_dir, &["fetch", "--all", "--quiet"]).await?;
        }

        Ok(())
    }

    /// Extract the model patch: intent-to-add untracked files so new files
    /// appear in the diff, then `git diff`.
    pub async fn extract_patch(&self, worktree: &Path) -> Result<String> {
        git(worktree, &["add", "-N", "."]).await?;
        git(worktree, &["diff"]).await
    }

    /// Remove an instance worktree after the run
    pub async fn cleanup(&self, instance_id: &str, repo: &str) -> Result<()> {
        let worktree = self.instance_dir(instance_id);
        if !worktree.exists() {
            return Ok(());
        }
        let clone_dir = self.clone_dir(repo);
        git(
            &clone_dir,
            &["worktree", "remove", "--force", &worktree.to_string_lossy()],
        )
        .await?;
        Ok(())
    }
}

/// GitHub URL for an `owner/name` repo identifier
pub fn repo_url(repo: &str) -> String {
    format!("https://github.com/{}.git", repo)
}

/// Directory-safe name for a repo identifier, matching SWE-bench's
/// `owner__name` convention
pub fn sanitize_repo(repo: &str) -> String {
    repo.replace('/', "__")
}

async fn git(cwd: &Path, args: &[&str]) -> Result<String> {
    git_in(Some(cwd), args).await
}

async fn git_in(cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).kill_on_drop(true);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    debug!(?args, "git");
    let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("git {:?} timed out after {}s", args, GIT_TIMEOUT.as_secs()))?
        .with_context(|| format!("failed to run git {:?}", args))?;

    if !output.status.success() {
        bail!(
            "git {:?} failed (exit {:?}): {}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_repo() {
        assert_eq!(sanitize_repo("django/django"), "django__django");
        assert_eq!(sanitize_repo("pallets/flask"), "pallets__flask");
    }

    #[test]
    fn test_repo_url() {
        assert_eq!(
            repo_url("django/django"),
            "https://github.com/django/django.git"
        );
    }

    #[tokio::test]
    async fn test_prepare_and_extract_patch() {
        // build a tiny git repo to act as the "remote" clone
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspaces");
        let clone_dir = root.join("repos").join("local__repo");
        std::fs::create_dir_all(&clone_dir).unwrap();

        for args in [
            vec!["init", "--quiet"],
            vec!["config", "user.email", "t@t"],
            vec!["config", "user.name", "t"],
        ] {
            git(&clone_dir, &args).await.unwrap();
        }
        std::fs::write(clone_dir.join("a.txt"), "one\n").unwrap();
        git(&clone_dir, &["add", "."]).await.unwrap();
        git(&clone_dir, &["commit", "--quiet", "-m", "init"])
            .await
            .unwrap();
        let commit = git(&clone_dir, &["rev-parse", "HEAD"]).await.unwrap();
        let commit = commit.trim();

        let manager = WorkspaceManager::new(&root);
        let worktree = manager
            .prepare("local__repo-1", "local/repo", commit)
            .await
            .unwrap();
        assert!(worktree.join("a.txt").exists());

        // edit a file and add a new one; both must show up in the patch
        std::fs::write(worktree.join("a.txt"), "two\n").unwrap();
        std::fs::write(worktree.join("b.txt"), "new\n").unwrap();
        let patch = manager.extract_patch(&worktree).await.unwrap();
        assert!(patch.contains("a.txt"));
        assert!(patch.contains("b.txt"));
        assert!(patch.contains("+two"));

        manager.cleanup("local__repo-1", "local/repo").await.unwrap();
        assert!(!worktree.exists());
    }
}
