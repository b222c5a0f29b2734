//! Version-control adapter.
//!
//! Mirrors a git repository through a cached shallow clone: the first sync
//! clones depth-1 into a directory keyed by (url, branch), later syncs
//! fast-forward the cache. A pull failure is survivable — the sync carries
//! on with the existing (possibly stale) clone and surfaces a warning in
//! the report. Matched files are copied into the content store preserving
//! their repository-relative paths.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::adapter::{sanitize_component, SourceAdapter};
use crate::config::VcsSourceConfig;
use crate::crawler::CrawlSeed;
use crate::error::SyncError;
use crate::models::DownloadResult;

/// Derives the stable local cache directory for a remote repository.
///
/// The key hashes both url and branch, so two branches of the same
/// repository never share a clone.
pub struct PathCache {
    cache_root: PathBuf,
}

impl PathCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn repo_dir(&self, url: &str, branch: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(branch.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        // Human-readable prefix plus the hash for collision resistance.
        let stem = url
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("repo");
        self.cache_root
            .join("vcs")
            .join(format!("{}-{}", sanitize_component(stem), &hash[..12]))
    }
}

pub struct VersionControlAdapter {
    config: VcsSourceConfig,
    cache: PathCache,
    storage_root: PathBuf,
    git_timeout: Duration,
}

impl VersionControlAdapter {
    pub fn new(
        config: VcsSourceConfig,
        cache_root: PathBuf,
        storage_root: PathBuf,
        git_timeout_secs: u64,
    ) -> Self {
        Self {
            config,
            cache: PathCache::new(cache_root),
            storage_root,
            git_timeout: Duration::from_secs(git_timeout_secs),
        }
    }

    async fn git(&self, args: &[&str], cwd: Option<&Path>) -> Result<(), SyncError> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(self.git_timeout, cmd.output())
            .await
            .map_err(|_| {
                SyncError::fetch(
                    self.config.url.as_str(),
                    format!("git {} timed out", args.first().unwrap_or(&"")),
                )
            })?
            .map_err(|e| SyncError::fetch(self.config.url.as_str(), format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::fetch(
                self.config.url.as_str(),
                format!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim()),
            ));
        }
        Ok(())
    }

    async fn clone_repo(&self, dest: &Path) -> Result<(), SyncError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dest_str = dest.to_string_lossy();
        self.git(
            &[
                "clone",
                "--branch",
                &self.config.branch,
                "--single-branch",
                "--depth",
                "1",
                &self.config.url,
                dest_str.as_ref(),
            ],
            None,
        )
        .await
    }

    async fn pull(&self, repo_dir: &Path) -> Result<(), SyncError> {
        self.git(
            &["fetch", "--depth", "1", "origin", &self.config.branch],
            Some(repo_dir),
        )
        .await?;
        let remote_ref = format!("origin/{}", self.config.branch);
        self.git(&["reset", "--hard", &remote_ref], Some(repo_dir))
            .await
    }

    /// Bring the cached clone up to date, or create it.
    ///
    /// Returns a stale-content warning when an existing clone could not be
    /// updated. A failed *first* clone is adapter-fatal: there is nothing
    /// to fall back to.
    async fn refresh_clone(&self, repo_dir: &Path) -> Result<Option<String>, SyncError> {
        if repo_dir.join(".git").exists() {
            match self.pull(repo_dir).await {
                Ok(()) => Ok(None),
                Err(e) => {
                    tracing::warn!(
                        source = %self.config.name,
                        error = %e,
                        "pull failed; continuing with stale clone"
                    );
                    Ok(Some(format!(
                        "stale: could not update {} ({e}); mirrored from existing clone",
                        self.config.url
                    )))
                }
            }
        } else {
            self.clone_repo(repo_dir).await.map_err(|e| {
                SyncError::fatal(self.config.name.as_str(), format!("initial clone failed: {e}"))
            })?;
            Ok(None)
        }
    }

    /// Copy glob-matched files from the clone into the content store,
    /// preserving relative paths. Returns storage-root-relative paths.
    fn copy_matching(
        &self,
        repo_dir: &Path,
        globs: &GlobSet,
        result: &mut DownloadResult,
    ) -> Result<(), SyncError> {
        let out_base = Path::new(&self.config.name);

        let walker = WalkDir::new(repo_dir).follow_links(self.config.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // Dangling symlinks land here when following links;
                    // they are never copied as-is.
                    result.errors.push(format!("walk error: {e}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.config.follow_symlinks && entry.path_is_symlink() {
                continue;
            }

            let path = entry.path();
            let rel = path.strip_prefix(repo_dir).unwrap_or(path);
            if rel.starts_with(".git") {
                continue;
            }
            if !globs.is_match(rel) {
                continue;
            }

            let dest_rel = out_base.join(rel);
            let dest_abs = self.storage_root.join(&dest_rel);
            if let Some(parent) = dest_abs.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match std::fs::copy(path, &dest_abs) {
                Ok(_) => result.files_downloaded.push(dest_rel),
                Err(e) => result
                    .errors
                    .push(format!("copy {} failed: {}", rel.display(), e)),
            }
        }
        Ok(())
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet, SyncError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| SyncError::Config(format!("bad glob '{pattern}': {e}")))?;
            builder.add(glob);
        }
        builder.build().map_err(|e| SyncError::Config(e.to_string()))
    }

    async fn sync_with_globs(&self, patterns: &[String]) -> Result<DownloadResult, SyncError> {
        let globs = Self::build_globset(patterns)?;
        let repo_dir = self.cache.repo_dir(&self.config.url, &self.config.branch);

        let mut result = DownloadResult::new(self.config.name.as_str());
        if let Some(stale) = self.refresh_clone(&repo_dir).await? {
            result.warnings.push(stale);
        }

        self.copy_matching(&repo_dir, &globs, &mut result)?;
        Ok(result.finish())
    }
}

#[async_trait::async_trait]
impl SourceAdapter for VersionControlAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "vcs"
    }

    fn describe(&self) -> String {
        format!("{} (branch {})", self.config.url, self.config.branch)
    }

    fn health_check(&self) -> Result<(), String> {
        which_git().map_err(|e| e.to_string())
    }

    /// `targets` are glob patterns matched under the clone root; depth and
    /// format do not apply to repository mirroring.
    async fn download(
        &self,
        targets: &[CrawlSeed],
        _depth: u32,
        _format: Option<&str>,
    ) -> Result<DownloadResult, SyncError> {
        let patterns: Vec<String> = targets.iter().map(|t| t.target.clone()).collect();
        self.sync_with_globs(&patterns).await
    }

    async fn sync(&self) -> Result<DownloadResult, SyncError> {
        self.sync_with_globs(&self.config.include_globs).await
    }
}

fn which_git() -> Result<(), SyncError> {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map_err(|e| SyncError::Config(format!("git not available: {e}")))?;
    Ok(())
}
