//! Core data models that flow through the sync engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Result of one adapter invocation (`download` or `sync`).
///
/// Produced fresh per invocation and never partially consumed: the
/// orchestrator buffers the whole result before reconciliation so a
/// short-circuited adapter can never truncate the file set.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Source name this result belongs to.
    pub source: String,
    /// Storage-root-relative paths written during this invocation, in
    /// download order.
    pub files_downloaded: Vec<PathBuf>,
    /// Per-node failures. Non-empty errors do not imply failure: a sync
    /// that produced files alongside some failed nodes still succeeds.
    pub errors: Vec<String>,
    /// Non-fatal conditions worth surfacing in the final report, e.g. a
    /// git pull that failed and left the mirror on stale content.
    pub warnings: Vec<String>,
    /// False only when zero files were produced overall or a fatal
    /// adapter-level condition occurred.
    pub success: bool,
}

impl DownloadResult {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            files_downloaded: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            success: false,
        }
    }

    /// Finalize the success flag: at least one file produced.
    pub fn finish(mut self) -> Self {
        self.success = !self.files_downloaded.is_empty();
        self
    }
}

/// Persisted record of the file set produced by the last successful sync
/// of one source.
///
/// Paths are always relative to the storage root and normalized to forward
/// slashes on disk, so a manifest written on one machine reconciles
/// correctly on another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version, bumped on incompatible layout changes.
    #[serde(default = "default_manifest_version")]
    pub version: u32,
    pub source: String,
    pub last_sync: DateTime<Utc>,
    /// Forward-slash relative paths.
    pub files: BTreeSet<String>,
}

pub const MANIFEST_VERSION: u32 = 1;

fn default_manifest_version() -> u32 {
    MANIFEST_VERSION
}

impl Manifest {
    pub fn new(source: impl Into<String>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            source: source.into(),
            last_sync: Utc::now(),
            files: files.into_iter().map(|p| normalize_rel_path(&p)).collect(),
        }
    }

    /// Whether a (storage-root-relative) path is recorded in this manifest.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(&normalize_rel_path(path))
    }
}

/// Normalize a relative path to the forward-slash form stored in manifests.
pub fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Per-source outcome inside the aggregate report.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub downloaded: usize,
    pub removed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub synced: bool,
}

/// Aggregate outcome of one orchestrator pass over all selected sources.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub sources: Vec<SourceReport>,
}

impl SyncReport {
    pub fn total_downloaded(&self) -> usize {
        self.sources.iter().map(|s| s.downloaded).sum()
    }

    pub fn total_removed(&self) -> usize {
        self.sources.iter().map(|s| s.removed).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.sources.iter().any(|s| !s.errors.is_empty() || !s.synced)
    }

    /// True when every source failed to sync.
    pub fn total_failure(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(|s| !s.synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_paths_normalized_to_forward_slashes() {
        let m = Manifest::new("docs", vec![PathBuf::from("a").join("b").join("c.md")]);
        assert!(m.files.contains("a/b/c.md"));
        assert!(m.contains(&PathBuf::from("a").join("b").join("c.md")));
    }

    #[test]
    fn finish_requires_at_least_one_file() {
        let empty = DownloadResult::new("web").finish();
        assert!(!empty.success);

        let mut r = DownloadResult::new("web");
        r.files_downloaded.push(PathBuf::from("page.html"));
        r.errors.push("one node failed".to_string());
        let r = r.finish();
        assert!(r.success, "per-node errors must not flip overall success");
    }
}
