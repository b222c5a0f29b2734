//! Per-source manifest persistence and reconciliation.
//!
//! The manifest store is the sole writer of manifest state. Adapters only
//! ever report what they downloaded; orphan deletion happens here, after
//! the orchestrator has buffered the complete file set of the pass.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::models::{normalize_rel_path, Manifest};

const MANIFEST_DIR: &str = ".manifests";

pub struct ManifestStore {
    storage_root: PathBuf,
}

impl ManifestStore {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    fn manifest_path(&self, source: &str) -> PathBuf {
        self.storage_root
            .join(MANIFEST_DIR)
            .join(format!("{source}.json"))
    }

    /// Load the manifest for a source. Absent file means first run.
    pub fn load(&self, source: &str) -> Result<Option<Manifest>, SyncError> {
        let path = self.manifest_path(source);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Manifest {
                    name: source.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| SyncError::Manifest {
                name: source.to_string(),
                reason: format!("corrupt manifest {}: {}", path.display(), e),
            })?;
        Ok(Some(manifest))
    }

    /// Fully replace the manifest for a source with a fresh timestamp.
    ///
    /// Write-then-rename: a crash mid-write leaves the previous manifest
    /// intact, never a half-written one.
    pub fn save(&self, source: &str, current_files: &[PathBuf]) -> Result<(), SyncError> {
        let manifest = Manifest::new(source, current_files.iter().cloned());
        let path = self.manifest_path(source);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&manifest).map_err(|e| SyncError::Manifest {
            name: source.to_string(),
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete files present in the previous manifest but absent from the
    /// current pass, pruning directories emptied by the deletions.
    ///
    /// Must be called with the complete file set of the sync pass; a
    /// truncated set would delete still-valid files. A deletion blocked by
    /// the filesystem is logged and the orphan left on disk; once the new
    /// manifest is saved it is no longer tracked.
    pub fn reconcile(
        &self,
        source: &str,
        current_files: &[PathBuf],
    ) -> Result<Vec<PathBuf>, SyncError> {
        let Some(previous) = self.load(source)? else {
            return Ok(Vec::new());
        };

        let current: BTreeSet<String> = current_files
            .iter()
            .map(|p| normalize_rel_path(p))
            .collect();

        let mut removed = Vec::new();
        for orphan in previous.files.difference(&current) {
            let rel = PathBuf::from(orphan);
            let abs = self.storage_root.join(&rel);
            if !abs.exists() {
                continue;
            }
            match fs::remove_file(&abs) {
                Ok(()) => {
                    self.prune_empty_ancestors(&abs);
                    removed.push(rel);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %abs.display(),
                        error = %e,
                        "could not delete orphan; leaving it in place"
                    );
                }
            }
        }

        Ok(removed)
    }

    /// Walk upward from a deleted file, removing directories that have
    /// become empty, stopping at (and excluding) the storage root.
    fn prune_empty_ancestors(&self, deleted: &Path) {
        let mut dir = deleted.parent();
        while let Some(d) = dir {
            if d == self.storage_root || !d.starts_with(&self.storage_root) {
                break;
            }
            match fs::read_dir(d) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(_) => break,
            }
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}
