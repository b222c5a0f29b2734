//! The source adapter contract and shared adapter plumbing.

use std::path::Path;

use crate::crawler::CrawlSeed;
use crate::error::SyncError;
use crate::models::DownloadResult;

/// A backend-specific implementation of the source contract.
///
/// Adapters fetch content and report what they wrote; they never consult
/// or mutate manifest state. Deletion decisions belong to the orchestrator
/// and [`crate::manifest::ManifestStore`].
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Configured source name (manifest key and output subdirectory).
    fn name(&self) -> &str;

    /// Backend kind tag: `documents`, `vcs`, or `web`.
    fn kind(&self) -> &'static str;

    /// One-line summary for `smr sources` output.
    fn describe(&self) -> String;

    /// Cheap preflight: credentials present, mirror list readable, and so
    /// on. Returns a human-readable problem description on failure.
    fn health_check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Fetch exactly the named targets, expanding via links up to `depth`.
    ///
    /// Safe to invoke repeatedly; overwriting an existing output file is
    /// not an error. A single target's failure is recorded in the result's
    /// `errors` and does not abort sibling targets.
    async fn download(
        &self,
        targets: &[CrawlSeed],
        depth: u32,
        format: Option<&str>,
    ) -> Result<DownloadResult, SyncError>;

    /// Full sync driven by the adapter's own configuration.
    async fn sync(&self) -> Result<DownloadResult, SyncError>;
}

/// Write `bytes` to `root/rel` through a temporary file.
///
/// The rename is the commit point: a download cancelled or crashed
/// mid-flight leaves at worst a `.part` file, never a truncated final one.
pub(crate) fn write_atomic(root: &Path, rel: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let abs = root.join(rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = abs.with_extension(match abs.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, &abs)?;
    Ok(())
}

/// Reduce an arbitrary identifier to a filename-safe form.
pub(crate) fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
