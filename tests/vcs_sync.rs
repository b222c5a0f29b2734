//! End-to-end sync against a real local git repository: first sync clones
//! and copies, an unchanged re-sync is a no-op, and upstream deletions are
//! garbage-collected through the manifest.
//!
//! Requires `git` on PATH, like the vcs adapter itself.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use source_mirror::config::{Config, FetchConfig, SourceConfig, StorageConfig, VcsSourceConfig};
use source_mirror::orchestrate;

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=mirror-test",
            "-c",
            "user.email=mirror-test@example.com",
        ])
        .args(args)
        .current_dir(repo)
        .status()
        .expect("git must be runnable for this test");
    assert!(status.success(), "git {:?} failed", args);
}

fn init_upstream(dir: &Path) {
    git(dir, &["init", "-b", "main", "."]);
    std::fs::create_dir_all(dir.join("docs/guide")).unwrap();
    std::fs::write(dir.join("docs/a.md"), "# a").unwrap();
    std::fs::write(dir.join("docs/guide/b.md"), "# b").unwrap();
    std::fs::write(dir.join("notes.txt"), "not mirrored").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial"]);
}

fn test_config(upstream: &Path, store: &Path) -> Config {
    Config {
        storage: StorageConfig {
            root: store.to_path_buf(),
            cache_dir: None,
        },
        fetch: FetchConfig::default(),
        sources: vec![SourceConfig::Vcs(VcsSourceConfig {
            name: "platform".to_string(),
            url: upstream.to_string_lossy().to_string(),
            branch: "main".to_string(),
            include_globs: vec!["docs/**/*.md".to_string()],
            follow_symlinks: false,
        })],
    }
}

#[tokio::test]
async fn sync_resync_and_garbage_collect() {
    let upstream_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    init_upstream(upstream_dir.path());

    let config = test_config(upstream_dir.path(), store_dir.path());

    // First sync: clone + copy.
    let report = orchestrate::run_sync(&config, "all").await.unwrap();
    assert_eq!(orchestrate::exit_code(&report), 0, "report: {report:?}");
    assert_eq!(report.total_downloaded(), 2);
    assert_eq!(report.total_removed(), 0);
    assert!(store_dir.path().join("platform/docs/a.md").exists());
    assert!(store_dir.path().join("platform/docs/guide/b.md").exists());
    assert!(
        !store_dir.path().join("platform/notes.txt").exists(),
        "unmatched files are not copied"
    );

    // Second sync with no upstream change: identical file set, nothing
    // removed.
    let report = orchestrate::run_sync(&config, "all").await.unwrap();
    assert_eq!(orchestrate::exit_code(&report), 0);
    assert_eq!(report.total_downloaded(), 2);
    assert_eq!(report.total_removed(), 0);
    assert!(store_dir.path().join("platform/docs/a.md").exists());

    // Upstream drops b.md and adds c.md.
    git(upstream_dir.path(), &["rm", "docs/guide/b.md"]);
    std::fs::write(upstream_dir.path().join("docs/c.md"), "# c").unwrap();
    git(upstream_dir.path(), &["add", "."]);
    git(upstream_dir.path(), &["commit", "-m", "replace b with c"]);

    let report = orchestrate::run_sync(&config, "all").await.unwrap();
    assert_eq!(orchestrate::exit_code(&report), 0, "report: {report:?}");
    assert_eq!(report.total_downloaded(), 2);
    assert_eq!(report.total_removed(), 1);
    assert!(store_dir.path().join("platform/docs/a.md").exists());
    assert!(store_dir.path().join("platform/docs/c.md").exists());
    assert!(!store_dir.path().join("platform/docs/guide/b.md").exists());
    assert!(
        !store_dir.path().join("platform/docs/guide").exists(),
        "emptied directory pruned"
    );
}

#[tokio::test]
async fn failing_source_leaves_manifest_untouched() {
    let upstream_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    init_upstream(upstream_dir.path());

    let config = test_config(upstream_dir.path(), store_dir.path());
    orchestrate::run_sync(&config, "all").await.unwrap();
    assert!(store_dir.path().join("platform/docs/a.md").exists());

    // Same source name, now pointing at a repository that cannot clone
    // from a fresh cache.
    let mut broken = test_config(upstream_dir.path(), store_dir.path());
    if let SourceConfig::Vcs(vcs) = &mut broken.sources[0] {
        vcs.url = store_dir
            .path()
            .join("definitely-not-a-repo")
            .to_string_lossy()
            .to_string();
    }
    broken.storage.cache_dir = Some(store_dir.path().join("fresh-cache"));

    let report = orchestrate::run_sync(&broken, "all").await.unwrap();
    assert_eq!(orchestrate::exit_code(&report), 2);

    // Previously mirrored files survive: reconciliation was skipped.
    assert!(store_dir.path().join("platform/docs/a.md").exists());
    assert!(store_dir.path().join("platform/docs/guide/b.md").exists());
}
