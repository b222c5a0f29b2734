//! Per-source sync orchestration.
//!
//! Walks configured sources in order, running each through the state
//! machine: resolve adapter → sync → reconcile → save manifest. A failing
//! source is recorded and skipped — its previous manifest stays
//! authoritative, untouched — and the pass continues with the next source.

use anyhow::Result;

use crate::adapter::SourceAdapter;
use crate::adapter_docs::DocumentExportAdapter;
use crate::adapter_vcs::VersionControlAdapter;
use crate::adapter_web::WebCrawlAdapter;
use crate::config::{Config, SourceConfig};
use crate::crawler::CrawlSeed;
use crate::error::SyncError;
use crate::manifest::ManifestStore;
use crate::models::{SourceReport, SyncReport};

/// Construct the adapter for one configured source. The kind tag is
/// consulted here and nowhere downstream.
pub fn resolve_adapter(
    config: &Config,
    source: &SourceConfig,
) -> Result<Box<dyn SourceAdapter>, SyncError> {
    let storage_root = config.storage.root.clone();
    match source {
        SourceConfig::Documents(docs) => Ok(Box::new(DocumentExportAdapter::new(
            docs.clone(),
            &config.fetch,
            storage_root,
        )?)),
        SourceConfig::Vcs(vcs) => Ok(Box::new(VersionControlAdapter::new(
            vcs.clone(),
            config.storage.cache_dir(),
            storage_root,
            config.fetch.timeout_secs,
        ))),
        SourceConfig::Web(web) => Ok(Box::new(WebCrawlAdapter::new(
            web.clone(),
            &config.fetch,
            storage_root,
        )?)),
    }
}

fn select_sources<'a>(config: &'a Config, selector: &str) -> Result<Vec<&'a SourceConfig>> {
    if selector == "all" {
        return Ok(config.sources.iter().collect());
    }
    let selected: Vec<&SourceConfig> = config
        .sources
        .iter()
        .filter(|s| s.name() == selector || s.kind() == selector)
        .collect();
    if selected.is_empty() {
        anyhow::bail!(
            "no source matches '{}'; configured: {}",
            selector,
            config
                .sources
                .iter()
                .map(|s| format!("{}:{}", s.kind(), s.name()))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(selected)
}

/// Sync every source matched by `selector` (`all`, a kind, or a name) and
/// return the aggregate report.
pub async fn run_sync(config: &Config, selector: &str) -> Result<SyncReport> {
    let selected = select_sources(config, selector)?;
    std::fs::create_dir_all(&config.storage.root)?;
    let manifests = ManifestStore::new(config.storage.root.clone());

    let mut report = SyncReport::default();

    for source in selected {
        let name = source.name().to_string();
        tracing::info!(source = %name, kind = source.kind(), "syncing");

        let outcome = sync_one(config, source, &manifests).await;
        match outcome {
            Ok(sr) => report.sources.push(sr),
            Err(e) => {
                tracing::error!(source = %name, error = %e, "sync failed");
                report.sources.push(SourceReport {
                    source: name,
                    downloaded: 0,
                    removed: 0,
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                    synced: false,
                });
            }
        }
    }

    Ok(report)
}

async fn sync_one(
    config: &Config,
    source: &SourceConfig,
    manifests: &ManifestStore,
) -> Result<SourceReport, SyncError> {
    let adapter = resolve_adapter(config, source)?;

    // The complete result is buffered before reconciliation: deletion
    // decisions must never see a truncated file set.
    let result = adapter.sync().await?;

    if !result.success {
        // Nothing usable was produced; the previous manifest stays
        // authoritative so still-valid files are not garbage-collected.
        return Ok(SourceReport {
            source: result.source,
            downloaded: 0,
            removed: 0,
            errors: if result.errors.is_empty() {
                vec!["sync produced no files".to_string()]
            } else {
                result.errors
            },
            warnings: result.warnings,
            synced: false,
        });
    }

    let removed = manifests.reconcile(&result.source, &result.files_downloaded)?;
    manifests.save(&result.source, &result.files_downloaded)?;

    Ok(SourceReport {
        source: result.source,
        downloaded: result.files_downloaded.len(),
        removed: removed.len(),
        errors: result.errors,
        warnings: result.warnings,
        synced: true,
    })
}

/// Direct `download()` of named targets against one source, bypassing
/// reconciliation. Debugging aid for a single document or page.
pub async fn run_fetch(
    config: &Config,
    source_name: &str,
    targets: &[String],
    depth: u32,
    format: Option<&str>,
) -> Result<()> {
    let source = config
        .sources
        .iter()
        .find(|s| s.name() == source_name)
        .ok_or_else(|| anyhow::anyhow!("no source named '{}'", source_name))?;

    std::fs::create_dir_all(&config.storage.root)?;
    let adapter = resolve_adapter(config, source)?;
    let seeds: Vec<CrawlSeed> = targets.iter().map(|t| CrawlSeed::new(t.clone())).collect();
    let result = adapter.download(&seeds, depth, format).await?;

    println!("fetch {} (depth {})", source_name, depth);
    for file in &result.files_downloaded {
        println!("  + {}", file.display());
    }
    for warning in &result.warnings {
        println!("  ! {}", warning);
    }
    for error in &result.errors {
        println!("  ✗ {}", error);
    }
    if !result.success {
        anyhow::bail!("fetch produced no files");
    }
    Ok(())
}

/// Print configured sources and their health.
pub fn list_sources(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    for source in &config.sources {
        let adapter = match resolve_adapter(config, source) {
            Ok(a) => a,
            Err(e) => {
                println!("{:12} {:10} unavailable: {}", source.name(), source.kind(), e);
                continue;
            }
        };
        let health = match adapter.health_check() {
            Ok(()) => "ok".to_string(),
            Err(problem) => format!("unhealthy: {problem}"),
        };
        println!(
            "{:12} {:10} {}  [{}]",
            adapter.name(),
            adapter.kind(),
            adapter.describe(),
            health
        );
    }
    Ok(())
}

/// Print each source's manifest summary.
pub fn show_status(config: &Config) -> Result<()> {
    let manifests = ManifestStore::new(config.storage.root.clone());
    for source in &config.sources {
        match manifests.load(source.name()) {
            Ok(Some(m)) => println!(
                "{:12} {} files, last sync {}",
                source.name(),
                m.files.len(),
                m.last_sync.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            Ok(None) => println!("{:12} never synced", source.name()),
            Err(e) => println!("{:12} manifest unreadable: {}", source.name(), e),
        }
    }
    Ok(())
}

/// Print the aggregate report the way `sync` ends every run.
pub fn print_report(report: &SyncReport) {
    for sr in &report.sources {
        let status = if sr.synced { "synced" } else { "FAILED" };
        println!(
            "{:12} {}  +{} -{}",
            sr.source, status, sr.downloaded, sr.removed
        );
        for warning in &sr.warnings {
            println!("    ! {}", warning);
        }
        for error in &sr.errors {
            println!("    ✗ {}", error);
        }
    }
    println!(
        "total: {} downloaded, {} removed",
        report.total_downloaded(),
        report.total_removed()
    );
}

/// Exit status for the whole pass: 0 full success, 1 partial, 2 total
/// failure.
pub fn exit_code(report: &SyncReport) -> i32 {
    if report.total_failure() {
        2
    } else if report.has_errors() {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceReport;

    fn sr(synced: bool, errors: usize) -> SourceReport {
        SourceReport {
            source: "s".to_string(),
            downloaded: 1,
            removed: 0,
            errors: (0..errors).map(|i| format!("e{i}")).collect(),
            warnings: Vec::new(),
            synced,
        }
    }

    #[test]
    fn exit_codes_distinguish_full_partial_total() {
        let full = SyncReport {
            sources: vec![sr(true, 0), sr(true, 0)],
        };
        assert_eq!(exit_code(&full), 0);

        let partial = SyncReport {
            sources: vec![sr(true, 0), sr(false, 1)],
        };
        assert_eq!(exit_code(&partial), 1);

        let partial_node_errors = SyncReport {
            sources: vec![sr(true, 2)],
        };
        assert_eq!(exit_code(&partial_node_errors), 1);

        let total = SyncReport {
            sources: vec![sr(false, 1), sr(false, 1)],
        };
        assert_eq!(exit_code(&total), 2);
    }

    #[test]
    fn selector_matches_name_kind_or_all() {
        let config = crate::config::Config {
            storage: crate::config::StorageConfig {
                root: "/tmp/store".into(),
                cache_dir: None,
            },
            fetch: Default::default(),
            sources: vec![
                SourceConfig::Web(crate::config::WebSourceConfig {
                    name: "blog".to_string(),
                    seeds: vec!["https://blog.example.com/".to_string()],
                    depth: 0,
                    include_patterns: Vec::new(),
                }),
                SourceConfig::Web(crate::config::WebSourceConfig {
                    name: "wiki".to_string(),
                    seeds: vec!["https://wiki.example.com/".to_string()],
                    depth: 0,
                    include_patterns: Vec::new(),
                }),
            ],
        };

        assert_eq!(select_sources(&config, "all").unwrap().len(), 2);
        assert_eq!(select_sources(&config, "web").unwrap().len(), 2);
        assert_eq!(select_sources(&config, "blog").unwrap().len(), 1);
        assert!(select_sources(&config, "nope").is_err());
    }
}
