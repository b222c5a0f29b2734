//! Document-export adapter.
//!
//! Mirrors cloud-hosted documents through an export API: each document is
//! fetched as `export_url` with `{id}` and `{format}` substituted, written
//! under `<storage_root>/<source>/`, and — when the export format carries
//! hyperlinks — mined for further document identifiers up to the crawl
//! depth. Bulk mirroring reads a line-oriented mirror list whose entries
//! can override the crawl depth per target.

use std::path::{Path, PathBuf};
use url::Url;

use crate::adapter::{sanitize_component, write_atomic, SourceAdapter};
use crate::config::{DocumentSourceConfig, FetchConfig};
use crate::crawler::{CrawlSeed, FetchedNode, GraphCrawler, NodeSource};
use crate::error::SyncError;
use crate::links;
use crate::models::DownloadResult;

pub struct DocumentExportAdapter {
    config: DocumentSourceConfig,
    client: reqwest::Client,
    storage_root: PathBuf,
}

/// One parsed mirror-list entry: `<url-or-id> [depth=N] [# comment]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub target: String,
    pub depth: Option<u32>,
}

/// Parse a mirror-list file. Blank lines and `#` lines are ignored; a
/// malformed line is skipped with a warning, never fatal.
pub fn parse_mirror_list(content: &str) -> (Vec<MirrorEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for (lineno, raw_line) in content.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let target = parts.next().expect("non-empty line has a first token");
        let mut depth = None;
        let mut malformed = false;

        for extra in parts {
            match extra.strip_prefix("depth=") {
                Some(value) => match value.parse::<u32>() {
                    Ok(d) => depth = Some(d),
                    Err(_) => malformed = true,
                },
                None => malformed = true,
            }
        }

        if malformed {
            warnings.push(format!(
                "mirror list line {}: malformed entry '{}', skipped",
                lineno + 1,
                raw_line.trim()
            ));
            continue;
        }

        entries.push(MirrorEntry {
            target: target.to_string(),
            depth,
        });
    }

    (entries, warnings)
}

impl DocumentExportAdapter {
    pub fn new(
        config: DocumentSourceConfig,
        fetch: &FetchConfig,
        storage_root: PathBuf,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self {
            config,
            client,
            storage_root,
        })
    }

    fn token(&self) -> Result<Option<String>, SyncError> {
        match &self.config.token_env {
            None => Ok(None),
            Some(var) => match std::env::var(var) {
                Ok(token) => Ok(Some(token)),
                Err(_) => Err(SyncError::fatal(
                    self.config.name.as_str(),
                    format!("credentials missing: environment variable {var} is not set"),
                )),
            },
        }
    }

    /// Extract the document identifier from a seed or discovered link.
    ///
    /// Accepts bare identifiers as-is; for URLs, takes the last non-empty
    /// path segment. Fragments never participate in identity.
    fn doc_id(&self, target: &str) -> Option<String> {
        let target = target.split('#').next().unwrap_or("").trim();
        if target.is_empty() {
            return None;
        }
        if let Ok(url) = Url::parse(target) {
            if !matches!(url.scheme(), "http" | "https") {
                return None;
            }
            return url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(|s| s.to_string());
        }
        // Bare identifier; reject anything path-like.
        if target.contains('/') {
            return None;
        }
        Some(target.to_string())
    }

    fn extension(&self, format: &str) -> &'static str {
        match format {
            "markdown" | "md" => "md",
            "html" => "html",
            _ => "txt",
        }
    }

    fn rel_path(&self, id: &str, format: &str) -> PathBuf {
        Path::new(&self.config.name).join(format!(
            "{}.{}",
            sanitize_component(id),
            self.extension(format)
        ))
    }

    fn mirror_seeds(&self) -> Result<(Vec<CrawlSeed>, Vec<String>), SyncError> {
        let mut seeds: Vec<CrawlSeed> = self
            .config
            .seeds
            .iter()
            .map(|s| CrawlSeed::new(s.clone()))
            .collect();
        let mut warnings = Vec::new();

        if let Some(list_path) = &self.config.mirror_list {
            let content = std::fs::read_to_string(list_path).map_err(|e| {
                SyncError::fatal(
                    self.config.name.as_str(),
                    format!("cannot read mirror list {}: {}", list_path.display(), e),
                )
            })?;
            let (entries, parse_warnings) = parse_mirror_list(&content);
            warnings.extend(parse_warnings);
            seeds.extend(entries.into_iter().map(|e| CrawlSeed {
                target: e.target,
                depth: e.depth,
            }));
        }

        Ok((seeds, warnings))
    }

    async fn crawl(
        &self,
        seeds: &[CrawlSeed],
        depth: u32,
        format: &str,
    ) -> Result<DownloadResult, SyncError> {
        let token = self.token()?;
        let mut result = DownloadResult::new(self.config.name.as_str());

        let node_source = ExportNodeSource {
            adapter: self,
            token,
            format: format.to_string(),
        };
        let crawler = GraphCrawler::new(&node_source, depth)
            .with_allow_patterns(&self.config.include_patterns)?;
        crawler.crawl(seeds, &mut result).await;

        Ok(result.finish())
    }
}

/// Crawler hook: one node = one exported document.
struct ExportNodeSource<'a> {
    adapter: &'a DocumentExportAdapter,
    token: Option<String>,
    format: String,
}

#[async_trait::async_trait]
impl NodeSource for ExportNodeSource<'_> {
    async fn fetch(&self, target: &str, extract_links: bool) -> Result<FetchedNode, SyncError> {
        let id = self
            .adapter
            .doc_id(target)
            .ok_or_else(|| SyncError::fetch(target, "not a document identifier"))?;

        let url = self
            .adapter
            .config
            .export_url
            .replace("{id}", &id)
            .replace("{format}", &self.format);

        let mut request = self.adapter.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::fetch(target, e))?;
        if !response.status().is_success() {
            return Err(SyncError::fetch(
                target,
                format!("export returned {}", response.status()),
            ));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::fetch(target, e))?;

        let rel = self.adapter.rel_path(&id, &self.format);
        write_atomic(&self.adapter.storage_root, &rel, &body)?;

        let links = if extract_links {
            match self.format.as_str() {
                "markdown" | "md" => {
                    links::extract_markdown_links(&String::from_utf8_lossy(&body))
                }
                "html" => links::extract_html_links(&String::from_utf8_lossy(&body)),
                // Opaque export formats carry no minable hyperlinks.
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };

        Ok(FetchedNode { path: rel, links })
    }

    fn canonicalize(&self, _base: &str, raw: &str) -> Option<String> {
        self.adapter.doc_id(raw)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DocumentExportAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "documents"
    }

    fn describe(&self) -> String {
        format!(
            "export API {} (format {}, depth {})",
            self.config.export_url, self.config.format, self.config.depth
        )
    }

    fn health_check(&self) -> Result<(), String> {
        if let Some(var) = &self.config.token_env {
            if std::env::var(var).is_err() {
                return Err(format!("environment variable {var} is not set"));
            }
        }
        if let Some(list) = &self.config.mirror_list {
            if !list.exists() {
                return Err(format!("mirror list {} not found", list.display()));
            }
        }
        Ok(())
    }

    async fn download(
        &self,
        targets: &[CrawlSeed],
        depth: u32,
        format: Option<&str>,
    ) -> Result<DownloadResult, SyncError> {
        let format = format.unwrap_or(&self.config.format).to_string();
        self.crawl(targets, depth, &format).await
    }

    async fn sync(&self) -> Result<DownloadResult, SyncError> {
        let (seeds, warnings) = self.mirror_seeds()?;
        if seeds.is_empty() {
            return Err(SyncError::fatal(self.config.name.as_str(), "no targets to mirror"));
        }
        let mut result = self
            .crawl(&seeds, self.config.depth, &self.config.format)
            .await?;
        for warning in &warnings {
            tracing::warn!(source = %self.config.name, "{warning}");
        }
        result.warnings.extend(warnings);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_list_parses_targets_depths_and_comments() {
        let content = "\
# handbook mirror
root-doc
https://docs.example.com/d/abc123 depth=2   # the architecture tree
team-notes depth=0

";
        let (entries, warnings) = parse_mirror_list(content);
        assert!(warnings.is_empty());
        assert_eq!(
            entries,
            vec![
                MirrorEntry {
                    target: "root-doc".to_string(),
                    depth: None
                },
                MirrorEntry {
                    target: "https://docs.example.com/d/abc123".to_string(),
                    depth: Some(2)
                },
                MirrorEntry {
                    target: "team-notes".to_string(),
                    depth: Some(0)
                },
            ]
        );
    }

    #[test]
    fn malformed_mirror_lines_skipped_with_warning() {
        let content = "good-doc\nbad-doc depth=banana\nother-doc depth=1 stray-token\n";
        let (entries, warnings) = parse_mirror_list(content);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "good-doc");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("line 2"));
        assert!(warnings[1].contains("line 3"));
    }

    fn adapter() -> DocumentExportAdapter {
        DocumentExportAdapter::new(
            DocumentSourceConfig {
                name: "handbook".to_string(),
                export_url: "https://docs.example.com/export/{id}?fmt={format}".to_string(),
                seeds: vec!["root-doc".to_string()],
                mirror_list: None,
                depth: 1,
                format: "markdown".to_string(),
                token_env: None,
                include_patterns: Vec::new(),
            },
            &FetchConfig::default(),
            PathBuf::from("/tmp/store"),
        )
        .unwrap()
    }

    #[test]
    fn doc_id_from_bare_id_and_url() {
        let a = adapter();
        assert_eq!(a.doc_id("abc-123").as_deref(), Some("abc-123"));
        assert_eq!(
            a.doc_id("https://docs.example.com/d/abc-123#sec").as_deref(),
            Some("abc-123")
        );
        assert_eq!(
            a.doc_id("https://docs.example.com/d/abc-123/").as_deref(),
            Some("abc-123")
        );
        assert_eq!(a.doc_id("mailto:x@example.com"), None);
        assert_eq!(a.doc_id("#fragment-only"), None);
        assert_eq!(a.doc_id("relative/path"), None);
    }

    #[test]
    fn output_path_is_source_scoped_and_extension_matches_format() {
        let a = adapter();
        assert_eq!(
            a.rel_path("abc-123", "markdown"),
            PathBuf::from("handbook/abc-123.md")
        );
        assert_eq!(
            a.rel_path("weird/id", "html"),
            PathBuf::from("handbook/weird_id.html")
        );
    }

    #[test]
    fn missing_token_env_is_adapter_fatal() {
        let mut a = adapter();
        a.config.token_env = Some("SOURCE_MIRROR_TEST_TOKEN_UNSET".to_string());
        let err = a.token().unwrap_err();
        assert!(matches!(err, SyncError::AdapterFatal { .. }));
    }
}
