//! Web-crawl adapter.
//!
//! Mirrors web pages by depth-bounded traversal of their link graph. Each
//! fetched page is written under `<storage_root>/<source>/<host>/<path>`;
//! discovered anchors are resolved against the page URL, stripped of
//! fragments, and optionally filtered through URL inclusion patterns
//! before they are queued.

use std::path::PathBuf;
use url::Url;

use crate::adapter::{sanitize_component, write_atomic, SourceAdapter};
use crate::config::{FetchConfig, WebSourceConfig};
use crate::crawler::{CrawlSeed, FetchedNode, GraphCrawler, NodeSource};
use crate::error::SyncError;
use crate::links;
use crate::models::DownloadResult;

pub struct WebCrawlAdapter {
    config: WebSourceConfig,
    client: reqwest::Client,
    storage_root: PathBuf,
}

impl WebCrawlAdapter {
    pub fn new(
        config: WebSourceConfig,
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

    /// Map a page URL to a storage-root-relative file path.
    ///
    /// `https://blog.example.com/posts/one` becomes
    /// `<source>/blog.example.com/posts/one.html`; a trailing slash or
    /// empty path becomes `index.html`. Query strings are folded into the
    /// file name so distinct pages never collide.
    fn rel_path(&self, url: &Url) -> PathBuf {
        let mut path = PathBuf::from(&self.config.name);
        path.push(sanitize_component(url.host_str().unwrap_or("unknown-host")));

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (dirs, stem): (&[&str], String) = if segments.is_empty() {
            (&[], "index".to_string())
        } else if url.path().ends_with('/') {
            (&segments[..], "index".to_string())
        } else {
            let last = segments.last().expect("non-empty segments");
            (
                &segments[..segments.len() - 1],
                last.strip_suffix(".html").unwrap_or(last).to_string(),
            )
        };

        for dir in dirs {
            path.push(sanitize_component(dir));
        }

        let mut file = sanitize_component(&stem);
        if let Some(query) = url.query() {
            file = format!("{file}_{}", sanitize_component(query));
        }
        path.push(format!("{file}.html"));
        path
    }

    async fn crawl(&self, seeds: &[CrawlSeed], depth: u32) -> Result<DownloadResult, SyncError> {
        let mut result = DownloadResult::new(self.config.name.as_str());
        let node_source = PageSource { adapter: self };
        let crawler = GraphCrawler::new(&node_source, depth)
            .with_allow_patterns(&self.config.include_patterns)?;
        crawler.crawl(seeds, &mut result).await;
        Ok(result.finish())
    }
}

struct PageSource<'a> {
    adapter: &'a WebCrawlAdapter,
}

#[async_trait::async_trait]
impl NodeSource for PageSource<'_> {
    async fn fetch(&self, target: &str, extract_links: bool) -> Result<FetchedNode, SyncError> {
        let url = Url::parse(target).map_err(|e| SyncError::fetch(target, e))?;

        let response = self
            .adapter
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SyncError::fetch(target, e))?;
        if !response.status().is_success() {
            return Err(SyncError::fetch(
                target,
                format!("origin returned {}", response.status()),
            ));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            // Most origins label pages; assume HTML when they don't.
            .unwrap_or(true);

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::fetch(target, e))?;

        let rel = self.adapter.rel_path(&url);
        write_atomic(&self.adapter.storage_root, &rel, &body)?;

        let links = if extract_links && is_html {
            links::extract_html_links(&String::from_utf8_lossy(&body))
        } else {
            Vec::new()
        };

        Ok(FetchedNode { path: rel, links })
    }

    fn canonicalize(&self, base: &str, raw: &str) -> Option<String> {
        let base = Url::parse(base).ok()?;
        links::normalize_url(&base, raw)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WebCrawlAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "web"
    }

    fn describe(&self) -> String {
        format!(
            "{} seed(s), depth {}",
            self.config.seeds.len(),
            self.config.depth
        )
    }

    fn health_check(&self) -> Result<(), String> {
        for seed in &self.config.seeds {
            Url::parse(seed).map_err(|e| format!("bad seed URL '{seed}': {e}"))?;
        }
        Ok(())
    }

    async fn download(
        &self,
        targets: &[CrawlSeed],
        depth: u32,
        _format: Option<&str>,
    ) -> Result<DownloadResult, SyncError> {
        self.crawl(targets, depth).await
    }

    async fn sync(&self) -> Result<DownloadResult, SyncError> {
        let seeds: Vec<CrawlSeed> = self
            .config
            .seeds
            .iter()
            .map(|s| CrawlSeed::new(s.clone()))
            .collect();
        self.crawl(&seeds, self.config.depth).await
    }
}
