//! Depth-bounded, deduplicating link-graph traversal.
//!
//! Drives the document-export and web adapters. The crawler knows nothing
//! about backends: a [`NodeSource`] fetches one node, persists it, and
//! hands back the raw outbound links found in it; the crawler owns the
//! visited set, depth bookkeeping, and error isolation.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashSet, VecDeque};

use crate::error::SyncError;
use crate::models::DownloadResult;

/// Outcome of fetching a single node.
#[derive(Debug)]
pub struct FetchedNode {
    /// Storage-root-relative path the node was written to.
    pub path: std::path::PathBuf,
    /// Raw outbound links, as they appeared in the content. Empty when
    /// link extraction was skipped.
    pub links: Vec<String>,
}

/// Backend hook for the crawler.
#[async_trait::async_trait]
pub trait NodeSource: Send + Sync {
    /// Fetch one target and persist it under the content store.
    ///
    /// `extract_links` is false on the traversal frontier (the node's
    /// depth has exhausted its budget), letting the backend skip parsing
    /// entirely.
    async fn fetch(&self, target: &str, extract_links: bool) -> Result<FetchedNode, SyncError>;

    /// Reduce a raw link found in `base`'s content to a canonical target
    /// identifier. `None` means the link is not followable (foreign
    /// scheme, unparseable, fragment-only).
    fn canonicalize(&self, base: &str, raw: &str) -> Option<String>;
}

/// A traversal starting point. `depth` overrides the crawl-wide default
/// for this seed's whole subtree (mirror-list entries carry these).
#[derive(Debug, Clone)]
pub struct CrawlSeed {
    pub target: String,
    pub depth: Option<u32>,
}

impl CrawlSeed {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            depth: None,
        }
    }

    pub fn with_depth(target: impl Into<String>, depth: u32) -> Self {
        Self {
            target: target.into(),
            depth: Some(depth),
        }
    }
}

struct QueuedNode {
    target: String,
    depth: u32,
    /// Max depth inherited from this node's seed.
    budget: u32,
}

/// Generic breadth-first crawler with per-seed depth budgets and an
/// optional allow-list on discovered targets.
pub struct GraphCrawler<'a, S: NodeSource> {
    source: &'a S,
    default_depth: u32,
    allow: Option<GlobSet>,
}

impl<'a, S: NodeSource> GraphCrawler<'a, S> {
    pub fn new(source: &'a S, default_depth: u32) -> Self {
        Self {
            source,
            default_depth,
            allow: None,
        }
    }

    /// Restrict which discovered links are queued. Seeds are always
    /// fetched; the allow-list only filters expansion.
    pub fn with_allow_patterns(mut self, patterns: &[String]) -> Result<Self, SyncError> {
        if patterns.is_empty() {
            return Ok(self);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| SyncError::Config(format!("bad include pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        self.allow = Some(set);
        Ok(self)
    }

    /// Traverse from `seeds`, appending downloaded paths and per-node
    /// errors to `result`.
    ///
    /// The visited set lives and dies inside this call: it is never
    /// persisted or shared across sources, which keeps re-runs honest
    /// while still breaking intra-run cycles. Discovered links are marked
    /// visited before they are queued, so a node reachable through two
    /// parents is fetched exactly once.
    pub async fn crawl(&self, seeds: &[CrawlSeed], result: &mut DownloadResult) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<QueuedNode> = VecDeque::new();

        for seed in seeds {
            if visited.insert(seed.target.clone()) {
                queue.push_back(QueuedNode {
                    target: seed.target.clone(),
                    depth: 0,
                    budget: seed.depth.unwrap_or(self.default_depth),
                });
            }
        }

        while let Some(node) = queue.pop_front() {
            let expand = node.depth < node.budget;

            let fetched = match self.source.fetch(&node.target, expand).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(node = %node.target, error = %e, "node fetch failed");
                    result.errors.push(e.to_string());
                    continue;
                }
            };

            result.files_downloaded.push(fetched.path);

            if !expand {
                continue;
            }

            for raw in &fetched.links {
                let Some(canonical) = self.source.canonicalize(&node.target, raw) else {
                    continue;
                };
                if visited.contains(&canonical) {
                    continue;
                }
                if let Some(allow) = &self.allow {
                    if !allow.is_match(&canonical) {
                        continue;
                    }
                }
                visited.insert(canonical.clone());
                queue.push_back(QueuedNode {
                    target: canonical,
                    depth: node.depth + 1,
                    budget: node.budget,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory graph; records every fetch and the extract flag it saw.
    struct FakeGraph {
        edges: HashMap<String, Vec<String>>,
        failing: HashSet<String>,
        fetched: Mutex<Vec<(String, bool)>>,
    }

    impl FakeGraph {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            Self {
                edges: edges
                    .iter()
                    .map(|(k, v)| {
                        (k.to_string(), v.iter().map(|s| s.to_string()).collect())
                    })
                    .collect(),
                failing: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, target: &str) -> Self {
            self.failing.insert(target.to_string());
            self
        }

        fn fetch_count(&self, target: &str) -> usize {
            self.fetched
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| t == target)
                .count()
        }
    }

    #[async_trait::async_trait]
    impl NodeSource for FakeGraph {
        async fn fetch(&self, target: &str, extract_links: bool) -> Result<FetchedNode, SyncError> {
            self.fetched
                .lock()
                .unwrap()
                .push((target.to_string(), extract_links));
            if self.failing.contains(target) {
                return Err(SyncError::fetch(target, "simulated outage"));
            }
            let links = if extract_links {
                self.edges.get(target).cloned().unwrap_or_default()
            } else {
                Vec::new()
            };
            Ok(FetchedNode {
                path: PathBuf::from(format!("{target}.md")),
                links,
            })
        }

        fn canonicalize(&self, _base: &str, raw: &str) -> Option<String> {
            let canonical = raw.split('#').next().unwrap_or("").to_string();
            if canonical.is_empty() {
                None
            } else {
                Some(canonical)
            }
        }
    }

    fn paths(result: &DownloadResult) -> Vec<String> {
        let mut v: Vec<String> = result
            .files_downloaded
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        v.sort();
        v
    }

    #[tokio::test]
    async fn diamond_graph_fetches_shared_node_once() {
        let graph = FakeGraph::new(&[
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D"]),
            ("D", &[]),
        ]);
        let crawler = GraphCrawler::new(&graph, 2);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("A")], &mut result).await;

        assert_eq!(paths(&result), vec!["A.md", "B.md", "C.md", "D.md"]);
        assert_eq!(graph.fetch_count("D"), 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn cycle_terminates_with_each_node_fetched_once() {
        let graph = FakeGraph::new(&[("A", &["B"]), ("B", &["A"])]);
        let crawler = GraphCrawler::new(&graph, 5);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("A")], &mut result).await;

        assert_eq!(paths(&result), vec!["A.md", "B.md"]);
        assert_eq!(graph.fetch_count("A"), 1);
        assert_eq!(graph.fetch_count("B"), 1);
    }

    #[tokio::test]
    async fn depth_zero_downloads_seeds_without_link_extraction() {
        let graph = FakeGraph::new(&[("A", &["B"]), ("B", &[])]);
        let crawler = GraphCrawler::new(&graph, 0);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("A")], &mut result).await;

        assert_eq!(paths(&result), vec!["A.md"]);
        let fetched = graph.fetched.lock().unwrap();
        assert_eq!(fetched.as_slice(), &[("A".to_string(), false)]);
    }

    #[tokio::test]
    async fn depth_bound_excludes_nodes_past_the_budget() {
        // docA -> docB, docC; docB -> docD. Depth 1 keeps docD out.
        let graph = FakeGraph::new(&[
            ("docA", &["docB", "docC"]),
            ("docB", &["docD"]),
            ("docC", &[]),
            ("docD", &[]),
        ]);
        let crawler = GraphCrawler::new(&graph, 1);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("docA")], &mut result).await;

        assert_eq!(paths(&result), vec!["docA.md", "docB.md", "docC.md"]);
        assert_eq!(graph.fetch_count("docD"), 0);
    }

    #[tokio::test]
    async fn failed_node_is_isolated_from_siblings() {
        let graph = FakeGraph::new(&[
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D"]),
            ("D", &[]),
        ])
        .failing("D");
        let crawler = GraphCrawler::new(&graph, 2);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("A")], &mut result).await;

        assert_eq!(paths(&result), vec!["A.md", "B.md", "C.md"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("D"));
    }

    #[tokio::test]
    async fn per_seed_depth_override_wins_over_default() {
        let graph = FakeGraph::new(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);

        // Default 0 would stop at the seed; the override follows one hop.
        let crawler = GraphCrawler::new(&graph, 0);
        let mut result = DownloadResult::new("test");
        crawler
            .crawl(&[CrawlSeed::with_depth("A", 1)], &mut result)
            .await;
        assert_eq!(paths(&result), vec!["A.md", "B.md"]);

        // And the other direction: an override below the default clamps.
        let graph = FakeGraph::new(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        let crawler = GraphCrawler::new(&graph, 5);
        let mut result = DownloadResult::new("test");
        crawler
            .crawl(&[CrawlSeed::with_depth("A", 0)], &mut result)
            .await;
        assert_eq!(paths(&result), vec!["A.md"]);
    }

    #[tokio::test]
    async fn allow_list_filters_expansion_but_not_seeds() {
        let graph = FakeGraph::new(&[
            ("keep-A", &["keep-B", "drop-C"]),
            ("keep-B", &[]),
            ("drop-C", &[]),
        ]);
        let crawler = GraphCrawler::new(&graph, 2)
            .with_allow_patterns(&["keep-*".to_string()])
            .unwrap();
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("keep-A")], &mut result).await;

        assert_eq!(paths(&result), vec!["keep-A.md", "keep-B.md"]);
        assert_eq!(graph.fetch_count("drop-C"), 0);
    }

    #[tokio::test]
    async fn fragment_variants_of_a_visited_node_are_not_refetched() {
        let graph = FakeGraph::new(&[("A", &["B", "B#intro", "B#usage"]), ("B", &[])]);
        let crawler = GraphCrawler::new(&graph, 1);
        let mut result = DownloadResult::new("test");
        crawler.crawl(&[CrawlSeed::new("A")], &mut result).await;

        assert_eq!(graph.fetch_count("B"), 1);
    }

    #[tokio::test]
    async fn duplicate_seeds_collapse() {
        let graph = FakeGraph::new(&[("A", &[])]);
        let crawler = GraphCrawler::new(&graph, 0);
        let mut result = DownloadResult::new("test");
        crawler
            .crawl(&[CrawlSeed::new("A"), CrawlSeed::new("A")], &mut result)
            .await;

        assert_eq!(graph.fetch_count("A"), 1);
    }
}
