use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root of the local content store. All downloaded files and per-source
    /// manifests live under this directory.
    pub root: PathBuf,
    /// Cache directory for reusable clones. Defaults to `<root>/.cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.root.join(".cache"))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Per-request timeout for HTTP fetches and export API calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "source-mirror/0.3".to_string()
}

/// One configured source, tagged by backend kind.
///
/// The kind tag is only consulted when constructing the adapter; everything
/// downstream works through the [`crate::adapter::SourceAdapter`] trait.
/// An unknown tag fails TOML deserialization, so misconfiguration surfaces
/// before any network I/O.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Documents(DocumentSourceConfig),
    Vcs(VcsSourceConfig),
    Web(WebSourceConfig),
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Documents(c) => &c.name,
            SourceConfig::Vcs(c) => &c.name,
            SourceConfig::Web(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Documents(_) => "documents",
            SourceConfig::Vcs(_) => "vcs",
            SourceConfig::Web(_) => "web",
        }
    }
}

/// Cloud-hosted documents fetched through an export API.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentSourceConfig {
    pub name: String,
    /// Export endpoint template; `{id}` and `{format}` are substituted per
    /// request, e.g. `https://docs.example.com/api/export/{id}?format={format}`.
    pub export_url: String,
    /// Seed document identifiers or document URLs.
    #[serde(default)]
    pub seeds: Vec<String>,
    /// Optional line-oriented mirror list with per-target depth overrides.
    #[serde(default)]
    pub mirror_list: Option<PathBuf>,
    /// Default link-following depth for seeds without an override.
    #[serde(default)]
    pub depth: u32,
    /// Export format requested from the backend.
    #[serde(default = "default_export_format")]
    pub format: String,
    /// Environment variable holding the API token. Unset variable at sync
    /// time is an adapter-fatal error.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Allow-list globs applied to discovered document identifiers.
    #[serde(default)]
    pub include_patterns: Vec<String>,
}

fn default_export_format() -> String {
    "markdown".to_string()
}

/// A git repository mirrored through a cached shallow clone.
#[derive(Debug, Deserialize, Clone)]
pub struct VcsSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Globs selecting which files to copy out of the clone.
    #[serde(default = "default_vcs_globs")]
    pub include_globs: Vec<String>,
    /// Resolve and copy symlink targets instead of skipping symlinks.
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_vcs_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

/// Crawled web pages.
#[derive(Debug, Deserialize, Clone)]
pub struct WebSourceConfig {
    pub name: String,
    /// Seed page URLs, crawled at depth 0.
    pub seeds: Vec<String>,
    #[serde(default)]
    pub depth: u32,
    /// Allow-list globs applied to discovered URLs (default: allow all).
    #[serde(default)]
    pub include_patterns: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.storage.root.as_os_str().is_empty() {
        anyhow::bail!("storage.root must not be empty");
    }
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be > 0");
    }

    // Source names key manifests on disk; duplicates would silently share
    // bookkeeping.
    let mut seen = std::collections::HashSet::new();
    for source in &config.sources {
        let name = source.name();
        if name.is_empty() {
            anyhow::bail!("every source needs a non-empty name");
        }
        if !seen.insert(name.to_string()) {
            anyhow::bail!("duplicate source name: '{}'", name);
        }
        let patterns = match source {
            SourceConfig::Documents(d) => &d.include_patterns,
            SourceConfig::Vcs(v) => &v.include_globs,
            SourceConfig::Web(w) => &w.include_patterns,
        };
        for pattern in patterns {
            Glob::new(pattern)
                .with_context(|| format!("source '{}': bad glob pattern '{}'", name, pattern))?;
        }
        if let SourceConfig::Web(web) = source {
            if web.seeds.is_empty() {
                anyhow::bail!("web source '{}' has no seeds", name);
            }
        }
        if let SourceConfig::Documents(docs) = source {
            if docs.seeds.is_empty() && docs.mirror_list.is_none() {
                anyhow::bail!(
                    "documents source '{}' needs seeds or a mirror_list",
                    name
                );
            }
            if !docs.export_url.contains("{id}") {
                anyhow::bail!(
                    "documents source '{}': export_url must contain '{{id}}'",
                    name
                );
            }
        }
    }

    Ok(config)
}
