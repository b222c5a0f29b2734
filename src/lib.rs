//! # Source Mirror
//!
//! A knowledge-source synchronization engine: mirrors external content —
//! cloud-hosted documents behind an export API, git repositories, and
//! crawled web pages — into a local content store, and keeps that mirror
//! consistent across repeated runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌───────────────┐   ┌────────────────┐
//! │  SourceAdapters  │──▶│ GraphCrawler  │──▶│  Content store │
//! │  docs/vcs/web    │   │ depth + dedup │   │  + manifests   │
//! └──────────────────┘   └───────────────┘   └───────┬────────┘
//!                                                    │
//!                                          ┌─────────▼────────┐
//!                                          │  Reconciliation  │
//!                                          │  (orphan GC)     │
//!                                          └──────────────────┘
//! ```
//!
//! Re-running `sync` with no upstream change is a no-op; files that
//! disappeared upstream are garbage-collected against the per-source
//! manifest without touching files still valid.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types (results, manifests, reports) |
//! | [`adapter`] | The source adapter contract |
//! | [`adapter_docs`] | Document-export adapter + mirror lists |
//! | [`adapter_vcs`] | Git repository adapter + clone cache |
//! | [`adapter_web`] | Web page crawler adapter |
//! | [`crawler`] | Depth-bounded, deduplicating graph traversal |
//! | [`links`] | Link extraction and URL normalization |
//! | [`manifest`] | Manifest persistence and orphan reconciliation |
//! | [`orchestrate`] | Per-source sync loop and aggregate reporting |

pub mod adapter;
pub mod adapter_docs;
pub mod adapter_vcs;
pub mod adapter_web;
pub mod config;
pub mod crawler;
pub mod error;
pub mod links;
pub mod manifest;
pub mod models;
pub mod orchestrate;
