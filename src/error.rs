//! Error taxonomy for the sync engine.
//!
//! Failures fall into two tiers. Node-level trouble (one document, one
//! page) becomes [`SyncError::Fetch`] and is recorded in the result rather
//! than aborting the pass. Adapter-level trouble (missing credentials, a
//! first clone that failed, an unreadable mirror list) becomes
//! [`SyncError::AdapterFatal`] and fails the whole source.

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// One node (document, page, repository operation) could not be
    /// fetched. Survivable: the crawl records it and moves on.
    #[error("fetch failed for '{target}': {reason}")]
    Fetch { target: String, reason: String },

    /// A condition that invalidates the whole source for this pass.
    #[error("source '{name}' failed: {reason}")]
    AdapterFatal { name: String, reason: String },

    /// Manifest could not be read or written.
    #[error("manifest error for '{name}': {reason}")]
    Manifest { name: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn fetch(target: impl Into<String>, reason: impl Display) -> Self {
        SyncError::Fetch {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fatal(source: impl Into<String>, reason: impl Display) -> Self {
        SyncError::AdapterFatal {
            name: source.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_target() {
        let e = SyncError::fetch("https://example.com/a", "connection refused");
        assert_eq!(
            e.to_string(),
            "fetch failed for 'https://example.com/a': connection refused"
        );

        let e = SyncError::fatal("handbook", "credentials missing");
        assert_eq!(e.to_string(), "source 'handbook' failed: credentials missing");
    }

    #[test]
    fn per_source_variants_carry_no_error_cause() {
        // The source name is plain context, not a chained cause.
        let fatal = SyncError::fatal("handbook", "credentials missing");
        assert!(std::error::Error::source(&fatal).is_none());

        let manifest = SyncError::Manifest {
            name: "handbook".to_string(),
            reason: "corrupt".to_string(),
        };
        assert!(std::error::Error::source(&manifest).is_none());
    }

    #[test]
    fn io_errors_convert() {
        fn touch_missing() -> Result<String, SyncError> {
            Ok(std::fs::read_to_string("/nonexistent/source-mirror-test")?)
        }
        assert!(matches!(touch_missing(), Err(SyncError::Io(_))));
    }
}
