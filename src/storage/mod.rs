//! Storage abstractions.
//!
//! Two kinds of storage are involved:
//! - the local catalog cache (`local`), refreshed by the fetcher
//! - remote record stores (`github`), one git repository per platform where
//!   every published release is a branch named after its identifier
//!
//! ## Record store layout
//!
//! ```text
//! owner/macOS.git
//! ├── template                         # baseline every record branches from
//! ├── 001c2f3e...                      # one branch per identifier
//! │   └── product.json
//! └── ...
//! ```

pub mod git;
pub mod github;
pub mod local;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Identifier, Platform, ReleaseRecord};

// Re-export for convenience
pub use git::GitWorkspace;
pub use github::GitHubStore;
pub use local::CatalogCache;

/// Result of publishing a batch of records to one store.
#[derive(Debug, Default, Clone)]
pub struct PublishReport {
    /// Identifiers whose branch was pushed
    pub published: Vec<Identifier>,
    /// Identifiers that failed, with the reason
    pub failed: Vec<(Identifier, String)>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: PublishReport) {
        self.published.extend(other.published);
        self.failed.extend(other.failed);
    }
}

/// A remote store of published release records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Platform whose records live in this store.
    fn platform(&self) -> Platform;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Every identifier already published.
    ///
    /// Must be complete: a partial answer would lead to duplicates, so any
    /// failure is an error rather than a shorter set.
    async fn known_identifiers(&self) -> Result<HashSet<String>>;

    /// Publish records, one branch each.
    ///
    /// A failure for one record does not stop the others; per-record failures
    /// are reported in the returned [`PublishReport`]. An `Err` means nothing
    /// could be attempted (for example, the clone failed).
    async fn publish(&self, records: &[ReleaseRecord]) -> Result<PublishReport>;
}
