//! Local catalog cache.
//!
//! Each feed is cached at its URL path under the cache root, so
//! `https://host/content/catalogs/index.sucatalog` lands at
//! `{root}/content/catalogs/index.sucatalog`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── url.txt                       # Feed list
//! └── content/catalogs/others/
//!     ├── index-10.16.merged-1.sucatalog
//!     └── index-11-seed.merged-1.sucatalog
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::utils::plist_date_to_utc;
use crate::utils::url::cache_path;

/// Local filesystem cache of catalog files.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    root_dir: PathBuf,
}

impl CatalogCache {
    /// Create a new cache rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Local path of the cached copy of a feed.
    pub fn path_for(&self, feed_url: &str) -> Result<PathBuf> {
        Ok(self.root_dir.join(cache_path(feed_url)?))
    }

    /// Replace a file atomically (write to temp, then rename).
    pub async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path
            .file_name()
            .ok_or_else(|| AppError::validation(format!("not a file path: {}", path.display())))?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Remove a cached file. Returns whether a file was there.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read bytes, returning None if the file doesn't exist.
    pub async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// `IndexDate` of the cached copy, if it exists and can be read.
    ///
    /// Only the root `IndexDate` is looked at; the rest of the document is
    /// not validated here.
    pub async fn index_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        let bytes = self.read_bytes(path).await.ok()??;
        match read_index_date(&bytes) {
            Ok(date) => Some(date),
            Err(e) => {
                log::debug!("No usable IndexDate in {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Extract the root `IndexDate` from catalog bytes.
pub fn read_index_date(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let value = plist::Value::from_reader(std::io::Cursor::new(bytes))?;
    value
        .as_dictionary()
        .and_then(|root| root.get("IndexDate"))
        .and_then(plist::Value::as_date)
        .map(plist_date_to_utc)
        .ok_or_else(|| AppError::schema("catalog root", "no IndexDate"))
}
